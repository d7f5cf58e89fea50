//! # Autostop Control library
//!
//! This library provides the core functionality to manage autostopping rules
//! and uptime schedules against the cloud-cost-management vendor gateway.
//! The binary generated by this project consumes this library.

pub mod api;
pub mod cli;
pub mod config;
pub mod http;
pub mod logging;
pub mod rules;
pub mod schedules;
pub mod utils;
pub mod workflow;
