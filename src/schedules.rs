pub use client::{ScheduleClient, ScheduleService};

pub mod client;
pub mod payload;

/// Identifier assigned to a schedule by the vendor.
pub type ScheduleId = u64;
