pub use repository::{RuleRepository, RuleService};

pub mod payload;
pub mod repository;

/// Identifier assigned to a rule by the vendor.
pub type RuleId = u64;
