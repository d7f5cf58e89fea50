pub use ensure::{
    EnsureOutcome, EnsureWorkflow, RuleDisposition, ScheduleDisposition, ScheduleWindow,
};

pub mod ensure;
