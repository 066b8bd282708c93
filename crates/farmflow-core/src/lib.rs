//! # Farmflow Core
//!
//! Shared error type, configuration, data types, and the collaborator traits
//! (automation engine, stage calendar, config store, notifier) that the planner
//! and scheduler crates are written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::FarmflowConfig;
pub use error::{FarmflowError, Result};
pub use traits::{AutomationEngine, ConfigStore, Notifier, StageCalendar};
pub use types::{
    CommandOutput, ConnectionParams, DynamicTask, ExecutionSummary, SkippedItem, StageAvailability,
    TaskError,
};
