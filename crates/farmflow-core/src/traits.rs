//! Collaborator traits. The scheduler and planner only ever talk to these.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CommandOutput, ConnectionParams, DynamicTask, ExecutionSummary, StageAvailability,
};

/// The single, exclusive automation engine driving the game client.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Run a predefined engine command.
    async fn run_command(&self, name: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run a built-in engine task described as JSON.
    async fn run_dynamic_task(&self, task: &DynamicTask) -> Result<CommandOutput>;

    /// Capture a frame from the device; fails if the target is unreachable.
    async fn capture_liveness_probe(&self, connection: &ConnectionParams) -> Result<()>;

    /// Whether the engine is still working on a previously dispatched task.
    async fn is_busy(&self) -> Result<bool>;
}

/// Knows which farming stages are open on the current game day.
pub trait StageCalendar: Send + Sync {
    fn is_stage_open_today(&self, stage_id: &str) -> StageAvailability;
}

/// Key/value store of JSON documents, read and written wholesale per key.
pub trait ConfigStore: Send + Sync {
    fn load_config(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn save_config(&self, key: &str, value: &serde_json::Value) -> Result<()>;
}

/// Delivers a run summary somewhere a human will see it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &ExecutionSummary) -> Result<()>;
}
