//! Farmflow error types.

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, FarmflowError>;

/// Every failure a Farmflow component can surface.
#[derive(Debug, thiserror::Error)]
pub enum FarmflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Liveness probe failed: {0}")]
    Probe(String),

    #[error("Training queue is empty")]
    EmptyQueue,

    #[error("Cyclic recipe: {}", .0.join(" -> "))]
    CyclicRecipe(Vec<String>),

    #[error("Malformed document '{key}': {reason}")]
    MalformedDocument { key: String, reason: String },

    #[error("Schedule '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Task flow not found: {0}")]
    FlowNotFound(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl FarmflowError {
    /// Shorthand for a malformed persisted document.
    pub fn malformed(key: &str, reason: impl std::fmt::Display) -> Self {
        Self::MalformedDocument {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
