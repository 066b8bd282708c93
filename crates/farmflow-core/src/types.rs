//! Data types shared between the engine adapters, the scheduler and the notifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Captured output of one automation-engine invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best human-readable failure reason: stderr, else the last stdout line.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let tail = self.stdout.lines().rev().find(|l| !l.trim().is_empty());
        match tail {
            Some(line) => format!("exit code {}: {}", self.exit_code, line.trim()),
            None => format!("exit code {}", self.exit_code),
        }
    }
}

/// Where the emulator / device lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    /// ADB serial or `host:port`.
    pub address: String,
    /// Game client flavour passed to the engine on start-up.
    #[serde(default = "default_client_type")]
    pub client_type: String,
}

fn default_client_type() -> String {
    "Official".into()
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5555".into(),
            client_type: default_client_type(),
        }
    }
}

/// A built-in engine task described as JSON, dispatched as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicTask {
    pub task_id: String,
    /// Engine task type, e.g. `StartUp`, `Fight`, `Recruit`.
    pub kind: String,
    pub config: serde_json::Value,
    /// Label used in logs and summaries.
    pub label: String,
    pub wait_for_completion: bool,
}

/// Answer of a stage calendar lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAvailability {
    pub is_open: bool,
    pub reason: String,
}

impl StageAvailability {
    pub fn open() -> Self {
        Self {
            is_open: true,
            reason: String::new(),
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        Self {
            is_open: false,
            reason: reason.into(),
        }
    }
}

/// A failed task (or stage pair) with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub name: String,
    pub reason: String,
}

/// A skipped task (or stage pair) with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub name: String,
    pub reason: String,
}

/// Completion summary of one flow run, handed to notifiers and stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub success_count: u32,
    pub failed_count: u32,
    pub skipped_count: u32,
    pub errors: Vec<TaskError>,
    pub skipped: Vec<SkippedItem>,
    pub per_task_notes: Vec<String>,
    /// Tasks never reached because the run was stopped.
    pub not_run: Vec<String>,
    pub stopped: bool,
    pub duration_ms: u64,
}

impl ExecutionSummary {
    pub fn new(run_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            errors: Vec::new(),
            skipped: Vec::new(),
            per_task_notes: Vec::new(),
            not_run: Vec::new(),
            stopped: false,
            duration_ms: 0,
        }
    }

    pub fn record_success(&mut self, note: impl Into<String>) {
        self.success_count += 1;
        self.per_task_notes.push(note.into());
    }

    pub fn record_failure(&mut self, name: &str, reason: impl Into<String>) {
        self.failed_count += 1;
        self.errors.push(TaskError {
            name: name.to_string(),
            reason: reason.into(),
        });
    }

    pub fn record_skip(&mut self, name: &str, reason: impl Into<String>) {
        self.skipped_count += 1;
        self.skipped.push(SkippedItem {
            name: name.to_string(),
            reason: reason.into(),
        });
    }

    /// Total number of recorded outcomes.
    pub fn outcome_count(&self) -> u32 {
        self.success_count + self.failed_count + self.skipped_count
    }

    /// One-line digest, e.g. `3 ok · 1 failed · 2 skipped`.
    pub fn headline(&self) -> String {
        format!(
            "{} ok · {} failed · {} skipped",
            self.success_count, self.failed_count, self.skipped_count
        )
    }
}
