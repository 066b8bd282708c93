//! Live execution status shared between a running flow and its observers.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of what the scheduler is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleExecutionStatus {
    pub is_running: bool,
    pub schedule_id: Option<String>,
    /// Index into the enabled tasks, `-1` before the first one starts.
    pub current_step_index: i64,
    pub total_steps: usize,
    pub current_task_id: Option<String>,
    pub message: String,
    pub start_time: Option<DateTime<Utc>>,
    pub should_stop: bool,
}

impl Default for ScheduleExecutionStatus {
    fn default() -> Self {
        Self {
            is_running: false,
            schedule_id: None,
            current_step_index: -1,
            total_steps: 0,
            current_task_id: None,
            message: "Idle".into(),
            start_time: None,
            should_stop: false,
        }
    }
}

/// Cloneable handle to the single status record.
///
/// Readers get copies; only the scheduler mutates through the crate-private
/// methods. A poisoned lock is recovered, the record is plain data.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<ScheduleExecutionStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut ScheduleExecutionStatus) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn snapshot(&self) -> ScheduleExecutionStatus {
        self.with(|s| s.clone())
    }

    pub fn is_running(&self) -> bool {
        self.with(|s| s.is_running)
    }

    pub fn should_stop(&self) -> bool {
        self.with(|s| s.should_stop)
    }

    /// Ask the running flow to stop before its next task.
    ///
    /// Returns `false` when nothing is running. The task in flight is never
    /// interrupted.
    pub fn request_stop(&self) -> bool {
        self.with(|s| {
            if !s.is_running {
                return false;
            }
            s.should_stop = true;
            s.message = "Stop requested, finishing current task".into();
            true
        })
    }

    /// Atomically mark a run as started; `false` if one already is.
    pub fn try_claim(&self, schedule_id: &str) -> bool {
        self.with(|s| {
            if s.is_running {
                return false;
            }
            *s = ScheduleExecutionStatus {
                is_running: true,
                schedule_id: Some(schedule_id.to_string()),
                message: "Starting".into(),
                start_time: Some(Utc::now()),
                ..ScheduleExecutionStatus::default()
            };
            true
        })
    }

    pub(crate) fn begin(&self, schedule_id: &str, total_steps: usize) {
        self.with(|s| {
            // A stop requested while the run was being claimed still counts.
            let should_stop = s.is_running && s.should_stop;
            *s = ScheduleExecutionStatus {
                is_running: true,
                schedule_id: Some(schedule_id.to_string()),
                total_steps,
                message: format!("Starting {total_steps} tasks"),
                start_time: Some(Utc::now()),
                should_stop,
                ..ScheduleExecutionStatus::default()
            };
        });
    }

    pub(crate) fn enter_step(&self, index: usize, task_id: &str, message: String) {
        self.with(|s| {
            s.current_step_index = index as i64;
            s.current_task_id = Some(task_id.to_string());
            s.message = message;
        });
    }

    pub(crate) fn finish(&self, message: String) {
        self.with(|s| {
            s.is_running = false;
            s.should_stop = false;
            s.current_task_id = None;
            s.message = message;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_by_default() {
        let status = StatusHandle::new().snapshot();
        assert!(!status.is_running);
        assert_eq!(status.current_step_index, -1);
        assert_eq!(status.message, "Idle");
    }

    #[test]
    fn test_request_stop_only_while_running() {
        let handle = StatusHandle::new();
        assert!(!handle.request_stop());
        assert!(!handle.should_stop());

        handle.begin("daily", 3);
        assert!(handle.request_stop());
        assert!(handle.should_stop());

        handle.finish("Terminated by user".into());
        assert!(!handle.should_stop());
        assert!(!handle.is_running());
    }

    #[test]
    fn test_try_claim_is_exclusive() {
        let handle = StatusHandle::new();
        assert!(handle.try_claim("daily"));
        assert!(!handle.try_claim("daily"));
        handle.finish("done".into());
        assert!(handle.try_claim("daily"));
    }

    #[test]
    fn test_begin_keeps_stop_requested_after_claim() {
        let handle = StatusHandle::new();
        assert!(handle.try_claim("daily"));
        assert!(handle.request_stop());
        handle.begin("daily", 2);
        assert!(handle.should_stop());
        assert_eq!(handle.snapshot().total_steps, 2);
    }

    #[test]
    fn test_enter_step_and_clone_share_state() {
        let handle = StatusHandle::new();
        let observer = handle.clone();
        handle.begin("daily", 2);
        handle.enter_step(1, "t2", "Running Farm (2/2)".into());

        let snap = observer.snapshot();
        assert_eq!(snap.current_step_index, 1);
        assert_eq!(snap.current_task_id.as_deref(), Some("t2"));
        assert_eq!(snap.schedule_id.as_deref(), Some("daily"));
    }
}
