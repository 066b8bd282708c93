//! Run notifications: one message per finished run.

use chrono::{DateTime, Utc};
use farmflow_core::types::ExecutionSummary;
use serde::{Deserialize, Serialize};

/// A notification to send to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Title/summary.
    pub title: String,
    /// Body content.
    pub body: String,
    pub priority: NotifyPriority,
    /// Which flow produced it.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// Notification priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotifyPriority {
    Low,
    Normal,
    High,
}

impl Notification {
    /// Render a run summary.
    ///
    /// Failures raise the priority; a stopped run is normal, an empty one low.
    pub fn from_summary(summary: &ExecutionSummary) -> Self {
        let verb = if summary.stopped { "stopped" } else { "finished" };
        let title = format!("Run '{}' {verb}", summary.run_id);

        let mut lines = vec![
            summary.headline(),
            format!("⏱️ {}s", summary.duration_ms / 1000),
        ];
        lines.extend(summary.per_task_notes.iter().map(|n| format!("✅ {n}")));
        lines.extend(summary.errors.iter().map(|e| format!("❌ {}: {}", e.name, e.reason)));
        lines.extend(summary.skipped.iter().map(|s| format!("⏭️ {}: {}", s.name, s.reason)));
        if !summary.not_run.is_empty() {
            lines.push(format!("🛑 Not run: {}", summary.not_run.join(", ")));
        }

        let priority = if summary.failed_count > 0 {
            NotifyPriority::High
        } else if summary.outcome_count() == 0 && !summary.stopped {
            NotifyPriority::Low
        } else {
            NotifyPriority::Normal
        };

        Self {
            title,
            body: lines.join("\n"),
            priority,
            source: summary.run_id.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Whether a summary is worth sending when only problems are wanted.
pub fn has_problems(summary: &ExecutionSummary) -> bool {
    summary.failed_count > 0 || summary.skipped_count > 0 || summary.stopped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_run_is_high_priority() {
        let mut summary = ExecutionSummary::new("daily", Utc::now());
        summary.record_success("Wake: started");
        summary.record_failure("Farm (1-7)", "device offline");
        summary.record_skip("Farm (CE-6)", "CE-6 is closed on Mon");
        summary.duration_ms = 61_500;

        let n = Notification::from_summary(&summary);
        assert_eq!(n.title, "Run 'daily' finished");
        assert_eq!(n.priority, NotifyPriority::High);
        assert!(n.body.starts_with("1 ok · 1 failed · 1 skipped"));
        assert!(n.body.contains("⏱️ 61s"));
        assert!(n.body.contains("❌ Farm (1-7): device offline"));
        assert!(n.body.contains("⏭️ Farm (CE-6): CE-6 is closed on Mon"));
        assert!(has_problems(&summary));
    }

    #[test]
    fn test_stopped_run_lists_not_run() {
        let mut summary = ExecutionSummary::new("daily", Utc::now());
        summary.record_success("a: done");
        summary.stopped = true;
        summary.not_run = vec!["b".into(), "c".into()];

        let n = Notification::from_summary(&summary);
        assert_eq!(n.title, "Run 'daily' stopped");
        assert_eq!(n.priority, NotifyPriority::Normal);
        assert!(n.body.contains("🛑 Not run: b, c"));
    }

    #[test]
    fn test_clean_run_has_no_problems() {
        let mut summary = ExecutionSummary::new("daily", Utc::now());
        summary.record_success("a: done");
        assert!(!has_problems(&summary));
        assert_eq!(Notification::from_summary(&summary).priority, NotifyPriority::Normal);
        let empty = ExecutionSummary::new("daily", Utc::now());
        assert_eq!(Notification::from_summary(&empty).priority, NotifyPriority::Low);
    }
}
