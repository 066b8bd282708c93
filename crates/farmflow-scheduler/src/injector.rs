//! Plan injector: keeps the farming task's auto-generated stages in step
//! with the training queue.
//!
//! After each run the head of the queue is re-planned against the current
//! depot. When it needs nothing more it is dequeued and the next entity is
//! planned instead. Pinned entries always come first and manual entries
//! last; only auto-generated entries are ever rewritten.

use std::sync::Arc;

use farmflow_core::error::Result;
use farmflow_core::traits::ConfigStore;
use farmflow_planner::{Inventory, PlanMode, QueueDocument, TrainingPlan, TrainingPlanner};
use serde::{Deserialize, Serialize};

use crate::tasks::{EntryOrigin, FlowDocument, StageEntry, Task};

/// What `apply` changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    /// Auto-generated entries written.
    pub stage_count: usize,
    /// Entries in the farming task afterwards.
    pub total_stages: usize,
}

pub struct PlanInjector {
    store: Arc<dyn ConfigStore>,
    planner: Arc<TrainingPlanner>,
}

impl PlanInjector {
    pub fn new(store: Arc<dyn ConfigStore>, planner: Arc<TrainingPlanner>) -> Self {
        Self { store, planner }
    }

    /// Refresh the flow stored under `flow_key` after a run.
    ///
    /// Does nothing unless the farming task already carries auto-generated
    /// entries, so flows the user never applied a plan to stay untouched.
    pub fn update(&self, flow_key: &str) -> Result<()> {
        let store = self.store.as_ref();
        let Some(mut flow) = FlowDocument::load(store, flow_key)? else {
            tracing::debug!("📋 No flow '{flow_key}', nothing to update");
            return Ok(());
        };
        let Some(fight) = flow.farming_task_mut() else {
            return Ok(());
        };
        if !fight.has_auto_entries() {
            return Ok(());
        }

        let mut queue = QueueDocument::load(store)?;
        if !queue.settings.auto_update {
            tracing::debug!("📋 Auto-update disabled, leaving '{flow_key}' as is");
            return Ok(());
        }
        if queue.queue.is_empty() {
            fight.clear_auto_entries();
            tracing::info!("📋 Training queue empty, cleared auto stages of '{flow_key}'");
            return flow.save(store, flow_key);
        }

        let inventory = Inventory::load(store)?;
        let mut plan = self.planner.generate(&queue.queue, PlanMode::Current, &inventory)?;
        if plan.is_complete() {
            if queue.queue.len() > 1 {
                let done = queue.queue.remove(0);
                queue.save(store)?;
                tracing::info!(
                    "🎓 {} has everything it needs, advancing to {}",
                    done.entity_id,
                    queue.queue[0].entity_id
                );
                plan = self.planner.generate(&queue.queue, PlanMode::Current, &inventory)?;
            } else {
                tracing::info!("🎓 Last queued entity is covered, clearing auto stages");
            }
        }

        let entries = auto_entries(&plan);
        tracing::info!("📋 '{flow_key}': {} auto stages", entries.len());
        fight.replace_auto_entries(entries);
        flow.save(store, flow_key)
    }

    /// Write `plan` into the farming task of `flow_key`.
    ///
    /// Creates the flow and its farming task when either is missing.
    pub fn apply(&self, flow_key: &str, plan: &TrainingPlan) -> Result<ApplyOutcome> {
        let store = self.store.as_ref();
        let mut flow = FlowDocument::load(store, flow_key)?.unwrap_or_default();
        if flow.farming_task_mut().is_none() {
            flow.task_flow.push(Task::fight("Fight", Vec::new()));
        }

        let entries = auto_entries(plan);
        let stage_count = entries.len();
        let total_stages = match flow.farming_task_mut() {
            Some(fight) => {
                fight.replace_auto_entries(entries);
                fight.stages.len()
            }
            None => 0,
        };
        flow.save(store, flow_key)?;
        tracing::info!(
            "📋 Applied plan to '{flow_key}': {stage_count} stages ({total_stages} total)"
        );
        Ok(ApplyOutcome {
            stage_count,
            total_stages,
        })
    }
}

fn auto_entries(plan: &TrainingPlan) -> Vec<StageEntry> {
    plan.stages
        .iter()
        .map(|s| {
            let times = u32::try_from(s.total_runs).unwrap_or(u32::MAX);
            StageEntry::new(&s.stage_id, times, EntryOrigin::AutoGenerated)
        })
        .collect()
}
