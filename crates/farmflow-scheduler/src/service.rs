//! Service facade: the operations a UI or the CLI calls.

use std::sync::{Arc, Mutex};

use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::ConfigStore;
use farmflow_core::types::ExecutionSummary;
use farmflow_planner::{Inventory, PlanMode, QueueDocument, TrainingPlan, TrainingPlanner};

use crate::engine::FlowScheduler;
use crate::injector::{ApplyOutcome, PlanInjector};
use crate::persistence::{RunHistoryDb, RunRecord};
use crate::status::ScheduleExecutionStatus;
use crate::tasks::{FlowDocument, ScheduleSettings};

pub struct FarmflowService {
    store: Arc<dyn ConfigStore>,
    scheduler: FlowScheduler,
    planner: Arc<TrainingPlanner>,
    injector: Arc<PlanInjector>,
    history: Option<Mutex<RunHistoryDb>>,
    flow_key: String,
}

impl FarmflowService {
    /// Wire the service; the scheduler gets a plan injector over `store`.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        planner: Arc<TrainingPlanner>,
        scheduler: FlowScheduler,
        flow_key: &str,
    ) -> Self {
        let injector = Arc::new(PlanInjector::new(store.clone(), planner.clone()));
        Self {
            store,
            scheduler: scheduler.with_injector(injector.clone()),
            planner,
            injector,
            history: None,
            flow_key: flow_key.to_string(),
        }
    }

    /// Record every run in `db`.
    pub fn with_history(mut self, db: RunHistoryDb) -> Self {
        self.history = Some(Mutex::new(db));
        self
    }

    pub fn flow_key(&self) -> &str {
        &self.flow_key
    }

    pub fn execution_status(&self) -> ScheduleExecutionStatus {
        self.scheduler.status().snapshot()
    }

    pub fn request_stop(&self) -> bool {
        let accepted = self.scheduler.status().request_stop();
        if accepted {
            tracing::info!("🛑 Stop requested");
        }
        accepted
    }

    /// Run the flow stored under `flow_id` now.
    ///
    /// Refuses to start while another run is active.
    pub async fn run_now(&self, flow_id: &str) -> Result<ExecutionSummary> {
        let flow = FlowDocument::load(self.store.as_ref(), flow_id)?
            .ok_or_else(|| FarmflowError::FlowNotFound(flow_id.to_string()))?;
        let status = self.scheduler.status();
        if !status.try_claim(flow_id) {
            let running = status.snapshot().schedule_id.unwrap_or_default();
            return Err(FarmflowError::AlreadyRunning(running));
        }

        let summary = self.scheduler.run(&flow.task_flow, flow_id).await;
        if let Some(history) = &self.history {
            let db = history.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = db.record(&summary) {
                tracing::warn!("⚠️ Failed to record run '{flow_id}': {e}");
            }
        }
        Ok(summary)
    }

    /// Schedule settings of `flow_id`, `None` if the flow does not exist.
    pub fn schedule(&self, flow_id: &str) -> Result<Option<ScheduleSettings>> {
        Ok(FlowDocument::load(self.store.as_ref(), flow_id)?.map(|f| f.schedule))
    }

    /// Plan the stored training queue against the stored depot.
    pub fn generate_plan(&self, mode: PlanMode) -> Result<TrainingPlan> {
        let queue = QueueDocument::load(self.store.as_ref())?;
        let inventory = Inventory::load(self.store.as_ref())?;
        self.planner.generate(&queue.queue, mode, &inventory)
    }

    /// Write `plan` into the service's flow.
    pub fn apply_plan(&self, plan: &TrainingPlan) -> Result<ApplyOutcome> {
        self.injector.apply(&self.flow_key, plan)
    }

    /// Latest runs, newest first. Empty without a history database.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        match &self.history {
            Some(history) => history
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .recent(limit),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::engine::DispatchPolicy;
    use crate::store::MemoryStore;
    use crate::tasks::{EntryOrigin, StageEntry, Task, TaskParams};
    use crate::testing::{ClosedStages, ScriptedEngine};
    use farmflow_core::config::PlannerConfig;
    use farmflow_core::types::{CommandOutput, ConnectionParams};
    use farmflow_planner::{
        EntityRanks, Material, MaterialCatalog, PromotionRequest, QueueSettings, RankCost,
        RankTables, RecipeGraph,
    };

    const FLOW: &str = "task_flow";

    fn planner() -> Arc<TrainingPlanner> {
        let ranks = RankTables::new(BTreeMap::from([(
            "amiya".to_string(),
            EntityRanks {
                name: "Amiya".into(),
                ranks: vec![RankCost {
                    rank: 1,
                    materials: BTreeMap::from([("rock".to_string(), 6)]),
                }],
            },
        )]));
        let mut config = PlannerConfig::default();
        config.assumed_drop_rate = 1.0;
        Arc::new(TrainingPlanner::new(
            MaterialCatalog::new([Material {
                id: "rock".into(),
                name: "Orirock Cube".into(),
                icon_id: String::new(),
                best_stage: Some("1-7".into()),
            }]),
            RecipeGraph::new(),
            ranks,
            Arc::new(ClosedStages(vec![])),
            config,
        ))
    }

    fn service(engine: &Arc<ScriptedEngine>, store: &Arc<MemoryStore>) -> FarmflowService {
        let scheduler = FlowScheduler::new(
            engine.clone(),
            Arc::new(ClosedStages(vec![])),
            ConnectionParams::default(),
            DispatchPolicy::immediate(),
        );
        FarmflowService::new(store.clone(), planner(), scheduler, FLOW)
    }

    fn seed_queue(store: &MemoryStore) {
        QueueDocument {
            queue: vec![PromotionRequest {
                entity_id: "amiya".into(),
                current_rank: 0,
                target_rank: 1,
                priority: 0,
            }],
            settings: QueueSettings::default(),
        }
        .save(store)
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_now_missing_flow() {
        let engine = Arc::new(ScriptedEngine::new());
        let store = Arc::new(MemoryStore::new());
        let err = service(&engine, &store).run_now(FLOW).await.unwrap_err();
        assert!(matches!(err, FarmflowError::FlowNotFound(_)));
    }

    #[tokio::test]
    async fn test_run_now_rejects_concurrent_run() {
        let engine = Arc::new(ScriptedEngine::new());
        let store = Arc::new(MemoryStore::new());
        FlowDocument {
            task_flow: vec![Task::predefined("one", "cmd", vec![])],
            ..FlowDocument::default()
        }
        .save(store.as_ref(), FLOW)
        .unwrap();
        let svc = service(&engine, &store);

        assert!(svc.scheduler.status().try_claim("other"));
        let err = svc.run_now(FLOW).await.unwrap_err();
        assert!(matches!(err, FarmflowError::AlreadyRunning(ref id) if id == "other"));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_now_records_history_and_updates_plan() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond("Farm (1-7)", CommandOutput::ok("runs: 2"));
        let store = Arc::new(MemoryStore::new());
        seed_queue(&store);
        FlowDocument {
            task_flow: vec![Task::fight(
                "Farm",
                vec![StageEntry::new("1-7", 6, EntryOrigin::AutoGenerated)],
            )],
            ..FlowDocument::default()
        }
        .save(store.as_ref(), FLOW)
        .unwrap();
        // The depot now holds 4 of the 6 rocks.
        store
            .save_config("depot", &serde_json::json!({"items": {"rock": 4}}))
            .unwrap();

        let svc = service(&engine, &store).with_history(RunHistoryDb::open_in_memory().unwrap());
        let summary = svc.run_now(FLOW).await.unwrap();
        assert_eq!(summary.success_count, 1);
        assert!(!svc.execution_status().is_running);

        let runs = svc.recent_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, FLOW);

        let flow = FlowDocument::load(store.as_ref(), FLOW).unwrap().unwrap();
        let TaskParams::Fight(fight) = &flow.task_flow[0].params else {
            panic!("expected fight task");
        };
        assert_eq!(fight.stages, vec![StageEntry::new("1-7", 2, EntryOrigin::AutoGenerated)]);
    }

    #[test]
    fn test_generate_and_apply_plan() {
        let engine = Arc::new(ScriptedEngine::new());
        let store = Arc::new(MemoryStore::new());
        seed_queue(&store);
        let svc = service(&engine, &store);

        let plan = svc.generate_plan(PlanMode::Current).unwrap();
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.stages[0].total_runs, 6);

        let outcome = svc.apply_plan(&plan).unwrap();
        assert_eq!(outcome.stage_count, 1);
        assert!(svc.schedule(FLOW).unwrap().is_some());
    }

    #[test]
    fn test_generate_plan_empty_queue() {
        let engine = Arc::new(ScriptedEngine::new());
        let store = Arc::new(MemoryStore::new());
        let err = service(&engine, &store).generate_plan(PlanMode::All).unwrap_err();
        assert!(matches!(err, FarmflowError::EmptyQueue));
    }

    #[test]
    fn test_request_stop_when_idle() {
        let engine = Arc::new(ScriptedEngine::new());
        let store = Arc::new(MemoryStore::new());
        let svc = service(&engine, &store);
        assert!(!svc.request_stop());
        assert!(svc.recent_runs(5).unwrap().is_empty());
    }
}
