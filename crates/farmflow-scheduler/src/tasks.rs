//! Task definitions: the flow document and the tasks it runs in order.

use std::collections::BTreeMap;

use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::ConfigStore;
use farmflow_core::types::ConnectionParams;
use serde::{Deserialize, Serialize};

/// One step of a task flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: String,
    /// Human-readable name, used in summaries. Falls back to the task kind.
    #[serde(default)]
    pub name: String,
    /// Disabled tasks stay in the flow but are never dispatched.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// What to run.
    pub params: TaskParams,
}

fn bool_true() -> bool {
    true
}

/// Per-kind parameters. The dispatcher matches on this exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TaskParams {
    /// Launch the game client and verify the device answers.
    StartUp(StartUpParams),
    /// Farm an ordered list of stages.
    Fight(FightParams),
    /// Any other built-in engine task, passed through as JSON.
    Builtin {
        task_type: String,
        #[serde(default)]
        config: serde_json::Value,
    },
    /// A predefined engine command.
    Predefined {
        command_id: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Dispatch policy class of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    /// Retried on liveness failure, long settle delay.
    Startup,
    /// Per-stage skip/fail handling.
    Farming,
    /// Run once.
    Default,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartUpParams {
    #[serde(default)]
    pub client_type: Option<String>,
    /// Overrides the configured device connection.
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
    #[serde(default)]
    pub account_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightParams {
    #[serde(default)]
    pub stages: Vec<StageEntry>,
    /// Sanity potions the engine may use.
    #[serde(default)]
    pub medicine: u32,
    #[serde(default)]
    pub expiring_medicine: bool,
    /// Originium the engine may convert to sanity.
    #[serde(default)]
    pub stone: u32,
}

/// Who put a stage entry into the farming task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Manual entry the user wants farmed before anything else.
    Pinned,
    /// Written by the plan injector; replaced on every update.
    AutoGenerated,
    #[default]
    Manual,
}

/// One `(stage, runs)` pair of a farming task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub stage: String,
    /// 0 lets the engine farm until it stops on its own.
    #[serde(default)]
    pub times: u32,
    #[serde(default)]
    pub origin: EntryOrigin,
}

impl StageEntry {
    pub fn new(stage: &str, times: u32, origin: EntryOrigin) -> Self {
        Self {
            stage: stage.to_string(),
            times,
            origin,
        }
    }
}

impl Task {
    fn with_params(name: &str, params: TaskParams) -> Self {
        Self {
            id: new_task_id(),
            name: name.to_string(),
            enabled: true,
            params,
        }
    }

    /// Create a start-up task using the configured connection.
    pub fn start_up(name: &str) -> Self {
        Self::with_params(name, TaskParams::StartUp(StartUpParams::default()))
    }

    /// Create a farming task.
    pub fn fight(name: &str, stages: Vec<StageEntry>) -> Self {
        Self::with_params(
            name,
            TaskParams::Fight(FightParams {
                stages,
                ..FightParams::default()
            }),
        )
    }

    /// Create a pass-through built-in task.
    pub fn builtin(name: &str, task_type: &str, config: serde_json::Value) -> Self {
        Self::with_params(
            name,
            TaskParams::Builtin {
                task_type: task_type.to_string(),
                config,
            },
        )
    }

    /// Create a predefined-command task.
    pub fn predefined(name: &str, command_id: &str, args: Vec<String>) -> Self {
        Self::with_params(
            name,
            TaskParams::Predefined {
                command_id: command_id.to_string(),
                args,
            },
        )
    }

    /// Name used in logs and summaries.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match &self.params {
            TaskParams::StartUp(_) => "StartUp".to_string(),
            TaskParams::Fight(_) => "Fight".to_string(),
            TaskParams::Builtin { task_type, .. } => task_type.clone(),
            TaskParams::Predefined { command_id, .. } => command_id.clone(),
        }
    }

    pub fn class(&self) -> TaskClass {
        match &self.params {
            TaskParams::StartUp(_) => TaskClass::Startup,
            TaskParams::Fight(_) => TaskClass::Farming,
            TaskParams::Builtin { .. } | TaskParams::Predefined { .. } => TaskClass::Default,
        }
    }
}

impl FightParams {
    pub fn has_auto_entries(&self) -> bool {
        self.stages.iter().any(|e| e.origin == EntryOrigin::AutoGenerated)
    }

    /// Swap in a new set of auto-generated entries.
    ///
    /// Resulting order: pinned, auto-generated, manual. Relative order inside
    /// the pinned and manual groups is kept.
    pub fn replace_auto_entries(&mut self, auto: Vec<StageEntry>) {
        let (pinned, manual): (Vec<StageEntry>, Vec<StageEntry>) = self
            .stages
            .drain(..)
            .filter(|e| e.origin != EntryOrigin::AutoGenerated)
            .partition(|e| e.origin == EntryOrigin::Pinned);
        self.stages = pinned;
        self.stages.extend(auto.into_iter().map(|mut e| {
            e.origin = EntryOrigin::AutoGenerated;
            e
        }));
        self.stages.extend(manual);
    }

    pub fn clear_auto_entries(&mut self) {
        self.replace_auto_entries(Vec::new());
    }

    /// Engine config for a single stage pair.
    pub fn stage_config(&self, entry: &StageEntry) -> serde_json::Value {
        let mut config = serde_json::json!({
            "stage": entry.stage,
            "medicine": self.medicine,
            "expiring_medicine": self.expiring_medicine,
            "stone": self.stone,
        });
        if entry.times > 0 {
            config["times"] = serde_json::json!(entry.times);
        }
        config
    }
}

/// When the daemon fires a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Times of day, `HH:MM`.
    #[serde(default)]
    pub times: Vec<String>,
}

/// Persisted flow document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDocument {
    #[serde(default)]
    pub task_flow: Vec<Task>,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    /// Fields written by other tools are carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FlowDocument {
    /// Load a flow document; `None` if the key was never written.
    pub fn load(store: &dyn ConfigStore, key: &str) -> Result<Option<Self>> {
        match store.load_config(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| FarmflowError::malformed(key, e)),
            None => Ok(None),
        }
    }

    pub fn save(&self, store: &dyn ConfigStore, key: &str) -> Result<()> {
        store.save_config(key, &serde_json::to_value(self)?)
    }

    /// The farming task the planner writes into (the first fight task).
    pub fn farming_task_mut(&mut self) -> Option<&mut FightParams> {
        self.task_flow.iter_mut().find_map(|t| match &mut t.params {
            TaskParams::Fight(p) => Some(p),
            _ => None,
        })
    }

    pub fn enabled_count(&self) -> usize {
        self.task_flow.iter().filter(|t| t.enabled).count()
    }
}

fn new_task_id() -> String {
    format!("task-{}", uuid::Uuid::new_v4().simple())
}
