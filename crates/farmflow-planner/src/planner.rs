//! Training planner: turns a promotion queue into farming stages.
//!
//! ```text
//! queue ──select(mode)──▶ per-entity rank costs ──net──▶ needs
//!   needs ──MaterialResolver──▶ farmable leaves ──stage lookup──▶ stages
//! ```
//!
//! The run estimate is deliberately coarse: `ceil(qty / assumed_drop_rate)`
//! runs per material, a flat sanity cost per run.

use std::collections::BTreeMap;
use std::sync::Arc;

use farmflow_core::config::PlannerConfig;
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::{ConfigStore, StageCalendar};
use serde::{Deserialize, Serialize};

use crate::gamedata::RankTables;
use crate::inventory::Inventory;
use crate::recipes::{MaterialCatalog, RecipeGraph};
use crate::resolver::{GroupPolicy, MaterialNode, MaterialResolver};

/// Config key of the training-queue document.
pub const QUEUE_KEY: &str = "training_queue";

/// Warning attached to a plan with nothing left to farm.
pub const MATERIALS_COMPLETE: &str = "materials complete";

/// One promotion request in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRequest {
    pub entity_id: String,
    pub current_rank: u32,
    pub target_rank: u32,
    #[serde(default)]
    pub priority: i32,
}

/// Which part of the queue to plan for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Only the head of the queue.
    #[default]
    Current,
    /// Every queued entity.
    All,
}

impl std::str::FromStr for PlanMode {
    type Err = FarmflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "current" => Ok(Self::Current),
            "all" => Ok(Self::All),
            other => Err(FarmflowError::Config(format!("unknown plan mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    #[serde(default)]
    pub mode: PlanMode,
    /// Let the injector rewrite the farming task after each run.
    #[serde(default = "bool_true")]
    pub auto_update: bool,
}

fn bool_true() -> bool {
    true
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            mode: PlanMode::Current,
            auto_update: true,
        }
    }
}

/// Persisted training-queue document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueDocument {
    #[serde(default)]
    pub queue: Vec<PromotionRequest>,
    #[serde(default)]
    pub settings: QueueSettings,
}

impl QueueDocument {
    /// Load the queue document; missing means an empty queue.
    pub fn load(store: &dyn ConfigStore) -> Result<Self> {
        match store.load_config(QUEUE_KEY)? {
            Some(value) => {
                serde_json::from_value(value).map_err(|e| FarmflowError::malformed(QUEUE_KEY, e))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, store: &dyn ConfigStore) -> Result<()> {
        store.save_config(QUEUE_KEY, &serde_json::to_value(self)?)
    }
}

/// An entity covered by a plan and what it still lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedEntity {
    pub id: String,
    pub name: String,
    pub required_materials: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMaterial {
    pub id: String,
    pub name: String,
    pub count: u64,
}

/// A farming stage and the runs it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStage {
    pub stage_id: String,
    pub materials: Vec<StageMaterial>,
    pub total_runs: u64,
    pub sanity_cost: u64,
    pub is_open_today: bool,
}

/// Output of one planning request. Always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPlan {
    pub entities: Vec<PlannedEntity>,
    pub material_hierarchy: Vec<MaterialNode>,
    pub stages: Vec<PlanStage>,
    pub total_sanity: u64,
    pub warnings: Vec<String>,
}

impl TrainingPlan {
    pub fn is_complete(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Produces [`TrainingPlan`]s from static game data.
pub struct TrainingPlanner {
    catalog: MaterialCatalog,
    recipes: RecipeGraph,
    ranks: RankTables,
    policy: GroupPolicy,
    calendar: Arc<dyn StageCalendar>,
    config: PlannerConfig,
}

impl TrainingPlanner {
    pub fn new(
        catalog: MaterialCatalog,
        recipes: RecipeGraph,
        ranks: RankTables,
        calendar: Arc<dyn StageCalendar>,
        config: PlannerConfig,
    ) -> Self {
        let policy = GroupPolicy::new(config.group_suffixes.clone(), config.group_ids.clone());
        Self {
            catalog,
            recipes,
            ranks,
            policy,
            calendar,
            config,
        }
    }

    /// Build a plan for `queue`. Fails on an empty queue or a recipe cycle.
    pub fn generate(
        &self,
        queue: &[PromotionRequest],
        mode: PlanMode,
        inventory: &Inventory,
    ) -> Result<TrainingPlan> {
        if queue.is_empty() {
            return Err(FarmflowError::EmptyQueue);
        }
        let selected = match mode {
            PlanMode::Current => &queue[..1],
            PlanMode::All => queue,
        };

        let mut plan = TrainingPlan::default();
        let mut needs: BTreeMap<String, u64> = BTreeMap::new();

        for request in selected {
            let Some(cost) = self.ranks.cost_between(
                &request.entity_id,
                request.current_rank,
                request.target_rank,
            ) else {
                push_unique(&mut plan.warnings, format!("no rank table for {}", request.entity_id));
                continue;
            };

            let missing: BTreeMap<String, u64> = cost
                .iter()
                .filter_map(|(id, qty)| {
                    let still = qty.saturating_sub(inventory.owned(id));
                    (still > 0).then(|| (id.clone(), still))
                })
                .collect();
            if missing.is_empty() {
                tracing::debug!("✅ {} already has everything it needs", request.entity_id);
                continue;
            }

            for (id, qty) in &cost {
                *needs.entry(id.clone()).or_insert(0) += *qty;
            }
            plan.entities.push(PlannedEntity {
                id: request.entity_id.clone(),
                name: self.ranks.name_of(&request.entity_id).to_string(),
                required_materials: missing,
            });
        }

        if needs.is_empty() {
            push_unique(&mut plan.warnings, MATERIALS_COMPLETE.to_string());
            return Ok(plan);
        }

        let resolver = MaterialResolver::new(&self.catalog, &self.recipes, &self.policy);
        let expansion = resolver.expand(&needs, inventory)?;
        plan.material_hierarchy = expansion.hierarchy;
        for w in expansion.warnings {
            push_unique(&mut plan.warnings, w);
        }

        let mut by_stage: BTreeMap<String, Vec<StageMaterial>> = BTreeMap::new();
        for (id, count) in &expansion.leaves {
            let name = self
                .catalog
                .get(id)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| id.clone());
            match self.stage_for(id, &name) {
                Some(stage) => by_stage.entry(stage).or_default().push(StageMaterial {
                    id: id.clone(),
                    name,
                    count: *count,
                }),
                None => {
                    let warning = format!("no farming stage for {name} ({id})");
                    push_unique(&mut plan.warnings, warning);
                }
            }
        }

        for (stage_id, materials) in by_stage {
            let total_runs: u64 = materials.iter().map(|m| self.runs_for(m.count)).sum();
            let sanity_cost = total_runs * self.config.sanity_per_run;
            let is_open_today = self.calendar.is_stage_open_today(&stage_id).is_open;
            plan.total_sanity += sanity_cost;
            plan.stages.push(PlanStage {
                stage_id,
                materials,
                total_runs,
                sanity_cost,
                is_open_today,
            });
        }
        // Open stages first; stage id order within each group.
        plan.stages.sort_by_key(|s| !s.is_open_today);

        tracing::info!(
            "🧮 Plan generated: {} entities, {} stages, {} sanity",
            plan.entities.len(),
            plan.stages.len(),
            plan.total_sanity
        );
        Ok(plan)
    }

    /// Override table (by id, then name) wins over the material's best stage.
    fn stage_for(&self, id: &str, name: &str) -> Option<String> {
        self.config
            .stage_overrides
            .get(id)
            .or_else(|| self.config.stage_overrides.get(name))
            .cloned()
            .or_else(|| self.catalog.get(id).and_then(|m| m.best_stage.clone()))
    }

    fn runs_for(&self, quantity: u64) -> u64 {
        let rate = self.config.assumed_drop_rate;
        if rate <= 0.0 {
            return quantity;
        }
        (quantity as f64 / rate).ceil() as u64
    }
}

fn push_unique(warnings: &mut Vec<String>, message: String) {
    if !warnings.contains(&message) {
        warnings.push(message);
    }
}
