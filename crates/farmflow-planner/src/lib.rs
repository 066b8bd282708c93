//! # Farmflow Planner
//!
//! Material dependency resolution and training plans.
//!
//! ## Architecture
//! ```text
//! TrainingPlanner::generate(queue, mode, inventory)
//!   ├── RankTables      → per-entity material costs
//!   ├── Inventory       → netting (once per request)
//!   ├── MaterialResolver→ RecipeGraph expansion to farmable leaves
//!   └── StageCalendar   → open-today flag per stage
//! ```

pub mod calendar;
pub mod gamedata;
pub mod inventory;
pub mod planner;
pub mod recipes;
pub mod resolver;

pub use calendar::WeeklyStageCalendar;
pub use gamedata::{EntityRanks, GameData, RankCost, RankTables};
pub use inventory::Inventory;
pub use planner::{
    MATERIALS_COMPLETE, PlanMode, PlanStage, PlannedEntity, PromotionRequest, QueueDocument,
    QueueSettings, StageMaterial, TrainingPlan, TrainingPlanner,
};
pub use recipes::{Material, MaterialCatalog, RecipeGraph};
pub use resolver::{Expansion, GroupPolicy, MaterialNode, MaterialResolver};
