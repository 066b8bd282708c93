//! # Farmflow Scheduler
//!
//! Runs ordered task flows against a game-automation engine and keeps the
//! farming task in step with the training plan.
//!
//! ## Design Principles
//! - One flow at a time, tasks strictly sequential
//! - Stop requests honoured between tasks, never mid-task
//! - JSON documents for flows, queue and depot; SQLite for run history
//! - Tokio timers only, zero overhead when idle
//!
//! ## Architecture
//! ```text
//! Daemon (tokio interval) ──┐
//! CLI run ──────────────────┤
//!                           ▼
//! FarmflowService::run_now(flow)
//!   └── FlowScheduler::run
//!         ├── StartUp → engine + liveness probe (retried)
//!         ├── Fight   → StageCalendar → engine → classify
//!         ├── Builtin / Predefined → engine
//!         └── on finish
//!               ├── PlanInjector::update → TrainingPlanner
//!               ├── ChannelNotifier → Telegram / Discord / Webhook
//!               └── RunHistoryDb (SQLite)
//! ```

pub mod classify;
pub mod cron;
pub mod daemon;
pub mod dispatch;
pub mod engine;
pub mod injector;
pub mod notify;
pub mod persistence;
pub mod service;
pub mod status;
pub mod store;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use classify::FightVerdict;
pub use daemon::{ScheduleClock, run_daemon};
pub use dispatch::{ChannelNotifier, NotifyTarget};
pub use engine::{DispatchPolicy, FlowScheduler};
pub use injector::{ApplyOutcome, PlanInjector};
pub use notify::{Notification, NotifyPriority};
pub use persistence::{RunHistoryDb, RunRecord};
pub use service::FarmflowService;
pub use status::{ScheduleExecutionStatus, StatusHandle};
pub use store::{JsonFileStore, MemoryStore};
pub use tasks::{
    EntryOrigin, FightParams, FlowDocument, ScheduleSettings, StageEntry, StartUpParams, Task,
    TaskClass, TaskParams,
};
