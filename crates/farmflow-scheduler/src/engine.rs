//! Flow scheduler: runs a task flow in order against the automation engine.
//!
//! One task at a time, awaited to completion. Stop requests are honoured
//! between tasks only; whatever is in flight finishes first.
//!
//! ```text
//! run(tasks, run_id)
//!   ├── for each enabled task
//!   │     ├── should_stop? → rest becomes not_run
//!   │     ├── StartUp  → dispatch + liveness probe, retried
//!   │     ├── Fight    → per (stage, runs) pair: calendar, dispatch, classify
//!   │     ├── other    → dispatch once
//!   │     └── wait while engine busy, then settle delay
//!   └── finish status → PlanInjector::update → Notifier
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use farmflow_core::config::SchedulerConfig;
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::{AutomationEngine, Notifier, StageCalendar};
use farmflow_core::types::{CommandOutput, ConnectionParams, DynamicTask, ExecutionSummary};
use tokio::time::Instant;

use crate::classify::{FightVerdict, SANITY_EXHAUSTED, classify_fight_output};
use crate::injector::PlanInjector;
use crate::status::StatusHandle;
use crate::tasks::{FightParams, StartUpParams, Task, TaskClass, TaskParams};

/// Timing and retry knobs for dispatch.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Extra start-up attempts after the first one fails.
    pub startup_retries: u32,
    pub startup_delay: Duration,
    pub task_delay: Duration,
    pub poll_interval: Duration,
    /// Give up waiting for the engine to go idle after this long.
    pub max_wait: Duration,
}

impl From<&SchedulerConfig> for DispatchPolicy {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            startup_retries: config.startup_retries,
            startup_delay: config.startup_delay(),
            task_delay: config.task_delay(),
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        }
    }
}

impl DispatchPolicy {
    /// No settle delays, tight polling.
    pub fn immediate() -> Self {
        Self {
            startup_retries: 2,
            startup_delay: Duration::ZERO,
            task_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_secs(1),
        }
    }

    fn settle_delay(&self, class: TaskClass) -> Duration {
        match class {
            TaskClass::Startup => self.startup_delay,
            TaskClass::Farming | TaskClass::Default => self.task_delay,
        }
    }
}

/// Executes task flows and owns the live status record.
pub struct FlowScheduler {
    engine: Arc<dyn AutomationEngine>,
    calendar: Arc<dyn StageCalendar>,
    connection: ConnectionParams,
    policy: DispatchPolicy,
    status: StatusHandle,
    injector: Option<Arc<PlanInjector>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl FlowScheduler {
    pub fn new(
        engine: Arc<dyn AutomationEngine>,
        calendar: Arc<dyn StageCalendar>,
        connection: ConnectionParams,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            engine,
            calendar,
            connection,
            policy,
            status: StatusHandle::new(),
            injector: None,
            notifier: None,
        }
    }

    /// Refresh auto-generated stage entries after every run.
    pub fn with_injector(mut self, injector: Arc<PlanInjector>) -> Self {
        self.injector = Some(injector);
        self
    }

    /// Send each run summary to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Run every enabled task of `tasks` in order.
    ///
    /// Never fails: per-task problems end up in the summary. Injector and
    /// notifier errors are logged and swallowed.
    pub async fn run(&self, tasks: &[Task], run_id: &str) -> ExecutionSummary {
        let started = Instant::now();
        let enabled: Vec<&Task> = tasks.iter().filter(|t| t.enabled).collect();
        let total = enabled.len();
        self.status.begin(run_id, total);
        tracing::info!("▶️ Run '{run_id}' started: {total} tasks");

        let mut summary = ExecutionSummary::new(run_id, Utc::now());
        let mut completed = 0;
        for (index, task) in enabled.iter().enumerate() {
            if self.status.should_stop() {
                summary.stopped = true;
                summary.not_run = enabled[index..].iter().map(|t| t.display_name()).collect();
                tracing::info!("🛑 Run '{run_id}' stopped before '{}'", task.display_name());
                break;
            }

            let name = task.display_name();
            self.status.enter_step(
                index,
                &task.id,
                format!("Running {name} ({}/{total})", index + 1),
            );
            tracing::info!("🔔 [{}/{total}] {name}", index + 1);

            match &task.params {
                TaskParams::StartUp(params) => self.run_startup(task, params, &mut summary).await,
                TaskParams::Fight(params) => self.run_fight(task, params, &mut summary).await,
                TaskParams::Builtin { task_type, config } => {
                    let request = DynamicTask {
                        task_id: task.id.clone(),
                        kind: task_type.clone(),
                        config: config.clone(),
                        label: name.clone(),
                        wait_for_completion: true,
                    };
                    let result = self.engine.run_dynamic_task(&request).await;
                    self.record_single(&name, result, &mut summary).await;
                }
                TaskParams::Predefined { command_id, args } => {
                    let result = self.engine.run_command(command_id, args).await;
                    self.record_single(&name, result, &mut summary).await;
                }
            }
            completed += 1;

            let delay = self.policy.settle_delay(task.class());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        let message = if summary.stopped {
            format!("Terminated by user after {completed}/{total} tasks")
        } else {
            format!("Completed: {}", summary.headline())
        };
        tracing::info!("🏁 Run '{run_id}': {message}");
        self.status.finish(message);

        if let Some(injector) = &self.injector {
            if let Err(e) = injector.update(run_id) {
                tracing::warn!("⚠️ Plan update after '{run_id}' failed: {e}");
            }
        }
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&summary).await {
                tracing::warn!("⚠️ Notification for '{run_id}' failed: {e}");
            }
        }
        summary
    }

    async fn record_single(
        &self,
        name: &str,
        result: Result<CommandOutput>,
        summary: &mut ExecutionSummary,
    ) {
        match result {
            Ok(output) if output.success() => {
                self.wait_until_idle(name).await;
                summary.record_success(format!("{name}: done"));
            }
            Ok(output) => summary.record_failure(name, output.failure_reason()),
            Err(e) => summary.record_failure(name, e.to_string()),
        }
    }

    async fn run_startup(
        &self,
        task: &Task,
        params: &StartUpParams,
        summary: &mut ExecutionSummary,
    ) {
        let name = task.display_name();
        let connection = params
            .connection
            .clone()
            .unwrap_or_else(|| self.connection.clone());
        let attempts = self.policy.startup_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.try_startup(task, params, &connection).await {
                Ok(()) => {
                    let note = if attempt == 1 {
                        format!("{name}: started")
                    } else {
                        format!("{name}: started after {attempt} attempts")
                    };
                    summary.record_success(note);
                    return;
                }
                Err(e) => {
                    tracing::warn!("⚠️ {name} attempt {attempt}/{attempts} failed: {e}");
                    last_error = e.to_string();
                }
            }
        }
        summary.record_failure(&name, format!("gave up after {attempts} attempts: {last_error}"));
    }

    async fn try_startup(
        &self,
        task: &Task,
        params: &StartUpParams,
        connection: &ConnectionParams,
    ) -> Result<()> {
        let client_type = params
            .client_type
            .clone()
            .unwrap_or_else(|| connection.client_type.clone());
        let mut config = serde_json::json!({
            "client_type": client_type,
            "start_game_enabled": true,
        });
        if let Some(account) = &params.account_name {
            config["account_name"] = serde_json::json!(account);
        }
        let request = DynamicTask {
            task_id: task.id.clone(),
            kind: "StartUp".into(),
            config,
            label: task.display_name(),
            wait_for_completion: true,
        };
        let output = self.engine.run_dynamic_task(&request).await?;
        if !output.success() {
            return Err(FarmflowError::Engine(output.failure_reason()));
        }
        self.wait_until_idle(&request.label).await;
        self.engine.capture_liveness_probe(connection).await
    }

    /// Each pair is judged on its own: a closed or failed stage never stops
    /// the others. Only exhausted sanity skips the rest.
    async fn run_fight(&self, task: &Task, params: &FightParams, summary: &mut ExecutionSummary) {
        let name = task.display_name();
        let mut exhausted: Option<String> = None;

        for entry in &params.stages {
            let label = format!("{name} ({})", entry.stage);
            if let Some(reason) = &exhausted {
                summary.record_skip(&label, reason.clone());
                continue;
            }

            let availability = self.calendar.is_stage_open_today(&entry.stage);
            if !availability.is_open {
                tracing::info!("⏭️ {label}: {}", availability.reason);
                summary.record_skip(&label, availability.reason);
                continue;
            }

            let request = DynamicTask {
                task_id: task.id.clone(),
                kind: "Fight".into(),
                config: params.stage_config(entry),
                label: label.clone(),
                wait_for_completion: true,
            };
            let output = match self.engine.run_dynamic_task(&request).await {
                Ok(output) => output,
                Err(e) => {
                    summary.record_failure(&label, e.to_string());
                    continue;
                }
            };
            self.wait_until_idle(&label).await;

            match classify_fight_output(&entry.stage, &output) {
                FightVerdict::Completed { runs: Some(n) } => {
                    summary.record_success(format!("{label}: {n} runs"));
                }
                FightVerdict::Completed { runs: None } => {
                    summary.record_success(format!("{label}: done"));
                }
                FightVerdict::SanityExhausted(reason) => {
                    tracing::info!("🪫 {label}: {reason}");
                    summary.record_skip(&label, reason);
                    exhausted = Some(SANITY_EXHAUSTED.into());
                }
                FightVerdict::Failed(reason) => summary.record_failure(&label, reason),
            }
        }
    }

    /// Poll until the engine reports idle, bounded by `max_wait`.
    async fn wait_until_idle(&self, label: &str) {
        let deadline = Instant::now() + self.policy.max_wait;
        loop {
            match self.engine.is_busy().await {
                Ok(false) => return,
                Ok(true) if Instant::now() >= deadline => {
                    tracing::warn!(
                        "⏳ {label}: engine still busy after {:?}, moving on",
                        self.policy.max_wait
                    );
                    return;
                }
                Ok(true) => tokio::time::sleep(self.policy.poll_interval).await,
                Err(e) => {
                    tracing::warn!("⚠️ {label}: busy check failed: {e}");
                    return;
                }
            }
        }
    }
}
