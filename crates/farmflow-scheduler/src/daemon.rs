//! Daemon loop: fires a flow at its scheduled times of day.
//! Uses tokio::interval for zero-overhead ticking (sleeps between checks).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

use crate::cron;
use crate::service::FarmflowService;
use crate::tasks::ScheduleSettings;

/// Tracks the next due time for one flow's schedule.
#[derive(Debug)]
pub struct ScheduleClock<Tz: TimeZone> {
    armed_times: Vec<String>,
    next_fire: Option<DateTime<Tz>>,
}

impl<Tz: TimeZone> Default for ScheduleClock<Tz> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz: TimeZone> ScheduleClock<Tz> {
    pub fn new() -> Self {
        Self {
            armed_times: Vec::new(),
            next_fire: None,
        }
    }

    pub fn next_fire(&self) -> Option<&DateTime<Tz>> {
        self.next_fire.as_ref()
    }

    /// Whether the schedule is due at `now`. Re-arms for the following slot
    /// when it is, so every time fires at most once per day.
    pub fn poll(&mut self, schedule: &ScheduleSettings, now: &DateTime<Tz>) -> bool {
        if !schedule.enabled {
            self.armed_times.clear();
            self.next_fire = None;
            return false;
        }
        if schedule.times != self.armed_times || self.next_fire.is_none() {
            self.armed_times = schedule.times.clone();
            self.next_fire = cron::next_run_from_times(&self.armed_times, now);
            return false;
        }
        let due = match &self.next_fire {
            Some(at) => now >= at,
            None => false,
        };
        if due {
            self.next_fire = cron::next_run_from_times(&self.armed_times, now);
        }
        due
    }
}

/// Spawn-able daemon loop for the service's flow.
///
/// Reloads the schedule every tick so edits are picked up without restart.
/// A due time that hits while a run is still active is skipped.
pub async fn run_daemon(service: Arc<FarmflowService>, check_interval: Duration) {
    let flow_key = service.flow_key().to_string();
    tracing::info!(
        "⏰ Daemon started for '{flow_key}' (check every {}s)",
        check_interval.as_secs()
    );

    let mut interval = tokio::time::interval(check_interval);
    // Runs happen inline; ticks missed meanwhile are not replayed.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut clock: ScheduleClock<Local> = ScheduleClock::new();

    loop {
        interval.tick().await;

        let schedule = match service.schedule(&flow_key) {
            Ok(Some(schedule)) => schedule,
            Ok(None) => ScheduleSettings::default(),
            Err(e) => {
                tracing::warn!("⚠️ Cannot read schedule of '{flow_key}': {e}");
                continue;
            }
        };

        let before = clock.next_fire().cloned();
        let due = clock.poll(&schedule, &Local::now());
        let after = clock.next_fire().cloned();
        if before != after {
            if let Some(next) = &after {
                tracing::info!("📅 Next run of '{flow_key}' at {}", next.format("%Y-%m-%d %H:%M"));
            }
        }
        if !due {
            continue;
        }

        if service.execution_status().is_running {
            tracing::warn!("⏭️ '{flow_key}' is still running, skipping this slot");
            continue;
        }
        match service.run_now(&flow_key).await {
            Ok(summary) => tracing::info!("📣 [{flow_key}] {}", summary.headline()),
            Err(e) => tracing::warn!("⚠️ Scheduled run of '{flow_key}' failed: {e}"),
        }
    }
}
