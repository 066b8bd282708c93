//! Scripted collaborators for scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::{AutomationEngine, Notifier, StageCalendar};
use farmflow_core::types::{
    CommandOutput, ConnectionParams, DynamicTask, ExecutionSummary, StageAvailability,
};

use crate::status::StatusHandle;

/// Engine that replays queued outputs per label and records every call.
#[derive(Default)]
pub struct ScriptedEngine {
    outputs: Mutex<HashMap<String, VecDeque<std::result::Result<CommandOutput, String>>>>,
    probes: Mutex<VecDeque<bool>>,
    busy_polls: Mutex<u32>,
    calls: Mutex<Vec<String>>,
    stop_after: Mutex<Option<(usize, StatusHandle)>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an output for the next dispatch labelled `label`.
    pub fn respond(&self, label: &str, output: CommandOutput) {
        self.outputs
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(Ok(output));
    }

    /// Queue an engine error for the next dispatch labelled `label`.
    pub fn fail(&self, label: &str, reason: &str) {
        self.outputs
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(Err(reason.to_string()));
    }

    /// Liveness probe answers, consumed in order; `true` once exhausted.
    pub fn probe_results(&self, results: &[bool]) {
        self.probes.lock().unwrap().extend(results.iter().copied());
    }

    /// Report busy for the next `polls` checks.
    pub fn busy_for(&self, polls: u32) {
        *self.busy_polls.lock().unwrap() = polls;
    }

    /// Request a stop on `handle` right after the `n`-th dispatch.
    pub fn stop_after(&self, n: usize, handle: StatusHandle) {
        *self.stop_after.lock().unwrap() = Some((n, handle));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn dispatch(&self, label: &str) -> Result<CommandOutput> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(label.to_string());
            calls.len()
        };
        if let Some((n, handle)) = self.stop_after.lock().unwrap().as_ref() {
            if *n == count {
                handle.request_stop();
            }
        }
        let next = self
            .outputs
            .lock()
            .unwrap()
            .get_mut(label)
            .and_then(|q| q.pop_front());
        match next {
            Some(Ok(output)) => Ok(output),
            Some(Err(reason)) => Err(FarmflowError::Engine(reason)),
            None => Ok(CommandOutput::ok("done")),
        }
    }
}

#[async_trait]
impl AutomationEngine for ScriptedEngine {
    async fn run_command(&self, name: &str, _args: &[String]) -> Result<CommandOutput> {
        self.dispatch(name)
    }

    async fn run_dynamic_task(&self, task: &DynamicTask) -> Result<CommandOutput> {
        self.dispatch(&task.label)
    }

    async fn capture_liveness_probe(&self, connection: &ConnectionParams) -> Result<()> {
        let alive = self.probes.lock().unwrap().pop_front().unwrap_or(true);
        if alive {
            Ok(())
        } else {
            Err(FarmflowError::Probe(format!("no frame from {}", connection.address)))
        }
    }

    async fn is_busy(&self) -> Result<bool> {
        let mut polls = self.busy_polls.lock().unwrap();
        if *polls > 0 {
            *polls -= 1;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Calendar with a fixed set of closed stages.
pub struct ClosedStages(pub Vec<&'static str>);

impl StageCalendar for ClosedStages {
    fn is_stage_open_today(&self, stage_id: &str) -> StageAvailability {
        if self.0.contains(&stage_id) {
            StageAvailability::closed(format!("{stage_id} is closed today"))
        } else {
            StageAvailability::open()
        }
    }
}

/// Notifier that keeps every summary it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<ExecutionSummary>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, summary: &ExecutionSummary) -> Result<()> {
        self.seen.lock().unwrap().push(summary.clone());
        if self.fail {
            return Err(FarmflowError::Notify("channel down".into()));
        }
        Ok(())
    }
}
