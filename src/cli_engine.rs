//! Automation engine backed by the `maa` command-line tool and `adb`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use farmflow_core::config::EngineConfig;
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::AutomationEngine;
use farmflow_core::types::{CommandOutput, ConnectionParams, DynamicTask};
use tokio::process::Command;

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct CliEngine {
    cli_path: String,
    adb_path: String,
    /// Where dynamic task files are written before `maa run`.
    task_dir: PathBuf,
    busy: AtomicBool,
}

impl CliEngine {
    pub fn new(config: &EngineConfig, task_dir: &Path) -> Self {
        Self {
            cli_path: config.cli_path.clone(),
            adb_path: config.adb_path.clone(),
            task_dir: task_dir.to_path_buf(),
            busy: AtomicBool::new(false),
        }
    }

    async fn exec(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!("🔧 {program} {}", args.join(" "));
        self.busy.store(true, Ordering::SeqCst);
        let result = Command::new(program).args(args).output().await;
        self.busy.store(false, Ordering::SeqCst);

        let output = result
            .map_err(|e| FarmflowError::Engine(format!("failed to spawn {program}: {e}")))?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Task file understood by `maa run`: a single task of `kind` with `config` as params.
fn task_file_contents(task: &DynamicTask) -> serde_json::Value {
    serde_json::json!({
        "tasks": [{
            "name": task.label,
            "type": task.kind,
            "params": task.config,
        }]
    })
}

fn task_file_name(task: &DynamicTask) -> String {
    let safe: String = task
        .task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("farmflow-{}-{safe}", task.kind.to_lowercase())
}

fn looks_like_png(bytes: &[u8]) -> bool {
    bytes.len() > PNG_MAGIC.len() && bytes.starts_with(PNG_MAGIC)
}

#[async_trait]
impl AutomationEngine for CliEngine {
    async fn run_command(&self, name: &str, args: &[String]) -> Result<CommandOutput> {
        let mut full = vec![name.to_string()];
        full.extend(args.iter().cloned());
        self.exec(&self.cli_path, &full).await
    }

    async fn run_dynamic_task(&self, task: &DynamicTask) -> Result<CommandOutput> {
        tokio::fs::create_dir_all(&self.task_dir).await?;
        let name = task_file_name(task);
        let path = self.task_dir.join(format!("{name}.json"));
        let contents = serde_json::to_string_pretty(&task_file_contents(task))?;
        tokio::fs::write(&path, contents).await?;
        self.exec(&self.cli_path, &["run".to_string(), name]).await
    }

    async fn capture_liveness_probe(&self, connection: &ConnectionParams) -> Result<()> {
        let capture = Command::new(&self.adb_path)
            .args(["-s", connection.address.as_str(), "exec-out", "screencap", "-p"])
            .output();
        let output = tokio::time::timeout(PROBE_TIMEOUT, capture)
            .await
            .map_err(|_| {
                FarmflowError::Probe(format!("screencap on {} timed out", connection.address))
            })?
            .map_err(|e| FarmflowError::Probe(format!("failed to spawn {}: {e}", self.adb_path)))?;

        if output.status.success() && looks_like_png(&output.stdout) {
            Ok(())
        } else {
            Err(FarmflowError::Probe(format!(
                "no frame from {} ({} bytes, {})",
                connection.address,
                output.stdout.len(),
                output.status
            )))
        }
    }

    async fn is_busy(&self) -> Result<bool> {
        Ok(self.busy.load(Ordering::SeqCst))
    }
}
