//! # Farmflow: scheduled game-automation flows
//!
//! Runs a task flow against the automation engine, on demand or at fixed
//! times of day, and keeps its farming stages in line with the training plan.
//!
//! Usage:
//!   farmflow init                     # Write default config + starter flow
//!   farmflow run                      # Run the flow now (Ctrl-C stops after the current task)
//!   farmflow daemon                   # Fire the flow at its scheduled times
//!   farmflow plan --mode all          # Show the farming plan for the whole queue
//!   farmflow apply-plan               # Write the plan into the flow's farming task
//!   farmflow history --limit 5        # Recent runs

mod cli_engine;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use farmflow_core::config::{FarmflowConfig, PlannerConfig, expand_path};
use farmflow_core::traits::ConfigStore;
use farmflow_planner::{GameData, PlanMode, TrainingPlan, TrainingPlanner, WeeklyStageCalendar};
use farmflow_scheduler::{
    ChannelNotifier, DispatchPolicy, FarmflowService, FlowDocument, FlowScheduler, JsonFileStore,
    RunHistoryDb, ScheduleSettings, Task, run_daemon,
};
use tracing_subscriber::EnvFilter;

use crate::cli_engine::CliEngine;

#[derive(Parser)]
#[command(
    name = "farmflow",
    version,
    about = "🌾 Farmflow: scheduled game-automation flows with material-driven farming plans"
)]
struct Cli {
    /// Config file (default: ~/.farmflow/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and a starter flow
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run a flow now
    Run {
        /// Flow key (default: scheduler.flow_key)
        #[arg(long)]
        flow: Option<String>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the flow at its scheduled times until Ctrl-C
    Daemon,
    /// Generate a farming plan from the training queue
    Plan {
        /// current | all
        #[arg(long, default_value = "current")]
        mode: PlanMode,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a plan and write it into the flow's farming task
    ApplyPlan {
        /// current | all
        #[arg(long, default_value = "current")]
        mode: PlanMode,
    },
    /// Show recent runs
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<FarmflowConfig> {
    let config = match path {
        Some(p) => FarmflowConfig::load_from(p)?,
        None => FarmflowConfig::load()?,
    };
    Ok(config)
}

/// Game data is optional; without it plans are empty but flows still run.
fn load_game_data(planner: &PlannerConfig) -> Result<GameData> {
    let path = expand_path(&planner.game_data);
    if !path.exists() {
        tracing::warn!("⚠️ No game data at {}, planning is disabled", path.display());
        return Ok(GameData::default());
    }
    Ok(GameData::load_from(&path)?)
}

fn build_service(config: &FarmflowConfig) -> Result<Arc<FarmflowService>> {
    let data_dir = expand_path(&config.storage.data_dir);
    let store: Arc<dyn ConfigStore> = Arc::new(JsonFileStore::new(&data_dir)?);

    let (catalog, recipes, ranks) = load_game_data(&config.planner)?.into_parts();
    let calendar = Arc::new(WeeklyStageCalendar::new(config.planner.reset_hour));
    let planner = Arc::new(TrainingPlanner::new(
        catalog,
        recipes,
        ranks,
        calendar.clone(),
        config.planner.clone(),
    ));

    let engine = Arc::new(CliEngine::new(&config.engine, &data_dir.join("tasks")));
    let mut scheduler = FlowScheduler::new(
        engine,
        calendar,
        config.engine.connection.clone(),
        DispatchPolicy::from(&config.scheduler),
    );
    let notifier = ChannelNotifier::from_config(&config.notify);
    if !notifier.is_empty() {
        scheduler = scheduler.with_notifier(Arc::new(notifier));
    }

    let history_path = expand_path(&config.storage.history_db);
    let history = RunHistoryDb::open(&history_path)
        .with_context(|| format!("opening run history {}", history_path.display()))?;

    let service = FarmflowService::new(store, planner, scheduler, &config.scheduler.flow_key)
        .with_history(history);
    Ok(Arc::new(service))
}

/// First Ctrl-C asks the running flow to stop after its current task.
fn stop_on_ctrl_c(service: Arc<FarmflowService>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && service.request_stop() {
            println!("\n🛑 Stopping after the current task...");
        }
    });
}

fn print_plan(plan: &TrainingPlan) {
    for entity in &plan.entities {
        println!("👤 {} ({} materials missing)", entity.name, entity.required_materials.len());
    }
    for stage in &plan.stages {
        let open = if stage.is_open_today { "open" } else { "closed today" };
        let mats: Vec<String> = stage
            .materials
            .iter()
            .map(|m| format!("{} ×{}", m.name, m.count))
            .collect();
        println!(
            "🗺️  {:<8} {:>4} runs  {:>5} sanity  [{open}]  {}",
            stage.stage_id,
            stage.total_runs,
            stage.sanity_cost,
            mats.join(", ")
        );
    }
    println!("Σ {} sanity", plan.total_sanity);
    for warning in &plan.warnings {
        println!("⚠️  {warning}");
    }
}

fn init(config_path: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = config_path.cloned().unwrap_or_else(FarmflowConfig::default_path);
    let config = if path.exists() && !force {
        println!("⚠️  Config already exists at {} (use --force to overwrite)", path.display());
        FarmflowConfig::load_from(&path)?
    } else {
        let config = FarmflowConfig::default();
        config.save_to(&path)?;
        println!("✅ Config written to {}", path.display());
        config
    };

    let store = JsonFileStore::new(&expand_path(&config.storage.data_dir))?;
    let key = &config.scheduler.flow_key;
    if FlowDocument::load(&store, key)?.is_none() {
        let flow = FlowDocument {
            task_flow: vec![Task::start_up("StartUp"), Task::fight("Fight", Vec::new())],
            schedule: ScheduleSettings {
                enabled: false,
                times: vec!["05:30".into()],
            },
            ..FlowDocument::default()
        };
        flow.save(&store, key)?;
        println!("✅ Starter flow '{key}' written to {}", store.dir().display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "farmflow=debug,farmflow_core=debug,farmflow_planner=debug,farmflow_scheduler=debug"
    } else {
        "farmflow=info,farmflow_core=info,farmflow_planner=info,farmflow_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FARMFLOW_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if let Commands::Init { force } = &cli.command {
        return init(cli.config.as_ref(), *force);
    }

    let config = load_config(cli.config.as_ref())?;
    let service = build_service(&config)?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Run { flow, json } => {
            let flow = flow.unwrap_or_else(|| service.flow_key().to_string());
            stop_on_ctrl_c(service.clone());
            let summary = service.run_now(&flow).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("🏁 {}", summary.headline());
                for e in &summary.errors {
                    println!("   ❌ {}: {}", e.name, e.reason);
                }
                for s in &summary.skipped {
                    println!("   ⏭️  {}: {}", s.name, s.reason);
                }
                if !summary.not_run.is_empty() {
                    println!("   🛑 not run: {}", summary.not_run.join(", "));
                }
            }
        }
        Commands::Daemon => {
            let interval = Duration::from_secs(config.scheduler.check_interval_secs.max(1));
            let daemon = tokio::spawn(run_daemon(service.clone(), interval));
            tokio::signal::ctrl_c().await?;
            if service.request_stop() {
                println!("\n🛑 Waiting for the current task to finish...");
                while service.execution_status().is_running {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
            daemon.abort();
            println!("👋 Daemon stopped");
        }
        Commands::Plan { mode, json } => {
            let plan = service.generate_plan(mode)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
        }
        Commands::ApplyPlan { mode } => {
            let plan = service.generate_plan(mode)?;
            let outcome = service.apply_plan(&plan)?;
            println!(
                "✅ {} auto stages written ({} stages in the farming task)",
                outcome.stage_count, outcome.total_stages
            );
        }
        Commands::History { limit } => {
            let runs = service.recent_runs(limit)?;
            if runs.is_empty() {
                println!("No runs recorded yet.");
            }
            for run in runs {
                let stopped = if run.stopped { " (stopped)" } else { "" };
                println!(
                    "#{:<4} {}  {:<12} {}{stopped}  {}s",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M"),
                    run.run_id,
                    run.summary.headline(),
                    run.duration_ms / 1000
                );
            }
        }
    }

    Ok(())
}
