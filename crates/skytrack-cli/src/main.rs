//! `skytrack` – operator entry point for the tracking decision core.
//!
//! Three subcommands over a run directory of append-only JSONL logs:
//!
//! - `skytrack fuse  --run <id|latest|path>` – offline batch fusion of the
//!   per-source observation logs into `fused.jsonl`.
//! - `skytrack tail  --run …` – live fusion tailer until Ctrl-C.
//! - `skytrack track --run … [--speed F]` – replay `fused.jsonl` through the
//!   state controller; the command transport is external, so the commands
//!   log is the outbound interface.

mod config;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use clap::{Parser, Subcommand};
use colored::Colorize;

use skytrack_kernel::{CommandGate, NullVehicle};
use skytrack_perception::{FusionTailer, fuse_run};
use skytrack_runtime::{AuditLog, LinkMonitor, StateController, init_tracing, run_replay};
use skytrack_types::{TrackError, jsonl};

#[derive(Parser)]
#[command(name = "skytrack", version, about = "Autonomous target-tracking decision core")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, default_value = "configs/skytrack.toml")]
    config: PathBuf,

    /// Directory containing the run directories.
    #[arg(long, global = true, default_value = "runs")]
    runs_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Batch-fuse a run's per-source observation logs into fused.jsonl.
    Fuse {
        /// Run id under the runs root, `latest`, or an explicit path.
        #[arg(long, default_value = "latest")]
        run: String,
    },
    /// Tail the per-source logs live, fusing until Ctrl-C.
    Tail {
        #[arg(long, default_value = "latest")]
        run: String,
    },
    /// Replay the fused log through the state controller.
    Track {
        #[arg(long, default_value = "latest")]
        run: String,

        /// Playback speed relative to recorded time; 0 replays as fast as
        /// possible.
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
}

fn main() {
    init_tracing("skytrack");
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), TrackError> {
    let config = config::load(&cli.config)?;

    match cli.command {
        Command::Fuse { run } => {
            let run_dir = resolve_run(&cli.runs_root, &run)?;
            let written = fuse_run(&run_dir, &config.fusion.to_batch_config())?;
            println!(
                "{} {} fused record(s) -> {}",
                "✓".green(),
                written,
                run_dir.join("fused.jsonl").display().to_string().bold()
            );
            Ok(())
        }
        Command::Tail { run } => {
            let run_dir = resolve_run(&cli.runs_root, &run)?;
            tail(&run_dir, &config)
        }
        Command::Track { run, speed } => {
            let run_dir = resolve_run(&cli.runs_root, &run)?;
            track(&run_dir, &config, speed)
        }
    }
}

fn tail(run_dir: &Path, config: &config::Config) -> Result<(), TrackError> {
    println!(
        "{} tailing {} (Ctrl-C to stop)",
        "▶".cyan(),
        run_dir.display().to_string().bold()
    );

    let tailer = FusionTailer::new(run_dir, config.fusion.to_tailer_config());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| TrackError::Config(format!("failed to start async runtime: {e}")))?;

    runtime.block_on(tailer.run(async {
        let _ = tokio::signal::ctrl_c().await;
    }))?;

    println!("{} tailer stopped", "✓".green());
    Ok(())
}

fn track(run_dir: &Path, config: &config::Config, speed: f64) -> Result<(), TrackError> {
    let audit = AuditLog::new(run_dir, config.fsm.event_cooldown_sec);
    let gate = CommandGate::new(config.gate.to_gate_config());
    let mut controller = StateController::new(config.fsm.clone(), gate, audit, NullVehicle);
    let mut link = LinkMonitor::new(run_dir);

    let steps = run_replay(run_dir, &mut controller, &mut link, speed)?;
    println!(
        "{} {} step(s) replayed, final state {}",
        "✓".green(),
        steps,
        controller.state().to_string().bold()
    );
    Ok(())
}

/// Resolve a run argument to a directory: an existing path is taken as-is,
/// `latest` picks the most recently modified run, anything else is looked up
/// under the runs root.
fn resolve_run(runs_root: &Path, run: &str) -> Result<PathBuf, TrackError> {
    let as_path = Path::new(run);
    if as_path.is_dir() {
        return Ok(as_path.to_path_buf());
    }
    if run == "latest" {
        return latest_run(runs_root);
    }
    let dir = runs_root.join(run);
    if dir.is_dir() {
        Ok(dir)
    } else {
        Err(TrackError::MissingInput(format!(
            "run directory {} not found",
            dir.display()
        )))
    }
}

fn latest_run(runs_root: &Path) -> Result<PathBuf, TrackError> {
    let entries = std::fs::read_dir(runs_root).map_err(|e| jsonl::io_err(runs_root, &e))?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    if let Some((_, path)) = &newest {
        tracing::debug!(run = %path.display(), "resolved latest run");
    }
    newest.map(|(_, path)| path).ok_or_else(|| {
        TrackError::MissingInput(format!(
            "no run directories under {}",
            runs_root.display()
        ))
    })
}
