use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dq_config::ConfigStore;
use dq_hub::{CycleOptions, HubRuntime, HubService, SimPort};
use dq_session::SessionStore;

#[derive(Parser)]
#[command(name = "dq-cli")]
#[command(about = "daqflow CLI - Data acquisition and feedback control hub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the stored configuration documents
    Validate {
        /// Directory holding config.json, pid.json and script.json
        config_dir: PathBuf,
    },
    /// List recorded sessions
    Sessions {
        /// Session log root directory
        logs_dir: PathBuf,
    },
    /// Show details of one recorded session
    ShowSession {
        /// Session log root directory
        logs_dir: PathBuf,
        /// Session ID to display
        session_id: String,
    },
    /// Export a session's CSV data
    Export {
        /// Session log root directory
        logs_dir: PathBuf,
        /// Session ID
        session_id: String,
        /// Output CSV file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the acquisition cycle against the simulated device
    Run {
        /// Directory holding config.json, pid.json and script.json
        config_dir: PathBuf,
        /// Session log root directory
        logs_dir: PathBuf,
        /// How long to run, in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Override the configured sample rate in Hz
        #[arg(long)]
        rate: Option<f64>,
        /// Persist every Nth tick
        #[arg(long, default_value_t = 1)]
        log_every: u64,
        /// Broadcast every Mth tick
        #[arg(long, default_value_t = 1)]
        broadcast_every: u64,
        /// Suppress per-frame output
        #[arg(long)]
        quiet: bool,
    },
}

type CliResult<T> = Result<T, CliError>;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] dq_config::ConfigError),

    #[error(transparent)]
    Session(#[from] dq_session::SessionError),

    #[error(transparent)]
    Hub(#[from] dq_hub::HubError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> CliResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_dir } => cmd_validate(&config_dir),
        Commands::Sessions { logs_dir } => cmd_sessions(&logs_dir),
        Commands::ShowSession {
            logs_dir,
            session_id,
        } => cmd_show_session(&logs_dir, &session_id),
        Commands::Export {
            logs_dir,
            session_id,
            output,
        } => cmd_export(&logs_dir, &session_id, output.as_deref()),
        Commands::Run {
            config_dir,
            logs_dir,
            duration,
            rate,
            log_every,
            broadcast_every,
            quiet,
        } => {
            let options = CycleOptions {
                log_every,
                broadcast_every,
                dump_first: 0,
            };
            cmd_run(&config_dir, &logs_dir, duration, rate, options, quiet).await
        }
    }
}

fn cmd_validate(config_dir: &Path) -> CliResult<()> {
    println!("Validating configuration: {}", config_dir.display());
    let store = ConfigStore::open(config_dir)?;
    let config = store.load_config()?;
    let pid = store.load_pid()?;
    let script = store.load_script()?;
    println!("✓ Configuration is valid");
    println!(
        "  {} analog, {} digital out, {} analog out, {} thermocouple channels",
        config.analogs.len(),
        config.digital_outputs.len(),
        config.analog_outputs.len(),
        config.included_tc_count()
    );
    println!("  Sample rate: {} Hz", config.sample_rate_hz());
    println!(
        "  {} feedback loops ({} enabled), {} script events",
        pid.loops.len(),
        pid.loops.iter().filter(|l| l.enabled).count(),
        script.events.len()
    );
    Ok(())
}

fn cmd_sessions(logs_dir: &Path) -> CliResult<()> {
    let store = SessionStore::new(logs_dir)?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found in {}", logs_dir.display());
    } else {
        println!("Recorded sessions:");
        for id in sessions {
            match store.load_manifest(&id) {
                Ok(manifest) => println!(
                    "  {} (started {}, {} Hz)",
                    id, manifest.started_at, manifest.rate_hz
                ),
                Err(_) => println!("  {} (no manifest)", id),
            }
        }
    }
    Ok(())
}

fn cmd_show_session(logs_dir: &Path, session_id: &str) -> CliResult<()> {
    let store = SessionStore::new(logs_dir)?;
    let manifest = store.load_manifest(session_id)?;
    let csv = std::fs::read_to_string(store.csv_path(session_id)?)?;
    let rows = csv.lines().count().saturating_sub(1);

    println!("Session {}", manifest.session_id);
    println!("  Started: {}", manifest.started_at);
    println!("  Rate: {} Hz", manifest.rate_hz);
    println!("  Recorded rows: {}", rows);
    Ok(())
}

fn cmd_export(logs_dir: &Path, session_id: &str, output: Option<&Path>) -> CliResult<()> {
    let store = SessionStore::new(logs_dir)?;
    let csv = std::fs::read_to_string(store.csv_path(session_id)?)?;

    if let Some(path) = output {
        std::fs::write(path, &csv)?;
        println!(
            "✓ Exported {} rows to {}",
            csv.lines().count().saturating_sub(1),
            path.display()
        );
    } else {
        print!("{}", csv);
    }
    Ok(())
}

async fn cmd_run(
    config_dir: &Path,
    logs_dir: &Path,
    duration: f64,
    rate: Option<f64>,
    options: CycleOptions,
    quiet: bool,
) -> CliResult<()> {
    let store = ConfigStore::open(config_dir)?;
    let config = store.load_config()?;
    let pid = store.load_pid()?;

    let runtime = Arc::new(HubRuntime::new(config, pid.loops));
    if let Some(hz) = rate {
        runtime.set_rate(hz);
    }

    let sessions = SessionStore::new(logs_dir)?;
    let service = HubService::new(runtime, Box::new(SimPort::new()), sessions, options);

    println!(
        "Running simulated acquisition for {:.1}s at {} Hz",
        duration,
        service.runtime().rate_hz()
    );
    let mut sub = service.join().await?;
    let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(duration.max(0.0));

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            msg = sub.rx.recv() => match msg {
                Some(wire) => {
                    if !quiet {
                        println!("{wire}");
                    }
                }
                None => break,
            },
        }
    }

    service.leave(sub.id).await;
    println!(
        "✓ Session recorded under {}",
        service.sessions().root().display()
    );
    Ok(())
}
