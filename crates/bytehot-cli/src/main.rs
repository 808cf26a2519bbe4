//! Standalone command-line frontend for ByteHot Core.
//!
//! A `clap` derive structure with an async entry point that returns a
//! process [`ExitCode`] instead of bubbling every error through `anyhow` —
//! exact exit codes are pinned per outcome (`0` success, `2` configuration
//! error, `3` host incompatibility, `1` anything else), which a single
//! `Result<(), anyhow::Error>` `main` can't express directly.
//!
//! There is no real native instrumentation binding in this standalone
//! build — the host JVM-equivalent capability is stood in by
//! `bytehot_executor::MockInstrumentationPort`, selected via
//! `--assume-capable`. A future native binding would implement
//! `InstrumentationPort` and be substituted at this one call site.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bytehot_config::ConfigArgs;
use bytehot_events::DomainEvent;
use bytehot_executor::MockInstrumentationPort;
use bytehot_runtime::{Runtime, RuntimeConfig};
use bytehot_store::{EventStore, FsEventStore};
use clap::{Parser, Subcommand};

const EXIT_OK: u8 = 0;
const EXIT_OTHER: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_HOST_INCOMPATIBLE: u8 = 3;

const PID_FILE_NAME: &str = "bytehot.pid";
const STOP_FILE_NAME: &str = "bytehot.stop";
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(
    name = "bytehot",
    version = env!("CARGO_PKG_VERSION"),
    about = "ByteHot Core — live bytecode hot-swap agent",
    propagate_version = true
)]
struct Cli {
    /// Path to the YAML configuration file (default: `BYTEHOT_CONFIG` env,
    /// then `bytehot.yaml` in the working directory).
    #[arg(long, global = true, env = "BYTEHOT_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// Log verbosity (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach and run the agent in the foreground until interrupted or
    /// asked to stop.
    Start {
        /// Report what would happen without attaching or watching
        /// anything.
        #[arg(long)]
        dry_run: bool,
        /// Exit with the host-incompatibility code unless the host reports
        /// redefinition or retransformation capability.
        #[arg(long)]
        require_capability: bool,
        /// Assume the host instrumentation reports full capability.
        #[arg(long)]
        assume_capable: bool,
        /// Directory root the event store persists under.
        #[arg(long, default_value = "bytehot-events")]
        event_store: PathBuf,
    },
    /// Ask a running agent to stop.
    Stop {
        /// Directory root the running agent's event store persists under.
        #[arg(long, default_value = "bytehot-events")]
        event_store: PathBuf,
    },
    /// Report the status of a running (or previously run) agent.
    Status {
        /// Directory root the agent's event store persists under.
        #[arg(long, default_value = "bytehot-events")]
        event_store: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = cli.log_level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt().with_max_level(level).with_target(false).try_init();

    let tokio_runtime = tokio::runtime::Runtime::new().expect("failed to start the Tokio runtime");
    match tokio_runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "bytehot exited with an error");
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_OTHER)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    match cli.command {
        Command::Start {
            dry_run,
            require_capability,
            assume_capable,
            event_store,
        } => start(cli.config, dry_run, require_capability, assume_capable, event_store).await,
        Command::Stop { event_store } => stop(event_store).await,
        Command::Status { event_store } => status(cli.config, event_store).await,
    }
}

async fn start(
    config_path: Option<PathBuf>,
    dry_run: bool,
    require_capability: bool,
    assume_capable: bool,
    event_store_root: PathBuf,
) -> anyhow::Result<u8> {
    let config_args = ConfigArgs {
        config_path,
        port: None,
        validation_mode: None,
    };

    if dry_run {
        return match bytehot_config::load(&config_args) {
            Ok(configuration) => {
                println!(
                    "configuration OK: {} watch path(s), validation mode {}",
                    configuration.watch_paths.len(),
                    configuration.validation_mode
                );
                Ok(EXIT_OK)
            }
            Err(err) => {
                eprintln!("configuration error: {err}");
                Ok(EXIT_CONFIG_ERROR)
            }
        };
    }

    tokio::fs::create_dir_all(&event_store_root).await?;

    let instrumentation = if assume_capable {
        MockInstrumentationPort::always_succeeds()
    } else {
        MockInstrumentationPort::incapable()
    };

    let runtime_config = RuntimeConfig {
        event_store_root: event_store_root.clone(),
        config_args,
        install_metrics: true,
        ..RuntimeConfig::default()
    };

    let runtime = match Runtime::new(runtime_config, Arc::new(instrumentation)).await {
        Ok(runtime) => runtime,
        Err(bytehot_runtime::RuntimeError::Config(err)) => {
            eprintln!("configuration error: {err}");
            return Ok(EXIT_CONFIG_ERROR);
        }
        Err(err) => return Err(err.into()),
    };

    let pid_file = event_store_root.join(PID_FILE_NAME);
    tokio::fs::write(&pid_file, std::process::id().to_string()).await?;

    let events = runtime.attach_at_startup().await?;

    let not_started = events.iter().find_map(|envelope| match &envelope.payload {
        DomainEvent::ByteHotNotStarted { reason } => Some(reason.clone()),
        _ => None,
    });
    if let Some(reason) = not_started {
        let _ = tokio::fs::remove_file(&pid_file).await;
        eprintln!("agent did not start: {reason}");
        return Ok(EXIT_CONFIG_ERROR);
    }

    let capable = events
        .iter()
        .any(|envelope| matches!(envelope.payload, DomainEvent::HotSwapCapabilityEnabled { .. }));
    if require_capability && !capable {
        let _ = tokio::fs::remove_file(&pid_file).await;
        eprintln!("host does not report redefinition or retransformation capability");
        return Ok(EXIT_HOST_INCOMPATIBLE);
    }

    println!("bytehot agent attached, watching {} path(s)", runtime.configuration().watch_paths.len());

    let stop_file = event_store_root.join(STOP_FILE_NAME);
    wait_for_shutdown_signal(&stop_file).await;

    runtime.shutdown().await?;
    let _ = tokio::fs::remove_file(&pid_file).await;
    let _ = tokio::fs::remove_file(&stop_file).await;
    println!("bytehot agent stopped");
    Ok(EXIT_OK)
}

async fn wait_for_shutdown_signal(stop_file: &std::path::Path) {
    let stop_file_poll = async {
        loop {
            if tokio::fs::metadata(stop_file).await.is_ok() {
                return;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = stop_file_poll => {}
    }
}

async fn stop(event_store_root: PathBuf) -> anyhow::Result<u8> {
    let pid_file = event_store_root.join(PID_FILE_NAME);
    match tokio::fs::read_to_string(&pid_file).await {
        Ok(pid) => {
            tokio::fs::write(event_store_root.join(STOP_FILE_NAME), b"stop").await?;
            println!("stop requested for agent pid {}", pid.trim());
        }
        Err(_) => {
            println!("no running agent found under {}", event_store_root.display());
        }
    }
    Ok(EXIT_OK)
}

async fn status(config_path: Option<PathBuf>, event_store_root: PathBuf) -> anyhow::Result<u8> {
    let config_args = ConfigArgs {
        config_path,
        port: None,
        validation_mode: None,
    };
    let configuration = match bytehot_config::load(&config_args) {
        Ok(configuration) => configuration,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };

    let running = tokio::fs::metadata(event_store_root.join(PID_FILE_NAME)).await.is_ok();
    println!("running: {running}");
    println!("watch paths: {}", configuration.watch_paths.len());
    println!("validation mode: {}", configuration.validation_mode);

    if !event_store_root.exists() {
        println!("event store: not yet created at {}", event_store_root.display());
        return Ok(EXIT_OK);
    }

    let store = FsEventStore::open(&event_store_root).await?;
    let healthy = store.is_healthy().await;
    let total_events = store.total_count().await?;
    println!("event store: {} event(s) recorded, healthy={healthy}", total_events);

    Ok(if healthy { EXIT_OK } else { EXIT_OTHER })
}
