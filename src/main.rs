//! padguard - disable the touchpad while typing.
//!
//! Watches keyboard activity on the X display and suppresses the touchpad
//! (or the first mouse/trackball) until the keyboard has been idle.

use padguard::backend::X11Backend;
use padguard::config::{Config, Overrides};
use padguard::daemon::{self, Detached, PidFile};
use padguard::monitor::MonitorContext;
use padguard::termination::{self, TerminationSignals};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Bad command line or configuration.
const EXIT_USAGE: u8 = 1;
/// Device I/O failed while monitoring.
const EXIT_RUNTIME: u8 = 1;
/// Display, device, signal or pid file setup failed.
const EXIT_SETUP: u8 = 2;
/// Could not fork into the background.
const EXIT_FORK: u8 = 3;

/// Disable the touchpad while typing.
///
/// Monitors keyboard activity and disables the touchpad (or the first mouse
/// or trackball found) until no key has been pressed for the idle time.
#[derive(Parser, Debug)]
#[command(name = "padguard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How many seconds to wait after the last key press before enabling
    /// the touchpad [default: 2.0].
    #[arg(short = 'i', long, allow_negative_numbers = true)]
    idle_time: Option<f64>,

    /// How many milliseconds to wait until the next poll [default: 200].
    #[arg(short = 'm', long)]
    poll_delay: Option<u64>,

    /// Start as a daemon, i.e. in the background.
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Create a pid file with the specified name (daemon mode only).
    #[arg(short = 'p', long)]
    pid_file: Option<PathBuf>,

    /// Ignore modifier keys when monitoring keyboard activity.
    #[arg(short = 'k', long)]
    ignore_modifier_keys: bool,

    /// Like -k but also ignore Modifier+Key combos.
    #[arg(short = 'K', long)]
    ignore_modifier_combos: bool,

    /// Device ID to toggle (by default the first touchpad, mouse or
    /// trackball found).
    #[arg(short = 'D', long = "device")]
    device_id: Option<u8>,

    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            idle_time: self.idle_time,
            poll_interval_ms: self.poll_delay,
            ignore_modifier_keys: self.ignore_modifier_keys,
            ignore_modifier_combos: self.ignore_modifier_combos,
            device_id: self.device_id,
            pid_file: self.pid_file.clone(),
        }
    }
}

/// A fatal error and the exit status it maps to.
struct Fatal {
    code: u8,
    error: anyhow::Error,
}

trait OrExit<T> {
    fn or_exit(self, code: u8) -> Result<T, Fatal>;
}

impl<T, E: Into<anyhow::Error>> OrExit<T> for Result<T, E> {
    fn or_exit(self, code: u8) -> Result<T, Fatal> {
        self.map_err(|e| Fatal {
            code,
            error: e.into(),
        })
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
        Err(e) => e.exit(),
    };

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("{e:#}");
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(fatal) => {
            error!("{:#}", fatal.error);
            ExitCode::from(fatal.code)
        }
    }
}

/// Initialize logging with the specified level.
///
/// Logs go to stderr; stdout carries the Enable/Disable notifications.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("padguard={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Resolve configuration and the device, detach if asked, then monitor.
///
/// Only returns on failure, or in the parent after a successful detach.
fn run(args: &Args) -> Result<(), Fatal> {
    let config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")
        .or_exit(EXIT_USAGE)?
        .with_overrides(args.overrides())
        .validate()
        .map_err(|e| {
            eprintln!("{}", Args::command().render_usage());
            Fatal {
                code: EXIT_USAGE,
                error: e.into(),
            }
        })?;

    if config.pid_file.is_some() && !args.daemon {
        warn!("Pid file is only written in daemon mode, ignoring");
    }

    info!("padguard v{} starting", env!("CARGO_PKG_VERSION"));

    let backend = X11Backend::connect(config.device_id).or_exit(EXIT_SETUP)?;

    // Fork before the runtime exists: the child must start single-threaded
    if args.daemon && daemon::detach().or_exit(EXIT_FORK)? == Detached::Parent {
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")
        .or_exit(EXIT_SETUP)?;

    runtime.block_on(monitor(backend, &config, args.daemon))
}

/// Run the poll loop until a termination signal arrives.
async fn monitor(backend: X11Backend, config: &Config, detached: bool) -> Result<(), Fatal> {
    let mut signals = TerminationSignals::register()
        .context("Failed to install signal handlers")
        .or_exit(EXIT_SETUP)?;

    let mut ctx = MonitorContext::new(backend, config, !detached)
        .context("Failed to read device state")
        .or_exit(EXIT_SETUP)?;

    let pid_file = match &config.pid_file {
        Some(path) if detached => Some(PidFile::create(path).or_exit(EXIT_SETUP)?),
        _ => None,
    };

    match ctx.run(signals.recv()).await {
        Ok(signum) => {
            termination::shutdown(&mut ctx, pid_file.as_ref());
            termination::reraise(signum)
        }
        Err(e) => {
            termination::shutdown(&mut ctx, pid_file.as_ref());
            Err(e)
                .context("Lost connection to the device")
                .or_exit(EXIT_RUNTIME)
        }
    }
}
