//! Restoring the device when the process is told to exit.
//!
//! Termination signals are turned into a future the poll loop can wait on.
//! Once one arrives the device is re-enabled, the pid file removed and the
//! signal delivered again with its default disposition, so the exit status
//! still says which signal killed the process.

use std::io;

use futures_util::future::select_all;
use libc::c_int;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{debug, info, warn};

use crate::backend::{DeviceProperty, InputQuery};
use crate::daemon::PidFile;
use crate::monitor::MonitorContext;

/// Signals that restore the device before terminating.
///
/// Synchronous faults (SIGILL, SIGBUS, SIGFPE, SIGSEGV) are left alone: they
/// cannot be deferred to the event loop.
pub const HANDLED_SIGNALS: &[c_int] = &[
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTRAP,
    libc::SIGABRT,
    libc::SIGUSR1,
    libc::SIGUSR2,
    libc::SIGPIPE,
    libc::SIGALRM,
    libc::SIGTERM,
    #[cfg(any(target_os = "linux", target_os = "android"))]
    libc::SIGPWR,
];

/// Listeners for every handled signal.
pub struct TerminationSignals {
    listeners: Vec<(c_int, Signal)>,
}

impl TerminationSignals {
    /// Install listeners. Must be called from within a tokio runtime.
    pub fn register() -> io::Result<Self> {
        Self::register_only(HANDLED_SIGNALS)
    }

    /// Install listeners for a subset of signals.
    pub fn register_only(signals: &[c_int]) -> io::Result<Self> {
        let listeners = signals
            .iter()
            .map(|&signum| Ok((signum, signal(SignalKind::from_raw(signum))?)))
            .collect::<io::Result<Vec<_>>>()?;
        debug!("Installed {} signal listeners", listeners.len());
        Ok(Self { listeners })
    }

    /// Wait for the next termination signal and return its number.
    pub async fn recv(&mut self) -> c_int {
        if self.listeners.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.listeners.iter_mut().map(|(signum, listener)| {
            Box::pin(async move {
                listener.recv().await;
                *signum
            })
        });
        let (signum, _, _) = select_all(waits).await;
        signum
    }
}

/// Re-enable the device and remove the pid file.
///
/// Failures are logged, never propagated: this runs on the way out and
/// should get as far as it can.
pub fn shutdown<B>(ctx: &mut MonitorContext<B>, pid_file: Option<&PidFile>)
where
    B: InputQuery + DeviceProperty,
{
    if let Err(e) = ctx.restore() {
        warn!("Failed to re-enable device: {}", e);
    }

    if let Some(pid_file) = pid_file
        && let Err(e) = pid_file.remove()
    {
        warn!("Failed to remove pid file {}: {}", pid_file.path().display(), e);
    }
}

/// Deliver `signum` to this process with its default action restored.
pub fn reraise(signum: c_int) -> ! {
    info!("Terminating on signal {}", signum);

    // SAFETY: resetting a disposition and raising a signal have no memory
    // safety preconditions.
    unsafe {
        libc::signal(signum, libc::SIG_DFL);
        libc::raise(signum);
    }

    // Only reached for signals whose default action is not to terminate
    std::process::exit(128 + signum)
}
