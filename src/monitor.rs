//! Poll loop tying keyboard activity to the device state.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::activity::ActivityDetector;
use crate::backend::{BackendError, DeviceProperty, InputQuery};
use crate::config::Config;
use crate::device::{DeviceController, Transition};
use crate::keymap::build_key_mask;

/// Everything the daemon mutates, owned in one place.
pub struct MonitorContext<B> {
    backend: B,
    detector: ActivityDetector,
    controller: DeviceController,
    idle_threshold: Duration,
    poll_interval: Duration,
    /// `None` until the first key press; treated as infinitely idle.
    last_activity: Option<Instant>,
}

impl<B: InputQuery + DeviceProperty> MonitorContext<B> {
    /// Capture the device baseline and build the activity mask.
    ///
    /// `announce` prints transitions on stdout.
    pub fn new(mut backend: B, config: &Config, announce: bool) -> Result<Self, BackendError> {
        let controller = DeviceController::new(&mut backend, announce)?;
        let mask = build_key_mask(&mut backend, config.ignore_modifier_keys);
        let detector = ActivityDetector::new(mask, config.ignore_modifier_combos);

        Ok(Self {
            backend,
            detector,
            controller,
            idle_threshold: config.idle_threshold(),
            poll_interval: config.poll_interval(),
            last_activity: None,
        })
    }

    /// Take the baseline keyboard snapshot. Must precede the first tick.
    pub fn seed(&mut self) -> Result<(), BackendError> {
        self.detector.sample(&mut self.backend)?;
        Ok(())
    }

    /// One poll: sample the keyboard at `now` and apply the resulting
    /// enable/disable decision.
    pub fn tick(&mut self, now: Instant) -> Result<Transition, BackendError> {
        if self.detector.sample(&mut self.backend)? {
            self.last_activity = Some(now);
        }

        let enable = match self.last_activity {
            Some(at) => now.saturating_duration_since(at) > self.idle_threshold,
            None => true,
        };

        self.controller.set_enabled(&mut self.backend, enable)
    }

    /// Poll until `shutdown` resolves, returning its output.
    ///
    /// `shutdown` is only observed while the loop sleeps, so it never
    /// interrupts a keyboard query or device write halfway.
    pub async fn run<F, T>(&mut self, shutdown: F) -> Result<T, BackendError>
    where
        F: Future<Output = T>,
    {
        tokio::pin!(shutdown);

        self.seed()?;
        info!(
            "Monitoring keyboard (idle {:?}, poll {:?})",
            self.idle_threshold, self.poll_interval
        );

        loop {
            match self.tick(Instant::now())? {
                Transition::Unchanged => {}
                transition => debug!("Device {:?}", transition),
            }

            tokio::select! {
                () = tokio::time::sleep(self.poll_interval) => {}
                out = &mut shutdown => return Ok(out),
            }
        }
    }

    /// Force the device back to enabled if this process suppressed it.
    pub fn restore(&mut self) -> Result<Transition, BackendError> {
        self.controller.set_enabled(&mut self.backend, true)
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.controller.is_suppressed()
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
