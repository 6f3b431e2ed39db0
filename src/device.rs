//! Pointing device enable/disable state machine.
//!
//! Tracks whether this process has suppressed the device and only touches the
//! device property when a transition is actually required.

use tracing::{debug, info, warn};

use crate::backend::{BackendError, DeviceProperty};

/// Property value written to suppress input.
pub const DISABLED_VALUE: u32 = 0;

/// Outcome of a [`DeviceController::set_enabled`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Device was suppressed and has been restored.
    Enabled,
    /// Device was active and has been suppressed.
    Suppressed,
    /// Nothing was written.
    Unchanged,
}

/// Write-on-change controller for the device "enabled" property.
#[derive(Debug)]
pub struct DeviceController {
    /// Value restored on enable; last value observed from the hardware.
    enabled_value: u32,

    /// Whether this controller last wrote [`DISABLED_VALUE`].
    suppressed: bool,

    /// Print "Enable"/"Disable" on stdout (foreground only).
    announce: bool,
}

impl DeviceController {
    /// Capture the device's current value as the baseline to restore.
    ///
    /// A device whose property cannot be read keeps the disabled sentinel as
    /// its baseline, which leaves it permanently enabled: there would be
    /// nothing known to restore it to.
    pub fn new<D: DeviceProperty>(device: &mut D, announce: bool) -> Result<Self, BackendError> {
        let enabled_value = match device.read_property()? {
            Some(value) => value,
            None => {
                warn!("Device property returned no value; the device will not be disabled");
                DISABLED_VALUE
            }
        };

        info!("Device enabled value: {}", enabled_value);

        Ok(Self {
            enabled_value,
            suppressed: false,
            announce,
        })
    }

    /// Request the device be enabled (`true`) or suppressed (`false`).
    ///
    /// Writes only on a genuine transition. Suppression is skipped when the
    /// last observed hardware value already equals [`DISABLED_VALUE`].
    pub fn set_enabled<D: DeviceProperty>(
        &mut self,
        device: &mut D,
        should_enable: bool,
    ) -> Result<Transition, BackendError> {
        let (value, transition) = if self.suppressed && should_enable {
            (self.enabled_value, Transition::Enabled)
        } else if !self.suppressed && !should_enable && self.enabled_value != DISABLED_VALUE {
            // Someone else may have changed the property since startup
            if let Some(current) = device.read_property()? {
                self.enabled_value = current;
            }
            (DISABLED_VALUE, Transition::Suppressed)
        } else {
            return Ok(Transition::Unchanged);
        };

        device.write_property(value)?;
        device.flush()?;

        self.suppressed = transition == Transition::Suppressed;
        debug!("Wrote device property {} ({:?})", value, transition);

        if self.announce {
            match transition {
                Transition::Enabled => println!("Enable"),
                Transition::Suppressed => println!("Disable"),
                Transition::Unchanged => {}
            }
        }

        Ok(transition)
    }

    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    #[must_use]
    pub fn enabled_value(&self) -> u32 {
        self.enabled_value
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory device property recording every write.
    #[derive(Debug, Default)]
    pub(crate) struct FakeDevice {
        pub value: Option<u32>,
        pub writes: Vec<u32>,
        pub flushed: Vec<u32>,
    }

    impl FakeDevice {
        pub fn with_value(value: u32) -> Self {
            Self {
                value: Some(value),
                ..Self::default()
            }
        }
    }

    impl DeviceProperty for FakeDevice {
        fn read_property(&mut self) -> Result<Option<u32>, BackendError> {
            Ok(self.value)
        }

        fn write_property(&mut self, value: u32) -> Result<(), BackendError> {
            self.value = Some(value);
            self.writes.push(value);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), BackendError> {
            if let Some(value) = self.value {
                self.flushed.push(value);
            }
            Ok(())
        }
    }

    #[test]
    fn test_new_captures_baseline() {
        let mut device = FakeDevice::with_value(1);
        let controller = DeviceController::new(&mut device, false).unwrap();
        assert_eq!(controller.enabled_value(), 1);
        assert!(!controller.is_suppressed());
        assert!(device.writes.is_empty());
    }

    #[test]
    fn test_suppress_then_enable() {
        let mut device = FakeDevice::with_value(1);
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        assert_eq!(
            controller.set_enabled(&mut device, false).unwrap(),
            Transition::Suppressed
        );
        assert!(controller.is_suppressed());
        assert_eq!(device.value, Some(DISABLED_VALUE));

        assert_eq!(
            controller.set_enabled(&mut device, true).unwrap(),
            Transition::Enabled
        );
        assert!(!controller.is_suppressed());
        assert_eq!(device.writes, vec![DISABLED_VALUE, 1]);
    }

    #[test]
    fn test_every_write_is_flushed() {
        let mut device = FakeDevice::with_value(1);
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        controller.set_enabled(&mut device, false).unwrap();
        controller.set_enabled(&mut device, true).unwrap();
        assert_eq!(device.flushed, device.writes);
    }

    #[test]
    fn test_repeated_decisions_write_once() {
        let mut device = FakeDevice::with_value(1);
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        // Already enabled: nothing to do
        assert_eq!(
            controller.set_enabled(&mut device, true).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(
            controller.set_enabled(&mut device, true).unwrap(),
            Transition::Unchanged
        );
        assert!(device.writes.is_empty());

        controller.set_enabled(&mut device, false).unwrap();
        assert_eq!(
            controller.set_enabled(&mut device, false).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(device.writes.len(), 1);

        controller.set_enabled(&mut device, true).unwrap();
        assert_eq!(
            controller.set_enabled(&mut device, true).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(device.writes.len(), 2);
    }

    #[test]
    fn test_already_disabled_device_is_left_alone() {
        let mut device = FakeDevice::with_value(DISABLED_VALUE);
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        assert_eq!(
            controller.set_enabled(&mut device, false).unwrap(),
            Transition::Unchanged
        );
        assert!(!controller.is_suppressed());
        assert!(device.writes.is_empty());
    }

    #[test]
    fn test_unreadable_device_is_never_suppressed() {
        let mut device = FakeDevice::default();
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        assert_eq!(controller.enabled_value(), DISABLED_VALUE);
        assert_eq!(
            controller.set_enabled(&mut device, false).unwrap(),
            Transition::Unchanged
        );
        assert!(device.writes.is_empty());
    }

    #[test]
    fn test_baseline_refreshed_before_suppressing() {
        let mut device = FakeDevice::with_value(1);
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        // Another client changed the property after startup
        device.value = Some(3);
        controller.set_enabled(&mut device, false).unwrap();
        assert_eq!(controller.enabled_value(), 3);

        controller.set_enabled(&mut device, true).unwrap();
        assert_eq!(device.value, Some(3));
    }

    #[test]
    fn test_restores_pre_suppression_value_exactly() {
        let mut device = FakeDevice::with_value(0x7f);
        let mut controller = DeviceController::new(&mut device, false).unwrap();

        controller.set_enabled(&mut device, false).unwrap();
        assert_eq!(device.read_property().unwrap(), Some(DISABLED_VALUE));

        controller.set_enabled(&mut device, true).unwrap();
        assert_eq!(device.read_property().unwrap(), Some(0x7f));
    }
}
