//! Windowing-system collaborators.
//!
//! The monitor only needs two narrow capabilities from the display server:
//! reading the keyboard state and toggling a single integer property on the
//! pointing device. Both are expressed as traits so the state machines can be
//! driven without a live X server.

mod x11;

use thiserror::Error;
pub use x11::X11Backend;

use crate::keymap::KeyBitmap;

/// Source of keyboard state snapshots.
pub trait InputQuery {
    /// Snapshot of every key code currently held down.
    fn query_keyboard_state(&mut self) -> Result<KeyBitmap, BackendError>;

    /// Key codes bound to any modifier slot (`Shift`, `Lock`, `Control`, `Mod1`..`Mod5`).
    ///
    /// Unused slots are not reported.
    fn query_modifier_keycodes(&mut self) -> Result<Vec<u8>, BackendError>;
}

/// The "enabled" property of the controlled pointing device.
pub trait DeviceProperty {
    /// Current property value, or `None` when the server returned no data.
    fn read_property(&mut self) -> Result<Option<u32>, BackendError>;

    /// Replace the property value. Not visible to other clients until
    /// [`flush`](Self::flush) is called.
    fn write_property(&mut self, value: u32) -> Result<(), BackendError>;

    fn flush(&mut self) -> Result<(), BackendError>;
}

/// Errors talking to the display server or resolving the device.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Can't open display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("Display connection failed: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("X request failed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("X server does not support the {0} extension")]
    ExtensionMissing(&'static str),

    #[error("Unable to find a device")]
    NoDevice,

    #[error("Unable to find the specified device (id={0})")]
    DeviceNotFound(u8),

    #[error("Failed to open device '{name}': {source}")]
    OpenFailed {
        name: String,
        #[source]
        source: x11rb::errors::ReplyError,
    },

    #[error("No properties on device '{0}'")]
    NoProperties(String),

    #[error("Could not identify enable/disable property on device '{0}'")]
    NoEnableProperty(String),

    #[error("Property value {0} does not fit the 8-bit device property")]
    ValueOutOfRange(u32),
}
