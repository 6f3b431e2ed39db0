//! X11 backend over the core protocol and the `XInput` 1 extension.
//!
//! Keyboard state comes from `QueryKeymap` and `GetModifierMapping`; the
//! device is toggled through its "Device Enabled" property.

use super::{BackendError, DeviceProperty, InputQuery};
use crate::keymap::KeyBitmap;
use tracing::{debug, info};
use x11rb::NONE;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::xinput::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _, PropMode};
use x11rb::rust_connection::RustConnection;

/// Device type atoms that identify a pointing device worth disabling.
const POINTER_CLASSES: [&[u8]; 3] = [b"TOUCHPAD", b"MOUSE", b"TRACKBALL"];

/// Property toggled on the device.
const ENABLE_PROPERTY: &[u8] = b"Device Enabled";

/// Connection to the X server holding an opened input device.
pub struct X11Backend {
    conn: RustConnection,
    device_id: u8,
    device_name: String,
    enable_prop: Atom,
}

impl X11Backend {
    /// Connect to `$DISPLAY` and open the device to control.
    ///
    /// With `device_id` set only that device is accepted. Otherwise the last
    /// listed touchpad, mouse or trackball is used.
    pub fn connect(device_id: Option<u8>) -> Result<Self, BackendError> {
        let (conn, _screen) = x11rb::connect(None)?;

        if conn
            .extension_information(xinput::X11_EXTENSION_NAME)?
            .is_none()
        {
            return Err(BackendError::ExtensionMissing(xinput::X11_EXTENSION_NAME));
        }
        let version = conn
            .xinput_get_extension_version(xinput::X11_EXTENSION_NAME.as_bytes())?
            .reply()?;
        debug!(
            "XInput version {}.{}",
            version.server_major, version.server_minor
        );

        let mut classes = Vec::with_capacity(POINTER_CLASSES.len());
        for name in POINTER_CLASSES {
            let atom = conn.intern_atom(true, name)?.reply()?.atom;
            if atom != NONE {
                classes.push(atom);
            }
        }
        let enable_prop = conn.intern_atom(true, ENABLE_PROPERTY)?.reply()?.atom;

        let listing = conn.xinput_list_input_devices()?.reply()?;
        let index = listing
            .devices
            .iter()
            .rposition(|info| match device_id {
                Some(id) => info.device_id == id,
                None => classes.contains(&info.device_type),
            })
            .ok_or(match device_id {
                Some(id) => BackendError::DeviceNotFound(id),
                None => BackendError::NoDevice,
            })?;

        let info = &listing.devices[index];
        let device_name = listing
            .names
            .get(index)
            .map(|s| String::from_utf8_lossy(&s.name).into_owned())
            .unwrap_or_default();

        let backend = Self::open(conn, info.device_id, device_name, enable_prop)?;

        info!(
            "Controlling device '{}' (id={})",
            backend.device_name, backend.device_id
        );
        Ok(backend)
    }

    fn open(
        conn: RustConnection,
        device_id: u8,
        device_name: String,
        enable_prop: Atom,
    ) -> Result<Self, BackendError> {
        if let Err(source) = conn.xinput_open_device(device_id)?.reply() {
            return Err(BackendError::OpenFailed {
                name: device_name,
                source,
            });
        }

        // From here on the device is open and gets closed on drop
        let backend = Self {
            conn,
            device_id,
            device_name,
            enable_prop,
        };

        let atoms = backend
            .conn
            .xinput_list_device_properties(device_id)?
            .reply()?
            .atoms;
        if atoms.is_empty() {
            return Err(BackendError::NoProperties(backend.device_name.clone()));
        }
        if enable_prop == NONE || !atoms.contains(&enable_prop) {
            return Err(BackendError::NoEnableProperty(
                backend.device_name.clone(),
            ));
        }

        Ok(backend)
    }
}

impl InputQuery for X11Backend {
    fn query_keyboard_state(&mut self) -> Result<KeyBitmap, BackendError> {
        let reply = self.conn.query_keymap()?.reply()?;
        Ok(KeyBitmap::from_bytes(reply.keys))
    }

    fn query_modifier_keycodes(&mut self) -> Result<Vec<u8>, BackendError> {
        let reply = self.conn.get_modifier_mapping()?.reply()?;
        Ok(reply.keycodes.into_iter().filter(|&k| k != 0).collect())
    }
}

impl DeviceProperty for X11Backend {
    fn read_property(&mut self) -> Result<Option<u32>, BackendError> {
        let integer: Atom = AtomEnum::INTEGER.into();
        let reply = self
            .conn
            .xinput_get_device_property(self.enable_prop, integer, 0, 1, self.device_id, false)?
            .reply()?;

        if reply.type_ == NONE {
            return Ok(None);
        }

        let value = match reply.items {
            xinput::GetDevicePropertyItems::Data8(data) => data.first().copied().map(u32::from),
            xinput::GetDevicePropertyItems::Data16(data) => {
                data.first().copied().map(u32::from)
            }
            xinput::GetDevicePropertyItems::Data32(data) => data.first().copied(),
            xinput::GetDevicePropertyItems::InvalidValue(_) => None,
        };
        Ok(value)
    }

    fn write_property(&mut self, value: u32) -> Result<(), BackendError> {
        let byte = u8::try_from(value).map_err(|_| BackendError::ValueOutOfRange(value))?;
        let integer: Atom = AtomEnum::INTEGER.into();
        let items = xinput::ChangeDevicePropertyAux::Data8(vec![byte]);

        self.conn.xinput_change_device_property(
            self.enable_prop,
            integer,
            self.device_id,
            PropMode::REPLACE,
            1,
            &items,
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        self.conn.flush()?;
        Ok(())
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        if self.conn.xinput_close_device(self.device_id).is_ok() {
            let _ = self.conn.flush();
        }
    }
}
