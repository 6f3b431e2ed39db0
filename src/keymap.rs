//! Key code bitmaps and the activity mask.

use tracing::{debug, warn};

use crate::backend::InputQuery;

/// Bytes in a core-protocol keymap: one bit for each of the 256 key codes.
pub const KEYMAP_BYTES: usize = 32;

/// Fixed-size bitmap indexed by key code.
///
/// Used both for keyboard snapshots (a set bit means "held down") and for the
/// activity mask (a set bit means "presses of this key count as typing").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBitmap([u8; KEYMAP_BYTES]);

impl KeyBitmap {
    /// No keys set.
    #[must_use]
    pub const fn empty() -> Self {
        Self([0; KEYMAP_BYTES])
    }

    /// Every key set.
    #[must_use]
    pub const fn full() -> Self {
        Self([0xff; KEYMAP_BYTES])
    }

    /// Wrap a raw keymap as returned by the server, bit `n % 8` of byte
    /// `n / 8` standing for key code `n`.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEYMAP_BYTES]) -> Self {
        Self(bytes)
    }

    /// Bitmap with exactly the given key codes set.
    #[must_use]
    pub fn from_keycodes(keycodes: impl IntoIterator<Item = u8>) -> Self {
        let mut bitmap = Self::empty();
        for keycode in keycodes {
            bitmap.set(keycode);
        }
        bitmap
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEYMAP_BYTES] {
        &self.0
    }

    #[must_use]
    pub fn contains(&self, keycode: u8) -> bool {
        let (byte, bit) = Self::position(keycode);
        self.0[byte] & bit != 0
    }

    pub fn set(&mut self, keycode: u8) {
        let (byte, bit) = Self::position(keycode);
        self.0[byte] |= bit;
    }

    pub fn clear(&mut self, keycode: u8) {
        let (byte, bit) = Self::position(keycode);
        self.0[byte] &= !bit;
    }

    /// Number of key codes set.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.0.iter().map(|byte| byte.count_ones()).sum()
    }

    fn position(keycode: u8) -> (usize, u8) {
        (usize::from(keycode / 8), 1 << (keycode % 8))
    }
}

impl Default for KeyBitmap {
    fn default() -> Self {
        Self::empty()
    }
}

/// Build the mask of keys whose presses count as typing activity.
///
/// Every key counts unless `ignore_modifier_keys` is set, in which case the
/// key codes bound to modifier slots are removed. If the modifier mapping
/// cannot be queried the full mask is used.
#[must_use]
pub fn build_key_mask<Q: InputQuery>(query: &mut Q, ignore_modifier_keys: bool) -> KeyBitmap {
    let mut mask = KeyBitmap::full();

    if !ignore_modifier_keys {
        return mask;
    }

    match query.query_modifier_keycodes() {
        Ok(keycodes) => {
            for keycode in keycodes.into_iter().filter(|&k| k != 0) {
                mask.clear(keycode);
            }
            debug!("Ignoring {} modifier key codes", 256 - mask.count());
        }
        Err(e) => {
            warn!("Failed to query modifier mapping, tracking all keys: {}", e);
        }
    }

    mask
}
