//! Keyboard activity detection by edge-triggered keymap sampling.

use tracing::trace;

use crate::backend::{BackendError, InputQuery};
use crate::keymap::{KEYMAP_BYTES, KeyBitmap};

/// Compares successive keyboard snapshots against the activity mask.
#[derive(Debug)]
pub struct ActivityDetector {
    mask: KeyBitmap,
    previous: KeyBitmap,
    ignore_modifier_combos: bool,
}

impl ActivityDetector {
    #[must_use]
    pub fn new(mask: KeyBitmap, ignore_modifier_combos: bool) -> Self {
        Self {
            mask,
            previous: KeyBitmap::empty(),
            ignore_modifier_combos,
        }
    }

    /// Query a fresh snapshot and report whether a tracked key went down
    /// since the previous call.
    ///
    /// The first call only establishes the baseline; its result should be
    /// discarded, otherwise keys already held at startup read as activity.
    pub fn sample<Q: InputQuery>(&mut self, query: &mut Q) -> Result<bool, BackendError> {
        let current = query.query_keyboard_state()?;
        Ok(self.observe(current))
    }

    /// Feed one snapshot through the detector.
    pub fn observe(&mut self, current: KeyBitmap) -> bool {
        let now = current.as_bytes();
        let before = self.previous.as_bytes();
        let mask = self.mask.as_bytes();

        let mut activity = false;
        let mut untracked_held = false;
        for i in 0..KEYMAP_BYTES {
            activity |= (now[i] & !before[i]) & mask[i] != 0;
            untracked_held |= now[i] & !mask[i] != 0;
        }

        // Any held untracked key (a modifier) vetoes the whole sample, so
        // Ctrl+C and friends never count as typing.
        if self.ignore_modifier_combos && untracked_held {
            trace!("Modifier held, ignoring key presses");
            activity = false;
        }

        self.previous = current;
        activity
    }
}
