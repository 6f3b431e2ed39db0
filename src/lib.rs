//! padguard - disable the touchpad while typing.
//!
//! Samples the X keyboard state at a fixed interval and switches the
//! pointing device off while keys are being pressed, switching it back on
//! once the keyboard has been idle for a configurable period.

pub mod activity;
pub mod backend;
pub mod config;
pub mod daemon;
pub mod device;
pub mod keymap;
pub mod monitor;
pub mod termination;
