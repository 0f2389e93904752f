//! Quadfall engine crate.
//!
//! This crate owns the platform + GPU runtime pieces used by the game layer:
//! window and event loop, frame/tick timing, and the batched quad renderer.

pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
