//! Time subsystem.
//!
//! Provides stable, testable frame timing utilities without coupling to the
//! runtime. Intended usage:
//! - one `FrameClock` per window: call `tick()` once per presented frame
//! - one `Ticker` per simulation: feed it each frame's delta time and run the
//!   whole ticks it yields

mod frame_clock;
mod ticker;

pub use frame_clock::{FrameClock, FrameTime};
pub use ticker::Ticker;
