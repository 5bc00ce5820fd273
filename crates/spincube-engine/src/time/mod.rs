//! Time subsystem.
//!
//! Provides the monotonic clock the render loop derives its rotation angle from.
//! Intended usage:
//! - one `FrameClock` per render loop
//! - call `tick()` once per presented frame to obtain `FrameTime`

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
