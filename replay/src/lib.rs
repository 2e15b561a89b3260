//! Replays any number of tracks together, sharing one clock scaled by a speed multiplier, and
//! looping forever once they've all finished.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod clock;
mod engine;
mod geometry;
mod scheduler;
mod sink;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::engine::{SessionHandle, SessionID, TickReport, TimelineEngine, LOOP_PAUSE};
pub use self::geometry::{head_feature, history_feature, track_color};
pub use self::scheduler::{FrameQueue, FrameScheduler};
pub use self::sink::{Layer, RenderSink};
