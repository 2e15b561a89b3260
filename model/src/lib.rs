#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub mod gpx;
pub mod import;
pub mod position_log;
mod track;

pub use self::track::{LonLat, Point, Sample, Track};
