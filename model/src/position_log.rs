use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{gpx, LonLat, Track};

/// Loads a CSV log of positions from any number of tracks, interleaved in any order. Rows for
/// the same track must be in time order. Tracks come back sorted by name.
pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Track>> {
    // Read raw data
    let mut data_per_track: BTreeMap<String, Vec<(LonLat, DateTime<Utc>)>> = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Row = rec?;
        let time = gpx::parse_time(&rec.time)?;
        let pos = LonLat::new(rec.longitude, rec.latitude);
        data_per_track
            .entry(rec.track)
            .or_insert_with(Vec::new)
            .push((pos, time));
    }

    if data_per_track.is_empty() {
        bail!("No rows found in CSV file");
    }

    let mut results = Vec::new();
    for (name, raw) in data_per_track {
        results.push(Track::from_timed_positions(name, raw)?);
    }
    Ok(results)
}

#[derive(Deserialize)]
struct Row {
    track: String,
    time: String,
    latitude: f64,
    longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_track() {
        let input = "track,time,latitude,longitude
bike,2024-03-01T09:00:00Z,10.0,20.0
run,2024-03-01 09:00:00,1.0,2.0
bike,2024-03-01T09:00:10Z,10.5,20.5
run,2024-03-01 09:00:03,1.5,2.5
";
        let tracks = load(input.as_bytes()).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].name(), "bike");
        assert_eq!(tracks[0].duration_ms(), 10_000);
        assert_eq!(tracks[1].name(), "run");
        assert_eq!(tracks[1].duration_ms(), 3_000);
        assert_eq!(tracks[1].points()[1].pos, LonLat::new(2.5, 1.5));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(load("track,time,latitude,longitude\n".as_bytes()).is_err());
        assert!(load("track,time,latitude,longitude\na,noon,1,2\n".as_bytes()).is_err());
        assert!(load("track,time,latitude,longitude\na,2024-03-01T09:00:00Z,x,2\n".as_bytes()).is_err());
        // Out of order within one track
        let backwards = "track,time,latitude,longitude
a,2024-03-01T09:00:10Z,1,2
a,2024-03-01T09:00:00Z,1,2
";
        assert!(load(backwards.as_bytes()).is_err());
    }
}
