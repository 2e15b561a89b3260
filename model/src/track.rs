use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 position. Longitude comes first, matching GeoJSON.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }

    /// Linear interpolation, independently per axis
    pub fn lerp(self, other: LonLat, pct: f64) -> LonLat {
        LonLat::new(
            self.lon + (other.lon - self.lon) * pct,
            self.lat + (other.lat - self.lat) * pct,
        )
    }

    pub fn to_geojson_position(self) -> Vec<f64> {
        vec![self.lon, self.lat]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub pos: LonLat,
    pub time: DateTime<Utc>,
    /// Milliseconds since the first point of the same track
    pub elapsed_ms: i64,
}

/// One recorded activity. Immutable once built; every constructor validates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    name: String,
    points: Vec<Point>,
}

/// Where a track is at some moment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub pos: LonLat,
    /// The last point at or before the sampled time. Everything up to and including this index
    /// has been visited.
    pub last_visited: usize,
}

impl Track {
    pub fn new(name: String, points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            bail!("Track {name} doesn't have any points");
        }
        for (idx, pt) in points.iter().enumerate() {
            if !pt.pos.is_finite() {
                bail!("Track {name} has a non-finite position at point {idx}: {:?}", pt.pos);
            }
            if pt.elapsed_ms < 0 {
                bail!(
                    "Track {name} has a point {idx} before its start ({}ms)",
                    pt.elapsed_ms
                );
            }
        }
        for pair in points.windows(2) {
            // Equal times are fine
            if pair[0].elapsed_ms > pair[1].elapsed_ms {
                bail!(
                    "Track {name} input out-of-order: {} then {}",
                    pair[0].time,
                    pair[1].time
                );
            }
        }
        Ok(Self { name, points })
    }

    /// Calculates elapsed time relative to the first position.
    pub fn from_timed_positions(name: String, raw: Vec<(LonLat, DateTime<Utc>)>) -> Result<Self> {
        let start = match raw.first() {
            Some((_, time)) => *time,
            None => bail!("Track {name} doesn't have any points"),
        };
        let points = raw
            .into_iter()
            .map(|(pos, time)| Point {
                pos,
                time,
                elapsed_ms: (time - start).num_milliseconds(),
            })
            .collect();
        Self::new(name, points)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.points[0].time
    }

    /// The elapsed time of the last point
    pub fn duration_ms(&self) -> i64 {
        self.points[self.points.len() - 1].elapsed_ms
    }

    /// Where is the track `elapsed_ms` after its start? Before the start, stays at the first
    /// point; after the end, stays at the last.
    pub fn sample(&self, elapsed_ms: f64) -> Sample {
        // The first point strictly in the future. Points are sorted by elapsed time, so binary
        // search works. A NaN time compares false everywhere and lands at the start.
        let next = self
            .points
            .partition_point(|pt| (pt.elapsed_ms as f64) <= elapsed_ms);

        if next == 0 {
            return Sample {
                pos: self.points[0].pos,
                last_visited: 0,
            };
        }
        if next == self.points.len() {
            return Sample {
                pos: self.points[next - 1].pos,
                last_visited: next - 1,
            };
        }

        let prev_pt = &self.points[next - 1];
        let next_pt = &self.points[next];
        let span = (next_pt.elapsed_ms - prev_pt.elapsed_ms) as f64;
        let progress = if span > 0.0 {
            (elapsed_ms - prev_pt.elapsed_ms as f64) / span
        } else {
            // Unreachable while points are sorted, since next_pt is strictly after elapsed_ms.
            // Snap to the earlier point rather than divide by zero.
            0.0
        };
        Sample {
            pos: prev_pt.pos.lerp(next_pt.pos, progress),
            last_visited: next - 1,
        }
    }

    /// The trail already covered at `sample`, ending exactly at the sampled position. Always has
    /// at least 2 positions.
    pub fn history(&self, sample: Sample) -> Vec<LonLat> {
        let mut pts: Vec<LonLat> = self.points[..=sample.last_visited]
            .iter()
            .map(|pt| pt.pos)
            .collect();
        pts.push(sample.pos);
        pts
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn track(raw: Vec<(i64, f64, f64)>) -> Track {
        Track::from_timed_positions(
            "test".to_string(),
            raw.into_iter()
                .map(|(ms, lon, lat)| (LonLat::new(lon, lat), t0() + Duration::milliseconds(ms)))
                .collect(),
        )
        .unwrap()
    }

    fn square() -> Track {
        track(vec![(0, 0.0, 0.0), (1000, 1.0, 0.0), (2000, 1.0, 1.0)])
    }

    fn close(a: LonLat, b: LonLat) -> bool {
        (a.lon - b.lon).abs() < 1e-9 && (a.lat - b.lat).abs() < 1e-9
    }

    #[test]
    fn before_start_stays_at_first_point() {
        let track = square();
        for t in [0.0, -1.0, -5000.0] {
            let sample = track.sample(t);
            assert!(close(sample.pos, LonLat::new(0.0, 0.0)), "at {t}");
            assert_eq!(sample.last_visited, 0);
        }
    }

    #[test]
    fn after_end_stays_at_last_point() {
        let track = square();
        for t in [2000.0, 2000.5, 1e9] {
            let sample = track.sample(t);
            assert!(close(sample.pos, LonLat::new(1.0, 1.0)), "at {t}");
            assert_eq!(sample.last_visited, 2);
        }
    }

    #[test]
    fn interpolates_along_segment() {
        let track = square();

        let sample = track.sample(500.0);
        assert!(close(sample.pos, LonLat::new(0.5, 0.0)));
        assert_eq!(sample.last_visited, 0);

        let sample = track.sample(1250.0);
        assert!(close(sample.pos, LonLat::new(1.0, 0.25)));
        assert_eq!(sample.last_visited, 1);

        // Exactly on a point counts as visited
        let sample = track.sample(1000.0);
        assert!(close(sample.pos, LonLat::new(1.0, 0.0)));
        assert_eq!(sample.last_visited, 1);
    }

    #[test]
    fn sampling_is_repeatable() {
        let track = square();
        assert_eq!(track.sample(733.3), track.sample(733.3));
    }

    #[test]
    fn equal_times_dont_break_interpolation() {
        let track = track(vec![
            (0, 0.0, 0.0),
            (1000, 1.0, 0.0),
            (1000, 2.0, 0.0),
            (2000, 3.0, 0.0),
        ]);
        let sample = track.sample(1000.0);
        assert!(sample.pos.is_finite());
        assert_eq!(sample.last_visited, 2);
        assert!(close(sample.pos, LonLat::new(2.0, 0.0)));

        let sample = track.sample(1500.0);
        assert!(close(sample.pos, LonLat::new(2.5, 0.0)));
    }

    #[test]
    fn unsorted_points_stay_finite() {
        // Bypasses the ordering check in Track::new
        let mut points = square().points;
        points.swap(1, 2);
        points.push(Point {
            pos: LonLat::new(2.0, 2.0),
            time: t0(),
            elapsed_ms: 500,
        });
        let track = Track {
            name: "unsorted".to_string(),
            points,
        };
        for t in [-1.0, 0.0, 500.0, 750.0, 1000.0, 1500.0, 2500.0] {
            let sample = track.sample(t);
            assert!(sample.pos.is_finite(), "at {t}");
            assert!(sample.last_visited < track.points().len());
        }
    }

    #[test]
    fn nan_time_doesnt_panic() {
        let sample = square().sample(f64::NAN);
        assert_eq!(sample.last_visited, 0);
    }

    #[test]
    fn single_point_track() {
        let track = track(vec![(0, 4.0, 5.0)]);
        assert_eq!(track.duration_ms(), 0);
        for t in [-1.0, 0.0, 10.0] {
            let sample = track.sample(t);
            assert!(close(sample.pos, LonLat::new(4.0, 5.0)));
            assert_eq!(sample.last_visited, 0);
        }
    }

    #[test]
    fn history_ends_at_head() {
        let track = square();
        let sample = track.sample(1500.0);
        let history = track.history(sample);
        assert_eq!(history.len(), 3);
        assert!(close(history[0], LonLat::new(0.0, 0.0)));
        assert!(close(history[1], LonLat::new(1.0, 0.0)));
        assert!(close(history[2], sample.pos));

        // Even before the start, there's a degenerate 2-point line
        assert_eq!(track.history(track.sample(-10.0)).len(), 2);
    }

    #[test]
    fn validation() {
        assert!(Track::new("empty".to_string(), Vec::new()).is_err());
        assert!(Track::from_timed_positions("empty".to_string(), Vec::new()).is_err());

        let backwards = vec![
            (LonLat::new(0.0, 0.0), t0()),
            (LonLat::new(0.0, 0.0), t0() - Duration::seconds(1)),
        ];
        assert!(Track::from_timed_positions("backwards".to_string(), backwards).is_err());

        let nan = vec![(LonLat::new(f64::NAN, 0.0), t0())];
        assert!(Track::from_timed_positions("nan".to_string(), nan).is_err());
    }

    #[test]
    fn elapsed_is_relative_to_first_point() {
        let track = track(vec![(0, 0.0, 0.0), (1500, 1.0, 0.0), (4000, 1.0, 1.0)]);
        let elapsed: Vec<i64> = track.points().iter().map(|pt| pt.elapsed_ms).collect();
        assert_eq!(elapsed, vec![0, 1500, 4000]);
        assert_eq!(track.duration_ms(), 4000);
        assert_eq!(track.start_time(), t0());
    }
}
