use geojson::feature::Id;
use geojson::{Feature, Geometry, Value};

use model::{LonLat, Track};

/// A stable colour per track index
pub fn track_color(idx: usize) -> String {
    let palette = colorous::CATEGORY10;
    format!("#{:x}", palette[idx % palette.len()])
}

/// The trail covered so far, ending at `head`
pub fn history_feature(idx: usize, track: &Track, trail: Vec<LonLat>) -> Feature {
    let coords = trail.into_iter().map(|pt| pt.to_geojson_position()).collect();
    make_feature(idx, track, Value::LineString(coords))
}

pub fn head_feature(idx: usize, track: &Track, head: LonLat) -> Feature {
    make_feature(idx, track, Value::Point(head.to_geojson_position()))
}

fn make_feature(idx: usize, track: &Track, value: Value) -> Feature {
    let mut feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::Number(idx.into())),
        properties: None,
        foreign_members: None,
    };
    feature.set_property("id", idx);
    feature.set_property("name", track.name());
    feature.set_property("color", track_color(idx));
    feature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_stable_and_distinct() {
        assert_eq!(track_color(3), track_color(3));
        assert_ne!(track_color(0), track_color(1));
        assert_eq!(track_color(0), track_color(10));
        assert_eq!(track_color(0).len(), 7);
        assert!(track_color(0).starts_with('#'));
    }
}
