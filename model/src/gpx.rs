use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::{LonLat, Track};

/// Parses every `trkpt` in a GPX document, in document order, across all tracks and segments.
/// The track is named after the first `<trk><name>`, falling back to `default_name`.
pub fn parse(gpx: &str, default_name: &str) -> Result<Track> {
    let mut reader = Reader::from_str(gpx);
    reader.config_mut().trim_text(true);

    let mut raw: Vec<(LonLat, DateTime<Utc>)> = Vec::new();
    let mut trk_name: Option<String> = None;

    // Where are we?
    let mut in_trk = false;
    let mut in_trk_name = false;
    // Only the first track's name counts, even if it's blank
    let mut saw_trk_name = false;
    let mut in_time = false;
    // The current trkpt's position and the text of its time element
    let mut current: Option<(LonLat, Option<String>)> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => bail!(
                "Invalid XML format at position {}: {err}",
                reader.buffer_position()
            ),
        };
        match event {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"trk" => {
                    in_trk = true;
                }
                b"name" if in_trk && current.is_none() && !saw_trk_name => {
                    in_trk_name = true;
                    saw_trk_name = true;
                }
                b"trkpt" => {
                    current = Some((parse_pos(&e)?, None));
                }
                b"time" if current.is_some() => {
                    in_time = true;
                }
                _ => {}
            },
            Event::Empty(e)
                if e.local_name().as_ref() == b"name" && in_trk && current.is_none() =>
            {
                saw_trk_name = true;
            }
            // <trkpt lat=".." lon=".."/> can't have a time
            Event::Empty(e) if e.local_name().as_ref() == b"trkpt" => {
                parse_pos(&e)?;
                bail!("Missing time element in trkpt {}", raw.len());
            }
            Event::Text(e) => {
                if in_time {
                    if let Some((_, ref mut time)) = current {
                        time.get_or_insert_with(String::new).push_str(&e.unescape()?);
                    }
                } else if in_trk_name {
                    trk_name
                        .get_or_insert_with(String::new)
                        .push_str(&e.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"trk" => {
                    in_trk = false;
                }
                b"name" => {
                    in_trk_name = false;
                }
                b"time" => {
                    in_time = false;
                }
                b"trkpt" => {
                    let (pos, time) = match current.take() {
                        Some(pair) => pair,
                        None => bail!("Unmatched </trkpt>"),
                    };
                    let time = match time {
                        Some(time) => parse_time(&time)?,
                        None => bail!("Missing time element in trkpt {}", raw.len()),
                    };
                    raw.push((pos, time));
                }
                _ => {}
            },
            _ => {}
        }
    }

    if raw.is_empty() {
        bail!("No track points found in GPX file");
    }
    let name = trk_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| default_name.to_string());
    Track::from_timed_positions(name, raw)
}

fn parse_pos(e: &BytesStart) -> Result<LonLat> {
    let lat = parse_coordinate(e, "lat")?;
    let lon = parse_coordinate(e, "lon")?;
    Ok(LonLat::new(lon, lat))
}

fn parse_coordinate(e: &BytesStart, key: &str) -> Result<f64> {
    let value = match e.try_get_attribute(key)? {
        Some(attr) => attr.unescape_value()?.into_owned(),
        None => bail!("trkpt is missing the {key} attribute"),
    };
    match value.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => bail!("Invalid {key} in trkpt: {value}"),
    }
}

/// GPX times are supposed to be RFC 3339, but some devices drop the offset. Those are treated as
/// UTC.
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(time.and_utc());
        }
    }
    bail!("Invalid time: {raw}")
}
