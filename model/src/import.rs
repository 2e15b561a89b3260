use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::Result;
use zip::ZipArchive;

use crate::{gpx, position_log, Track};

/// Loads every file, in order. A file that fails to parse is logged and skipped; this only fails
/// if nothing at all loaded.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Track>> {
    let mut results = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|x| x.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let result = fs_err::read(path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| parse_file(&name, &bytes));
        results.push((name, result));
    }
    settle(results)
}

/// Loads every `.gpx` and `.csv` file inside a zip archive, with the same error handling as
/// `load_files`.
pub fn load_zip_bytes(bytes: Vec<u8>) -> Result<Vec<Track>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut results = Vec::new();
    for idx in 0..archive.len() {
        let mut file = archive.by_index(idx)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        if supported_format(&name).is_none() {
            debug!("Skipping {name} in zip");
            continue;
        }
        let mut contents = Vec::new();
        let result = file
            .read_to_end(&mut contents)
            .map_err(|err| anyhow!("{name}: {err}"))
            .and_then(|_| parse_file(&name, &contents));
        results.push((name, result));
    }
    settle(results)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Format {
    Gpx,
    Csv,
}

fn supported_format(name: &str) -> Option<Format> {
    let lower = name.to_lowercase();
    if lower.ends_with(".gpx") {
        Some(Format::Gpx)
    } else if lower.ends_with(".csv") {
        Some(Format::Csv)
    } else {
        None
    }
}

fn parse_file(name: &str, bytes: &[u8]) -> Result<Vec<Track>> {
    match supported_format(name) {
        Some(Format::Gpx) => {
            let text = std::str::from_utf8(bytes)?;
            Ok(vec![gpx::parse(text, name)?])
        }
        Some(Format::Csv) => position_log::load(bytes),
        None => bail!("Unknown file type; expected .gpx or .csv"),
    }
}

fn settle(results: Vec<(String, Result<Vec<Track>>)>) -> Result<Vec<Track>> {
    let mut tracks = Vec::new();
    for (name, result) in results {
        match result {
            Ok(list) => {
                info!("Successfully parsed {name}");
                tracks.extend(list);
            }
            Err(err) => {
                error!("Error parsing {name}: {err:#}");
            }
        }
    }
    if tracks.is_empty() {
        bail!("No valid track files could be loaded");
    }
    Ok(tracks)
}
