use std::path::{Path, PathBuf};

use anyhow::Result;
use geojson::{FeatureCollection, GeoJson};

use replay::{Layer, RenderSink};

/// Keeps one GeoJSON file per layer up-to-date, for a map to poll. Files are replaced atomically,
/// so a reader never sees half a frame.
pub struct GeoJsonDirSink {
    dir: PathBuf,
    // Only complain once per streak of failures
    failing: bool,
}

impl GeoJsonDirSink {
    pub fn new(dir: &Path) -> Result<Self> {
        fs_err::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            failing: false,
        })
    }

    pub fn path(&self, layer: Layer) -> PathBuf {
        self.dir.join(format!("{}.geojson", layer.source_id()))
    }

    fn write(&self, layer: Layer, data: FeatureCollection) -> Result<()> {
        let gj = GeoJson::FeatureCollection(data);
        let path = self.path(layer);
        let tmp = path.with_extension("geojson.tmp");
        fs_err::write(&tmp, serde_json::to_string(&gj)?)?;
        fs_err::rename(&tmp, &path)?;
        Ok(())
    }
}

impl RenderSink for GeoJsonDirSink {
    fn set_data(&mut self, layer: Layer, data: FeatureCollection) {
        match self.write(layer, data) {
            Ok(()) => {
                if self.failing {
                    info!("Writing {} works again", layer.source_id());
                    self.failing = false;
                }
            }
            Err(err) => {
                if !self.failing {
                    error!("Couldn't write {}: {err:#}", layer.source_id());
                    self.failing = true;
                }
            }
        }
    }
}
