use geojson::FeatureCollection;

/// The two collections of geometry drawn every frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// One LineString per track, covering everywhere it's been so far
    History,
    /// One Point per track, at its current position
    Head,
}

impl Layer {
    pub const ALL: [Layer; 2] = [Layer::History, Layer::Head];

    pub fn source_id(self) -> &'static str {
        match self {
            Layer::History => "runners-history",
            Layer::Head => "runners-head",
        }
    }
}

/// Whatever draws the replay. Each call replaces everything previously set for that layer.
/// Failing to draw is the sink's own problem; the replay carries on regardless.
pub trait RenderSink {
    fn set_data(&mut self, layer: Layer, data: FeatureCollection);
}
