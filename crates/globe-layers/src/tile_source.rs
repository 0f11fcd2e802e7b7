//! Resolved tile sources.

use std::fmt;

use globe_common::{LevelSet, Sector};

/// Builds the request URL for a single tile.
pub trait TileUrlFactory: Send + Sync {
    /// URL retrieving the tile covering `sector` at `width` x `height`
    /// pixels.
    fn url_for_tile(&self, sector: &Sector, width: u32, height: u32) -> String;
}

/// A tiled image source: a URL factory plus the resolution pyramid it
/// serves.
///
/// Produced by the resolution pipeline and attached to an
/// [`ImageLayer`](crate::ImageLayer) once negotiation succeeds.
pub struct TiledImageSource {
    url_factory: Box<dyn TileUrlFactory>,
    level_set: LevelSet,
}

impl TiledImageSource {
    pub fn new(url_factory: impl TileUrlFactory + 'static, level_set: LevelSet) -> Self {
        Self {
            url_factory: Box::new(url_factory),
            level_set,
        }
    }

    /// The resolution pyramid this source serves.
    pub fn level_set(&self) -> &LevelSet {
        &self.level_set
    }

    /// URL for one tile of `sector` at the given pixel dimensions.
    pub fn url_for_tile(&self, sector: &Sector, width: u32, height: u32) -> String {
        self.url_factory.url_for_tile(sector, width, height)
    }
}

impl fmt::Debug for TiledImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiledImageSource")
            .field("sector", &self.level_set.sector)
            .field("num_levels", &self.level_set.num_levels())
            .finish()
    }
}
