//! Resolution pyramid configuration and realization.
//!
//! A level set divides a sector into a fixed number of levels. Level 0 tiles
//! span `first_level_delta` degrees; each subsequent level halves the tile
//! delta, doubling the angular resolution.

use serde::{Deserialize, Serialize};

use crate::Sector;

/// Configuration for a multi-resolution tile pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSetConfig {
    /// Geographic region the pyramid covers.
    pub sector: Sector,

    /// Angular extent of a level 0 tile, in degrees.
    pub first_level_delta: f64,

    /// Tile width in pixels.
    pub tile_width: u32,

    /// Tile height in pixels.
    pub tile_height: u32,

    /// Number of levels in the pyramid.
    pub num_levels: usize,
}

impl Default for LevelSetConfig {
    fn default() -> Self {
        Self {
            sector: Sector::full_sphere(),
            first_level_delta: 90.0,
            tile_width: 256,
            tile_height: 256,
            num_levels: 1,
        }
    }
}

impl LevelSetConfig {
    /// Minimal number of levels whose finest level meets or exceeds the given
    /// resolution ceiling, expressed in radians per pixel. Never less than 1.
    ///
    /// `radians_per_pixel` must be positive.
    pub fn num_levels_for_min_resolution(&self, radians_per_pixel: f64) -> usize {
        let degrees_per_pixel = radians_per_pixel.to_degrees();
        let first_level_degrees_per_pixel = self.first_level_delta / f64::from(self.tile_height);
        let level = (first_level_degrees_per_pixel / degrees_per_pixel)
            .log2()
            .ceil()
            .max(0.0);
        level as usize + 1
    }

    /// Number of levels whose finest level most closely achieves the given
    /// target resolution, expressed in radians per pixel. Never less than 1.
    ///
    /// Unlike [`num_levels_for_min_resolution`](Self::num_levels_for_min_resolution),
    /// which guarantees the ceiling is met, this rounds to the nearest level
    /// and may fall short of the target by up to half a level.
    ///
    /// `radians_per_pixel` must be positive.
    pub fn num_levels_for_resolution(&self, radians_per_pixel: f64) -> usize {
        let degrees_per_pixel = radians_per_pixel.to_degrees();
        let first_level_degrees_per_pixel = self.first_level_delta / f64::from(self.tile_height);
        let level = (first_level_degrees_per_pixel / degrees_per_pixel)
            .log2()
            .round()
            .max(0.0);
        level as usize + 1
    }
}

/// One level of a realized pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Level ordinal, 0 is the coarsest.
    pub number: usize,

    /// Angular extent of one tile at this level, in degrees.
    pub tile_delta: f64,

    /// Tile width in pixels.
    pub tile_width: u32,

    /// Tile height in pixels.
    pub tile_height: u32,
}

impl Level {
    /// Angular size of one pixel at this level, in degrees.
    pub fn texel_size(&self) -> f64 {
        self.tile_delta / f64::from(self.tile_height)
    }
}

/// A realized resolution pyramid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    /// Geographic region the pyramid covers.
    pub sector: Sector,

    /// Angular extent of a level 0 tile, in degrees.
    pub first_level_delta: f64,

    /// Tile width in pixels.
    pub tile_width: u32,

    /// Tile height in pixels.
    pub tile_height: u32,

    levels: Vec<Level>,
}

impl LevelSet {
    /// Realize a pyramid from its configuration.
    pub fn from_config(config: &LevelSetConfig) -> Result<Self, LevelSetError> {
        if config.num_levels == 0 {
            return Err(LevelSetError::NoLevels);
        }
        if !(config.first_level_delta > 0.0) {
            return Err(LevelSetError::InvalidDelta(config.first_level_delta));
        }
        if config.tile_width == 0 || config.tile_height == 0 {
            return Err(LevelSetError::InvalidTileSize(
                config.tile_width,
                config.tile_height,
            ));
        }

        let levels = (0..config.num_levels)
            .map(|number| Level {
                number,
                tile_delta: config.first_level_delta / 2f64.powi(number as i32),
                tile_width: config.tile_width,
                tile_height: config.tile_height,
            })
            .collect();

        Ok(Self {
            sector: config.sector,
            first_level_delta: config.first_level_delta,
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            levels,
        })
    }

    /// Number of levels in the pyramid.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Get a level by ordinal.
    pub fn level(&self, number: usize) -> Option<&Level> {
        self.levels.get(number)
    }

    /// The coarsest level.
    pub fn first_level(&self) -> &Level {
        &self.levels[0]
    }

    /// The finest level.
    pub fn last_level(&self) -> &Level {
        &self.levels[self.levels.len() - 1]
    }

    /// All levels, coarsest first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LevelSetError {
    #[error("Level set requires at least one level")]
    NoLevels,

    #[error("Invalid first level delta: {0}. Expected a positive number of degrees")]
    InvalidDelta(f64),

    #[error("Invalid tile dimensions: {0}x{1}")]
    InvalidTileSize(u32, u32),
}
