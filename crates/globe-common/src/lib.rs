//! Common geographic types shared across the globetiles crates.

pub mod levels;
pub mod sector;
pub mod wgs84;

pub use levels::{Level, LevelSet, LevelSetConfig, LevelSetError};
pub use sector::Sector;
