//! Address geocoding with a persistent cache, and distance ranking.

pub mod cache;
pub mod distance;
pub mod geocoder;
