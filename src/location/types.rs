//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.lat >= 0.0 { 'N' } else { 'S' };
        let ew = if self.lon >= 0.0 { 'E' } else { 'W' };
        write!(f, "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", self.lat.abs(), ns, self.lon.abs(), ew)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} out of range (-90..90)")]
    Latitude(f64),
    #[error("longitude {0} out of range (-180..180)")]
    Longitude(f64),
}

/// Failure codes of a position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out")]
    Timeout,
}

/// Reverse-geocoding failures. A response without a region is not an
/// error; see [`ReverseGeocoder::region_for`].
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Body(String),
}

/// Source of the user's current position.
pub trait Locator {
    fn current_position(&self) -> Result<Coordinate, PositionError>;
}

/// Coordinate → first-level administrative region name.
pub trait ReverseGeocoder {
    /// `Ok(None)` when the service answered but named no region.
    fn region_for(&self, at: Coordinate) -> Result<Option<String>, GeocodeError>;
}
