//! Location subsystem for geotax.
//!
//! Provides coordinates, platform-style position sources (manual and
//! IP-based) and Nominatim reverse geocoding.

pub mod providers;
pub mod types;

pub use providers::{FixedLocator, IpLocator, NominatimClient};
pub use types::{Coordinate, CoordinateError, GeocodeError, Locator, PositionError, ReverseGeocoder};
