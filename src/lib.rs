//! geotax: sales tax estimation with a location-based rate pre-fill.
//!
//! The core is a static table of statewide rates ([`rates`]), a pure
//! recompute step ([`estimate`]) and a one-shot resolution flow ([`flow`])
//! that turns a coordinate into a pre-filled rate via reverse geocoding.

pub mod config;
pub mod estimate;
pub mod flow;
pub mod form;
pub mod location;
pub mod rates;
pub mod server;

pub use config::Config;
pub use estimate::{format_usd, parse_lenient, recompute, Estimate};
pub use flow::{FlowOutcome, FlowState, RegionLookupResult, ResolutionFlow};
pub use form::EstimateForm;
pub use rates::{rate_percent_field, RateTable};
