//! The resolution flow: position → region → pre-filled rate.
//!
//! Runs at most once per flow value: `run` consumes the flow. Every
//! terminal state is display-only and nothing is retried.
//!
//! ```text
//! Idle ─► Locating ─► Resolving ─► RateApplied | RateUnavailable | ResolutionFailed
//!  │          └─────► LocationDenied | LocationUnavailable | LocationTimeout
//!  └─► Unsupported
//! ```

use crate::estimate::Estimate;
use crate::form::EstimateForm;
use crate::location::{Coordinate, Locator, PositionError, ReverseGeocoder};
use crate::rates::{rate_percent_field, RateTable};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

pub const MSG_UNSUPPORTED: &str = "Geolocation not supported. Please enter tax rate manually.";
pub const MSG_DENIED: &str = "Location access denied. Please enter tax rate manually.";
pub const MSG_UNAVAILABLE: &str = "Location information is unavailable.";
pub const MSG_TIMEOUT: &str = "The request to get user location timed out.";
pub const MSG_UNDETERMINED: &str = "Could not determine tax rate for your location.";
pub const MSG_FAILED: &str = "Error finding your location.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    Idle,
    Locating,
    Resolving { at: Coordinate },
    RateApplied { region: String, rate: Decimal },
    RateUnavailable { region: Option<String> },
    LocationDenied,
    LocationUnavailable,
    LocationTimeout,
    ResolutionFailed { reason: String },
    Unsupported,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Locating | Self::Resolving { .. })
    }

    /// Status text shown for a terminal state.
    pub fn message(&self) -> Option<String> {
        let msg = match self {
            Self::Idle | Self::Locating | Self::Resolving { .. } => return None,
            Self::RateApplied { region, .. } => {
                return Some(format!("Using tax rate for: {}. You can change it below.", region))
            }
            Self::RateUnavailable { .. } => MSG_UNDETERMINED,
            Self::LocationDenied => MSG_DENIED,
            Self::LocationUnavailable => MSG_UNAVAILABLE,
            Self::LocationTimeout => MSG_TIMEOUT,
            Self::ResolutionFailed { .. } => MSG_FAILED,
            Self::Unsupported => MSG_UNSUPPORTED,
        };
        Some(msg.to_string())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Locating => "locating",
            Self::Resolving { .. } => "resolving",
            Self::RateApplied { .. } => "rate_applied",
            Self::RateUnavailable { .. } => "rate_unavailable",
            Self::LocationDenied => "location_denied",
            Self::LocationUnavailable => "location_unavailable",
            Self::LocationTimeout => "location_timeout",
            Self::ResolutionFailed { .. } => "resolution_failed",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<PositionError> for FlowState {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::PermissionDenied => Self::LocationDenied,
            PositionError::PositionUnavailable => Self::LocationUnavailable,
            PositionError::Timeout => Self::LocationTimeout,
        }
    }
}

/// Outcome of the region lookup stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionLookupResult {
    Resolved { region: String, rate: Decimal },
    Unresolved,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowOutcome {
    pub state: FlowState,
    /// Every state visited, `Idle` first, terminal last.
    pub history: Vec<FlowState>,
    /// Set when the flow reached a lookup outcome and recomputed the form.
    pub estimate: Option<Estimate>,
}

impl FlowOutcome {
    /// The lookup result, if the flow got as far as resolving.
    pub fn lookup(&self) -> Option<RegionLookupResult> {
        match &self.state {
            FlowState::RateApplied { region, rate } => Some(RegionLookupResult::Resolved {
                region: region.clone(),
                rate: *rate,
            }),
            FlowState::RateUnavailable { .. } => Some(RegionLookupResult::Unresolved),
            FlowState::ResolutionFailed { reason } => Some(RegionLookupResult::Failed {
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

pub struct ResolutionFlow<'a> {
    table: &'a RateTable,
    geocoder: &'a dyn ReverseGeocoder,
    history: Vec<FlowState>,
}

impl<'a> ResolutionFlow<'a> {
    pub fn new(table: &'a RateTable, geocoder: &'a dyn ReverseGeocoder) -> Self {
        Self {
            table,
            geocoder,
            history: vec![FlowState::Idle],
        }
    }

    fn enter(&mut self, state: FlowState) {
        tracing::debug!(from = %self.current(), to = %state, "flow transition");
        self.history.push(state);
    }

    fn current(&self) -> &FlowState {
        self.history.last().unwrap_or(&FlowState::Idle)
    }

    /// Run the flow against `form`. `locator` is `None` when no position
    /// capability exists.
    pub fn run(mut self, locator: Option<&dyn Locator>, form: &mut EstimateForm) -> FlowOutcome {
        let Some(locator) = locator else {
            self.enter(FlowState::Unsupported);
            return self.finish(form, false);
        };

        self.enter(FlowState::Locating);
        let at = match locator.current_position() {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(error = %e, "could not get position");
                self.enter(e.into());
                return self.finish(form, false);
            }
        };

        self.enter(FlowState::Resolving { at });
        let terminal = match self.geocoder.region_for(at) {
            Ok(Some(region)) => match self.table.lookup(&region) {
                Some(rate) => {
                    form.rate_percent = rate_percent_field(rate);
                    FlowState::RateApplied { region, rate }
                }
                None => FlowState::RateUnavailable { region: Some(region) },
            },
            Ok(None) => FlowState::RateUnavailable { region: None },
            Err(e) => {
                tracing::error!(error = %e, %at, "error getting state");
                FlowState::ResolutionFailed { reason: e.to_string() }
            }
        };
        self.enter(terminal);
        self.finish(form, true)
    }

    fn finish(self, form: &mut EstimateForm, recompute: bool) -> FlowOutcome {
        let state = self.current().clone();
        if let Some(msg) = state.message() {
            form.status = msg;
        }
        let estimate = recompute.then(|| form.recompute());
        tracing::info!(state = %state, status = %form.status, "resolution finished");
        FlowOutcome {
            state,
            history: self.history,
            estimate,
        }
    }
}
