use crate::location::ReverseGeocoder;
use crate::rates::RateTable;
use std::sync::Arc;

/// Shared, read-only server state. The geocoder is stateless; each
/// resolve request runs its own one-shot flow.
pub struct AppState {
    pub table: RateTable,
    pub geocoder: Arc<dyn ReverseGeocoder + Send + Sync>,
}
