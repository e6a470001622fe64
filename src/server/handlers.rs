use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::estimate;
use crate::flow::{FlowOutcome, ResolutionFlow};
use crate::form::EstimateForm;
use crate::location::{Coordinate, FixedLocator, Locator};
use crate::rates::{rate_percent_field, RateEntry};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/rates ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct RateListResponse {
    pub effective_year: Option<i32>,
    pub effective_from: Option<NaiveDate>,
    pub count: usize,
    pub rates: Vec<RateEntry>,
}

pub async fn rate_list(State(state): State<Arc<AppState>>) -> Json<RateListResponse> {
    let rates = state.table.entries();
    Json(RateListResponse {
        effective_year: state.table.effective_year(),
        effective_from: state.table.effective_from(),
        count: rates.len(),
        rates,
    })
}

// ─── GET /api/rates/{region} ─────────────────────────────────────

pub async fn rate_for_region(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<RateEntry>, ApiError> {
    let rate = state.table.lookup(&region).ok_or_else(|| {
        api_error(StatusCode::NOT_FOUND, format!("No statewide rate for '{}'", region))
    })?;
    Ok(Json(RateEntry {
        rate_percent: rate_percent_field(rate),
        region,
        rate,
    }))
}

// ─── GET /api/estimate ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct EstimateQuery {
    pub price: Option<String>,
    pub rate: Option<String>,
}

#[derive(Serialize)]
pub struct EstimateResponse {
    pub price: Decimal,
    pub rate_percent: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub sales_tax_display: String,
    pub total_display: String,
}

pub async fn estimate(Query(params): Query<EstimateQuery>) -> Json<EstimateResponse> {
    let est = estimate::recompute(
        params.price.as_deref().unwrap_or(""),
        params.rate.as_deref().unwrap_or(""),
    );
    Json(EstimateResponse {
        price: est.price,
        rate_percent: est.rate_percent,
        tax: est.tax,
        total: est.total,
        sales_tax_display: est.tax_display(),
        total_display: est.total_display(),
    })
}

// ─── GET /api/resolve ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub price: Option<String>,
    pub rate: Option<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub outcome: FlowOutcome,
    pub form: EstimateForm,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let start = Instant::now();

    let at = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon).map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("Invalid coordinates: {}", e))
        })?),
        (None, None) => None,
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Provide both 'lat' and 'lon', or neither",
            ))
        }
    };

    let mut form = EstimateForm::new(
        params.price.unwrap_or_default(),
        params.rate.unwrap_or_default(),
    );

    // The geocoder call blocks on network I/O.
    let shared = Arc::clone(&state);
    let (outcome, form) = tokio::task::spawn_blocking(move || {
        let locator = at.map(FixedLocator);
        let flow = ResolutionFlow::new(&shared.table, &*shared.geocoder);
        let outcome = flow.run(locator.as_ref().map(|l| l as &dyn Locator), &mut form);
        (outcome, form)
    })
    .await
    .map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Resolution task failed: {}", e),
        )
    })?;

    tracing::info!(
        state = %outcome.state,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/resolve"
    );

    Ok(Json(ResolveResponse { outcome, form }))
}

#[cfg(test)]
mod tests {
    use super::super::{router_with_state, AppState};
    use crate::location::{Coordinate, GeocodeError, ReverseGeocoder};
    use crate::rates::RateTable;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct StaticGeocoder(Option<&'static str>);

    impl ReverseGeocoder for StaticGeocoder {
        fn region_for(&self, _at: Coordinate) -> Result<Option<String>, GeocodeError> {
            Ok(self.0.map(str::to_string))
        }
    }

    struct FailingGeocoder(u16);

    impl ReverseGeocoder for FailingGeocoder {
        fn region_for(&self, _at: Coordinate) -> Result<Option<String>, GeocodeError> {
            Err(GeocodeError::Status(self.0))
        }
    }

    async fn get_with(
        uri: &str,
        geocoder: Arc<dyn ReverseGeocoder + Send + Sync>,
    ) -> (StatusCode, Value) {
        let app = router_with_state(AppState {
            table: RateTable::statewide(),
            geocoder,
        });
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get(uri: &str, region: Option<&'static str>) -> (StatusCode, Value) {
        get_with(uri, Arc::new(StaticGeocoder(region))).await
    }

    #[tokio::test]
    async fn test_rate_list() {
        let (status, body) = get("/api/rates", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 51);
        assert_eq!(body["effective_year"], 2024);
        assert_eq!(body["effective_from"], "2024-01-01");
        assert_eq!(body["rates"][0]["region"], "Alabama");
    }

    #[tokio::test]
    async fn test_rate_for_region() {
        let (status, body) = get("/api/rates/New%20York", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rate"], "0.04");
        assert_eq!(body["rate_percent"], "4.000");

        let (status, body) = get("/api/rates/new%20york", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn test_estimate_lenient() {
        let (status, body) = get("/api/estimate?price=100&rate=7.25", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_display"], "$107.25");

        let (_, body) = get("/api/estimate?price=abc&rate=5", None).await;
        assert_eq!(body["total_display"], "$0.00");
    }

    #[tokio::test]
    async fn test_resolve_applies_rate() {
        let (status, body) =
            get("/api/resolve?lat=45.5&lon=-122.6&price=100&rate=5", Some("Oregon")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["state"]["state"], "rate_applied");
        assert_eq!(body["form"]["rate_percent"], "0.000");
        assert_eq!(body["form"]["total"], "$100.00");
    }

    #[tokio::test]
    async fn test_resolve_without_coordinates_is_unsupported() {
        let (status, body) = get("/api/resolve?price=10", Some("Oregon")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["state"]["state"], "unsupported");
        assert_eq!(
            body["form"]["status"],
            "Geolocation not supported. Please enter tax rate manually."
        );
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_coordinates() {
        let (status, _) = get("/api/resolve?lat=95&lon=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get("/api/resolve?lat=45", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_resolve_geocoder_failure_keeps_rate() {
        let (status, body) = get_with(
            "/api/resolve?lat=40.7&lon=-74.0&price=50&rate=4",
            Arc::new(FailingGeocoder(503)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["state"]["state"], "resolution_failed");
        assert_eq!(body["outcome"]["state"]["reason"], "HTTP status 503");
        assert_eq!(body["form"]["status"], "Error finding your location.");
        assert_eq!(body["form"]["rate_percent"], "4");
        assert_eq!(body["form"]["total"], "$52.00");
    }
}
