//! Location providers: Nominatim reverse geocoding, IP geolocation and
//! fixed coordinates.

use super::types::{Coordinate, GeocodeError, Locator, PositionError, ReverseGeocoder};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_IPAPI_URL: &str = "https://ipapi.co/json";

fn build_agent(user_agent: &str) -> ureq::Agent {
    ureq::AgentBuilder::new().user_agent(user_agent).build()
}

// ─── Nominatim provider ─────────────────────────────────────────

/// Reverse geocoder backed by an OpenStreetMap Nominatim instance.
pub struct NominatimClient {
    agent: ureq::Agent,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            agent: build_agent(user_agent),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn reverse_url(&self, at: Coordinate) -> String {
        format!("{}/reverse?format=json&lat={}&lon={}", self.base_url, at.lat, at.lon)
    }
}

impl ReverseGeocoder for NominatimClient {
    fn region_for(&self, at: Coordinate) -> Result<Option<String>, GeocodeError> {
        let url = self.reverse_url(at);
        tracing::debug!(%url, "reverse geocoding");

        let response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => GeocodeError::Status(code),
            ureq::Error::Transport(t) => GeocodeError::Transport(t.to_string()),
        })?;

        let body = response
            .into_string()
            .map_err(|e| GeocodeError::Body(e.to_string()))?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Body(e.to_string()))?;

        Ok(region_from_payload(&payload))
    }
}

/// `address.state` as a string, if the payload has one. Any other shape
/// (Nominatim's `{"error": ...}`, ocean points, numbers) means no region.
pub fn region_from_payload(payload: &Value) -> Option<String> {
    payload
        .pointer("/address/state")
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ─── IP-based geolocation ───────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

/// Auto-detect the position via IP geolocation.
pub struct IpLocator {
    agent: ureq::Agent,
    url: String,
}

impl IpLocator {
    pub fn new(url: &str, user_agent: &str) -> Self {
        Self::with_agent(url, build_agent(user_agent))
    }

    /// Use a preconfigured agent (proxies, timeouts).
    pub fn with_agent(url: &str, agent: ureq::Agent) -> Self {
        Self {
            agent,
            url: url.to_string(),
        }
    }
}

impl Locator for IpLocator {
    fn current_position(&self) -> Result<Coordinate, PositionError> {
        let response = self.agent.get(&self.url).call().map_err(|e| match e {
            ureq::Error::Status(401 | 403 | 429, _) => PositionError::PermissionDenied,
            ureq::Error::Status(code, _) => {
                tracing::debug!(code, "IP geolocation rejected");
                PositionError::PositionUnavailable
            }
            ureq::Error::Transport(t) if is_timeout(&t) => PositionError::Timeout,
            ureq::Error::Transport(t) => {
                tracing::debug!(error = %t, "IP geolocation transport failure");
                PositionError::PositionUnavailable
            }
        })?;

        let r: IpApiResult = response
            .into_json()
            .map_err(|_| PositionError::PositionUnavailable)?;

        let (Some(lat), Some(lon)) = (r.latitude, r.longitude) else {
            return Err(PositionError::PositionUnavailable);
        };
        tracing::debug!(
            city = r.city.as_deref().unwrap_or("?"),
            region = r.region.as_deref().unwrap_or("?"),
            "IP geolocation"
        );
        Coordinate::new(lat, lon).map_err(|_| PositionError::PositionUnavailable)
    }
}

fn is_timeout(t: &ureq::Transport) -> bool {
    use std::error::Error;
    use std::io::ErrorKind;

    let io_timeout = t
        .source()
        .and_then(|s| s.downcast_ref::<std::io::Error>())
        .is_some_and(|io| matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock));
    io_timeout || (t.kind() == ureq::ErrorKind::Io && t.to_string().contains("timed out"))
}

// ─── Manual coordinates ─────────────────────────────────────────

/// A position supplied by the user.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator(pub Coordinate);

impl Locator for FixedLocator {
    fn current_position(&self) -> Result<Coordinate, PositionError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const UA: &str = "geotax-test/0.1";

    fn portland() -> Coordinate {
        Coordinate::new(45.5152, -122.6784).unwrap()
    }

    /// Mount a `/reverse` mock that only answers well-formed requests.
    async fn nominatim_mock(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/reverse"))
            .and(query_param("format", "json"))
            .and(query_param("lat", "45.5152"))
            .and(query_param("lon", "-122.6784"))
            .and(header("user-agent", UA))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    async fn reverse(server: &MockServer) -> Result<Option<String>, GeocodeError> {
        let client = NominatimClient::new(&server.uri(), UA);
        tokio::task::spawn_blocking(move || client.region_for(portland()))
            .await
            .unwrap()
    }

    async fn ip_mock(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/json"))
            .and(header("user-agent", UA))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn locate(locator: IpLocator) -> Result<Coordinate, PositionError> {
        tokio::task::spawn_blocking(move || locator.current_position())
            .await
            .unwrap()
    }

    fn ip_locator(server: &MockServer) -> IpLocator {
        IpLocator::new(&format!("{}/json", server.uri()), UA)
    }

    #[test]
    fn test_reverse_url() {
        let client = NominatimClient::new("https://nominatim.example.org/", UA);
        assert_eq!(
            client.reverse_url(portland()),
            "https://nominatim.example.org/reverse?format=json&lat=45.5152&lon=-122.6784"
        );
    }

    #[test]
    fn test_region_from_payload() {
        let ok = json!({"address": {"state": "Oregon", "country": "United States"}});
        assert_eq!(region_from_payload(&ok), Some("Oregon".to_string()));

        assert_eq!(region_from_payload(&json!({"error": "Unable to geocode"})), None);
        assert_eq!(region_from_payload(&json!({"address": {"city": "Paris"}})), None);
        assert_eq!(region_from_payload(&json!({"address": {"state": 7}})), None);
        assert_eq!(region_from_payload(&json!([1, 2])), None);
    }

    #[tokio::test]
    async fn test_nominatim_resolves_state() {
        let server = MockServer::start().await;
        let body = json!({"address": {"state": "Oregon", "country_code": "us"}});
        nominatim_mock(&server, ResponseTemplate::new(200).set_body_json(&body)).await;

        assert_eq!(reverse(&server).await.unwrap(), Some("Oregon".to_string()));
    }

    #[tokio::test]
    async fn test_nominatim_missing_address_is_none() {
        let server = MockServer::start().await;
        let body = json!({"error": "Unable to geocode"});
        nominatim_mock(&server, ResponseTemplate::new(200).set_body_json(&body)).await;

        assert_eq!(reverse(&server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nominatim_non_success_status() {
        let server = MockServer::start().await;
        nominatim_mock(&server, ResponseTemplate::new(503)).await;

        let err = reverse(&server).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Status(503)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_nominatim_bad_body() {
        let server = MockServer::start().await;
        nominatim_mock(
            &server,
            ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
        )
        .await;

        let err = reverse(&server).await.unwrap_err();
        assert!(matches!(err, GeocodeError::Body(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_ip_locator_parses_coordinates() {
        let server = MockServer::start().await;
        let body = json!({
            "city": "Austin",
            "region": "Texas",
            "latitude": 30.2672,
            "longitude": -97.7431,
        });
        ip_mock(&server, ResponseTemplate::new(200).set_body_json(&body)).await;

        let c = locate(ip_locator(&server)).await.unwrap();
        assert_relative_eq!(c.lat, 30.2672);
        assert_relative_eq!(c.lon, -97.7431);
    }

    #[tokio::test]
    async fn test_ip_locator_refusals_are_denied() {
        for code in [401u16, 403, 429] {
            let server = MockServer::start().await;
            ip_mock(&server, ResponseTemplate::new(code)).await;

            let result = locate(ip_locator(&server)).await;
            assert_eq!(result, Err(PositionError::PermissionDenied), "status {code}");
        }
    }

    #[tokio::test]
    async fn test_ip_locator_server_error_is_unavailable() {
        let server = MockServer::start().await;
        ip_mock(&server, ResponseTemplate::new(500)).await;

        let result = locate(ip_locator(&server)).await;
        assert_eq!(result, Err(PositionError::PositionUnavailable));
    }

    #[tokio::test]
    async fn test_ip_locator_missing_fields() {
        let server = MockServer::start().await;
        let body = json!({"error": true, "reason": "Reserved IP Address"});
        ip_mock(&server, ResponseTemplate::new(200).set_body_json(&body)).await;

        let result = locate(ip_locator(&server)).await;
        assert_eq!(result, Err(PositionError::PositionUnavailable));
    }

    #[tokio::test]
    async fn test_ip_locator_slow_response_times_out() {
        let server = MockServer::start().await;
        let body = json!({"latitude": 30.0, "longitude": -97.0});
        ip_mock(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(&body)
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let agent = ureq::AgentBuilder::new()
            .user_agent(UA)
            .timeout(Duration::from_millis(200))
            .build();
        let locator = IpLocator::with_agent(&format!("{}/json", server.uri()), agent);

        assert_eq!(locate(locator).await, Err(PositionError::Timeout));
    }

    #[test]
    fn test_fixed_locator() {
        let locator = FixedLocator(portland());
        assert_eq!(locator.current_position(), Ok(portland()));
    }
}
