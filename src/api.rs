use anyhow::{Context, Result};
use reqwest::Url;

use crate::classifier::{build_route_reference, RouteReference};
use crate::error::{ClassifierError, RefreshError};
use crate::fetch::{fetch_with_retry, FeedResponse, HttpTransport, RetryPolicy, Transport};
use crate::models::VehicleFeed;

pub const DEFAULT_VEHICLES_URL: &str = "https://ckan2.multimediagdansk.pl/gpsPositions?v=2";
pub const DEFAULT_ROUTES_URL: &str = "https://ckan.multimediagdansk.pl/dataset/c24aa637-3619-4dc2-a171-a23eec8f2172/resource/22313c56-5acf-41c7-a5fd-dc5dc72b3851/download/routes.json";

/// Upstream endpoints, optionally reached through a relay that takes the
/// real URL as a query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUrls {
    pub vehicles: String,
    pub routes: String,
    pub relay: Option<String>,
    pub relay_param: String,
}

impl FeedUrls {
    pub fn new(vehicles: impl Into<String>, routes: impl Into<String>) -> Self {
        Self {
            vehicles: vehicles.into(),
            routes: routes.into(),
            relay: None,
            relay_param: "url".to_string(),
        }
    }

    pub fn with_relay(mut self, relay: impl Into<String>, param: impl Into<String>) -> Self {
        self.relay = Some(relay.into());
        self.relay_param = param.into();
        self
    }

    /// URL that actually gets requested for `upstream`
    pub fn resolve(&self, upstream: &str) -> Result<String> {
        let Some(relay) = &self.relay else {
            return Ok(upstream.to_string());
        };

        let mut url = Url::parse(relay)
            .with_context(|| format!("Invalid relay URL {:?}", relay))?;
        url.query_pairs_mut().append_pair(&self.relay_param, upstream);
        Ok(url.into())
    }
}

impl Default for FeedUrls {
    fn default() -> Self {
        Self::new(DEFAULT_VEHICLES_URL, DEFAULT_ROUTES_URL)
    }
}

/// Client for the vehicle position feed and the route reference dataset
pub struct FeedClient<T = HttpTransport> {
    transport: T,
    vehicles_url: String,
    routes_url: String,
    retry: RetryPolicy,
}

impl<T: Transport> FeedClient<T> {
    pub fn new(transport: T, urls: &FeedUrls, retry: RetryPolicy) -> Result<Self> {
        let vehicles_url = urls.resolve(&urls.vehicles)
            .context("Failed to build vehicle feed URL")?;
        let routes_url = urls.resolve(&urls.routes)
            .context("Failed to build route reference URL")?;

        Ok(Self {
            transport,
            vehicles_url,
            routes_url,
            retry,
        })
    }

    pub fn vehicles_url(&self) -> &str {
        &self.vehicles_url
    }

    pub fn routes_url(&self) -> &str {
        &self.routes_url
    }

    /// Fetch the routes dataset and classify its lines. Failures here are fatal for the session.
    pub async fn fetch_route_reference(&self) -> Result<RouteReference, ClassifierError> {
        tracing::debug!(url = %self.routes_url, "Fetching route reference");

        let response = fetch_with_retry(&self.transport, &self.routes_url, &self.retry)
            .await
            .map_err(ClassifierError::Fetch)?;
        if !response.is_success() {
            return Err(ClassifierError::Status(response.status));
        }

        let payload: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(ClassifierError::Decode)?;
        let reference = build_route_reference(&payload)?;
        if reference.is_empty() {
            return Err(ClassifierError::Empty);
        }

        tracing::info!(lines = reference.len(), "Route reference ready");
        Ok(reference)
    }

    /// Fetch the current vehicle positions
    pub async fn fetch_vehicles(&self) -> Result<VehicleFeed, RefreshError> {
        tracing::debug!(url = %self.vehicles_url, "Fetching vehicle positions");

        let response = fetch_with_retry(&self.transport, &self.vehicles_url, &self.retry)
            .await
            .map_err(RefreshError::Fetch)?;

        let feed = parse_vehicle_response(&response)?;
        tracing::debug!(count = feed.vehicles.len(), "Parsed vehicle feed");
        Ok(feed)
    }
}

/// Interpret a vehicle feed response; non-2xx statuses count as failures
pub fn parse_vehicle_response(response: &FeedResponse) -> Result<VehicleFeed, RefreshError> {
    if !response.is_success() {
        return Err(RefreshError::Status(response.status));
    }
    parse_vehicle_feed(&response.body)
}

pub fn parse_vehicle_feed(data: &[u8]) -> Result<VehicleFeed, RefreshError> {
    serde_json::from_slice(data).map_err(RefreshError::Decode)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::fetch::testing::ScriptedTransport;
    use crate::models::VehicleKind;

    const VEHICLES: &str = "http://feed.test/vehicles";
    const ROUTES: &str = "http://feed.test/routes";

    fn client(transport: ScriptedTransport) -> FeedClient<ScriptedTransport> {
        FeedClient::new(
            transport,
            &FeedUrls::new(VEHICLES, ROUTES),
            RetryPolicy::new(1, Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_without_relay_is_identity() {
        let urls = FeedUrls::new(VEHICLES, ROUTES);
        assert_eq!(urls.resolve(VEHICLES).unwrap(), VEHICLES);
    }

    #[test]
    fn test_resolve_through_relay_encodes_upstream() {
        let urls = FeedUrls::new(VEHICLES, ROUTES).with_relay("https://relay.test/raw?mode=plain", "url");
        assert_eq!(
            urls.resolve("https://up.test/gps?v=2").unwrap(),
            "https://relay.test/raw?mode=plain&url=https%3A%2F%2Fup.test%2Fgps%3Fv%3D2"
        );
    }

    #[test]
    fn test_invalid_relay_is_rejected() {
        let urls = FeedUrls::new(VEHICLES, ROUTES).with_relay("not a url", "url");
        assert!(FeedClient::new(ScriptedTransport::new(), &urls, RetryPolicy::default()).is_err());
    }

    #[tokio::test]
    async fn test_fetch_route_reference() {
        let transport = ScriptedTransport::new();
        transport.respond_json(ROUTES, json!({
            "2024-05-01": { "routes": [{ "routeShortName": "6" }, { "routeShortName": "N3" }] }
        }));

        let reference = client(transport).fetch_route_reference().await.unwrap();
        assert_eq!(reference.kind_of("6"), VehicleKind::Tram);
        assert_eq!(reference.kind_of("N3"), VehicleKind::Bus);
    }

    #[tokio::test]
    async fn test_route_reference_errors() {
        let transport = ScriptedTransport::new();
        transport.respond(ROUTES, 403, "denied");
        assert!(matches!(
            client(transport).fetch_route_reference().await,
            Err(ClassifierError::Status(403))
        ));

        let transport = ScriptedTransport::new();
        transport.respond(ROUTES, 200, "<html>");
        assert!(matches!(
            client(transport).fetch_route_reference().await,
            Err(ClassifierError::Decode(_))
        ));

        let transport = ScriptedTransport::new();
        transport.respond_json(ROUTES, json!({ "2024-05-01": { "routes": [] } }));
        assert!(matches!(
            client(transport).fetch_route_reference().await,
            Err(ClassifierError::Empty)
        ));

        let transport = ScriptedTransport::new();
        transport.fail(ROUTES);
        assert!(matches!(
            client(transport).fetch_route_reference().await,
            Err(ClassifierError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_vehicles() {
        let transport = ScriptedTransport::new();
        transport.respond_json(VEHICLES, json!({
            "lastUpdate": "2024-05-01T10:00:05Z",
            "vehicles": [
                { "vehicleId": 1, "routeShortName": "2", "lat": 54.3, "lon": 18.6, "delay": 30 },
                { "vehicleId": 2, "routeShortName": "115", "lat": 54.4, "lon": 18.5 }
            ]
        }));

        let feed = client(transport).fetch_vehicles().await.unwrap();
        assert_eq!(feed.last_update.as_deref(), Some("2024-05-01T10:00:05Z"));
        assert_eq!(feed.vehicles.len(), 2);
        assert_eq!(feed.vehicles[1].delay_seconds, 0);
    }

    #[test]
    fn test_parse_vehicle_response_rejects_client_errors() {
        let response = FeedResponse { status: 429, body: "slow down".into() };
        assert!(matches!(parse_vehicle_response(&response), Err(RefreshError::Status(429))));
    }
}
