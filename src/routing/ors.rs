use super::polyline;
use super::{RoutingError, RoutingService};
use crate::config::RoutingConfig;
use crate::route::{ManeuverType, Route, Step};
use crate::types::GeoPoint;
use serde::Deserialize;
use std::time::Duration;

/// OpenRouteService directions client.
///
/// # Error Handling
/// - No API key: fails before any request is sent
/// - HTTP 429: `RateLimited`, never retried here; the engine tries again on
///   the next off-route detection
/// - Transport timeout: `Timeout`
/// - Anything unparseable or structurally invalid: `Parse` / `InvalidRoute`
pub struct OrsRoutingService {
    client: reqwest::Client,
    config: RoutingConfig,
}

impl OrsRoutingService {
    pub fn new(config: RoutingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        OrsRoutingService { client, config }
    }

    fn request_body(origin: GeoPoint, destination: GeoPoint) -> serde_json::Value {
        serde_json::json!({
            "coordinates": [
                [origin.longitude, origin.latitude],
                [destination.longitude, destination.latitude],
            ]
        })
    }

    async fn fetch(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route, RoutingError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RoutingError::MissingApiKey)?;

        let url = self.config.directions_url();
        log::info!(
            "Requesting route ({:.5}, {:.5}) -> ({:.5}, {:.5})",
            origin.latitude,
            origin.longitude,
            destination.latitude,
            destination.longitude
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", api_key)
            .json(&Self::request_body(origin, destination))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RoutingError::Timeout
                } else {
                    RoutingError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            log::warn!("Rate limited by routing service");
            return Err(RoutingError::RateLimited);
        } else if !status.is_success() {
            log::error!("Routing service returned HTTP {}", status.as_u16());
            return Err(RoutingError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::Network(format!("Failed to read response: {e}")))?;

        let route = parse_directions(&body)?;
        log::info!(
            "Route has {} steps and {} geometry points",
            route.steps().len(),
            route.geometry().len()
        );
        Ok(route)
    }
}

impl RoutingService for OrsRoutingService {
    async fn request_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<Route, RoutingError> {
        self.fetch(origin, destination).await
    }
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<OrsRoute>,
}

#[derive(Deserialize)]
struct OrsRoute {
    geometry: String,
    #[serde(default)]
    summary: Option<OrsSummary>,
    #[serde(default)]
    segments: Vec<OrsSegment>,
}

#[derive(Deserialize)]
struct OrsSummary {
    #[serde(default)]
    distance: f64,
}

#[derive(Deserialize)]
struct OrsSegment {
    #[serde(default)]
    steps: Vec<OrsStep>,
}

#[derive(Deserialize)]
struct OrsStep {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    #[serde(rename = "type", default = "straight_code")]
    maneuver: u8,
    way_points: [usize; 2],
}

fn straight_code() -> u8 {
    ManeuverType::Straight.code()
}

/// Parse an OpenRouteService JSON directions response into a validated route.
///
/// Uses the first route; steps from every segment are concatenated since
/// their `way_points` index the shared geometry.
pub fn parse_directions(body: &str) -> Result<Route, RoutingError> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Parse(e.to_string()))?;

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| RoutingError::Parse("response contains no routes".to_string()))?;

    let geometry =
        polyline::decode(&route.geometry).map_err(|e| RoutingError::Parse(e.to_string()))?;

    let steps = route
        .segments
        .iter()
        .flat_map(|segment| segment.steps.iter())
        .enumerate()
        .map(|(i, s)| {
            Step::new(
                ManeuverType::from_code(s.maneuver),
                s.distance,
                s.duration,
                (s.way_points[0], s.way_points[1]),
                &geometry,
            )
            .map_err(|e| e.for_step(i))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total = route.summary.map(|s| s.distance).unwrap_or(0.0);
    Ok(Route::new(geometry, steps, total)?)
}
