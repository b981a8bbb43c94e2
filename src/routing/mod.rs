//! Routing service boundary.
//!
//! Every route entering the engine passes `Route::new` validation here, so a
//! malformed response surfaces as [`RoutingError::InvalidRoute`] and is
//! never installed.

pub mod ors;
pub mod polyline;

pub use ors::{parse_directions, OrsRoutingService};

use crate::route::{Route, RouteError};
use crate::types::GeoPoint;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("No routing API key configured")]
    MissingApiKey,

    #[error("Routing request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by routing service")]
    RateLimited,

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("Unparseable routing response: {0}")]
    Parse(String),

    #[error("Malformed route: {0}")]
    InvalidRoute(#[from] RouteError),
}

/// Produces a walking route between two points.
///
/// Stateless from the engine's view: each call is an independent request.
pub trait RoutingService {
    fn request_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> impl Future<Output = Result<Route, RoutingError>>;
}

/// Offline stand-in that answers with a straight line to the destination
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectRouting;

impl RoutingService for DirectRouting {
    async fn request_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<Route, RoutingError> {
        Ok(Route::direct(origin, destination)?)
    }
}
