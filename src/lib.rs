//! Client-side route tracking and turn-by-turn guidance.
//!
//! A [`NavigationController`] consumes location fixes against a validated
//! [`Route`], advancing steps, detecting deviation and arrival. A
//! [`NavigationSession`] wires it to a [`PositionSource`] and a
//! [`RoutingService`] on a single async task.

pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod guidance;
pub mod location_health;
pub mod position;
pub mod route;
pub mod routing;
pub mod session;
pub mod types;

pub use config::{NavigationConfig, RoutingConfig};
pub use controller::{NavigationController, NavigationEvent, NavigationState, Phase};
pub use error::{NavError, NavResult};
pub use position::{LocationError, LocationErrorKind, PositionSource, Subscription};
pub use route::{ManeuverType, Route, RouteError, Step};
pub use routing::{DirectRouting, OrsRoutingService, RoutingError, RoutingService};
pub use session::{NavigationSession, NavigationSnapshot, SessionHandle, SessionOutcome};
pub use types::{GeoPoint, Position};
