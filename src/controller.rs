//! Navigation state machine.
//!
//! `NAVIGATING -> RECALCULATING -> NAVIGATING` on every recalculation
//! (success or failure), `NAVIGATING -> ARRIVED` once, terminal.
//! Cancellation leaves the machine entirely.
//!
//! The controller is synchronous: it turns one input (a fix, a location
//! error, a routing response) into events plus, at most, a request for the
//! caller to send to the routing service. Driving it against real async
//! sources is the job of [`crate::session`].

use crate::config::NavigationConfig;
use crate::error::{NavError, NavResult};
use crate::geometry::distance_meters;
use crate::guidance::{ArrivalDetector, RouteMonitor, StepTracker};
use crate::location_health::{HealthChange, LocationHealth};
use crate::position::LocationError;
use crate::route::Route;
use crate::routing::RoutingError;
use crate::types::{GeoPoint, Position};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Navigating,
    Recalculating,
    Arrived,
}

/// Events for the UI layer. No display strings; rendering is the UI's job.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    StepAdvanced { index: usize },
    RecalculationStarted,
    RouteUpdated { route: Route },
    RecalculationFailed,
    Arrived,
    LocationUnavailable { consecutive_errors: u32 },
    LocationRestored,
}

/// Everything the controller knows about the current session.
///
/// Only the controller mutates it.
#[derive(Clone, Debug)]
pub struct NavigationState {
    route: Route,
    current_step_index: usize,
    last_recalculation_at: Option<Instant>,
    phase: Phase,
}

impl NavigationState {
    pub fn new(route: Route) -> Self {
        NavigationState {
            route,
            current_step_index: 0,
            last_recalculation_at: None,
            phase: Phase::Navigating,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn last_recalculation_at(&self) -> Option<Instant> {
        self.last_recalculation_at
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_step_index(&mut self, index: usize) {
        self.current_step_index = index.min(self.route.steps().len() - 1);
    }

    pub(crate) fn set_last_recalculation_at(&mut self, at: Instant) {
        self.last_recalculation_at = Some(at);
    }
}

/// Recalculation the caller must send to the routing service.
///
/// The response goes back through
/// [`NavigationController::on_recalculation_result`] with the same ticket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecalculationRequest {
    pub ticket: u64,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionOutcome {
    pub events: Vec<NavigationEvent>,
    pub recalculation: Option<RecalculationRequest>,
}

pub struct NavigationController {
    state: NavigationState,
    active: bool,
    current_position: Option<Position>,
    health: LocationHealth,
    step_tracker: StepTracker,
    monitor: RouteMonitor,
    arrival: ArrivalDetector,
    pending_ticket: Option<u64>,
    next_ticket: u64,
}

impl NavigationController {
    pub fn new(route: Route, config: &NavigationConfig) -> NavResult<Self> {
        config.validate()?;
        log::info!(
            "Navigation started: {} steps, {:.0} m",
            route.steps().len(),
            route.total_distance_m()
        );

        Ok(NavigationController {
            state: NavigationState::new(route),
            active: true,
            current_position: None,
            health: LocationHealth::new(config.location_error_limit),
            step_tracker: StepTracker::new(config.step_completion_threshold_m),
            monitor: RouteMonitor::new(config.off_route_threshold_m, config.recalc_debounce()),
            arrival: ArrivalDetector::new(config.arrival_threshold_m),
            pending_ticket: None,
            next_ticket: 0,
        })
    }

    /// Handle one fix, in arrival order
    pub fn on_position(&mut self, position: Position, now: Instant) -> PositionOutcome {
        let mut outcome = PositionOutcome::default();

        if !self.active || self.state.phase == Phase::Arrived {
            log::debug!("Ignoring fix, session finished");
            return outcome;
        }

        self.current_position = Some(position);
        if self.health.record_fix() == HealthChange::Restored {
            outcome.events.push(NavigationEvent::LocationRestored);
        }

        // Destination is unchanged while recalculating, so arrival still applies
        if self.arrival.evaluate(&position, &self.state.route) {
            log::info!("Arrived at destination");
            self.state.phase = Phase::Arrived;
            self.pending_ticket = None;
            outcome.events.push(NavigationEvent::Arrived);
            return outcome;
        }

        if self.state.phase == Phase::Recalculating {
            return outcome;
        }

        let step = self.step_tracker.evaluate(&position, &self.state);
        if step.advance {
            self.state.set_step_index(step.new_index);
            log::info!("Advanced to step {}", step.new_index);
            outcome
                .events
                .push(NavigationEvent::StepAdvanced { index: step.new_index });
        }

        let monitor = self.monitor.evaluate(&position, &self.state, now);
        if monitor.should_recalculate {
            self.next_ticket += 1;
            let ticket = self.next_ticket;
            self.state.phase = Phase::Recalculating;
            self.state.set_last_recalculation_at(now);
            self.pending_ticket = Some(ticket);

            log::info!(
                "Off route by {:.1} m, requesting new route (ticket {})",
                monitor.distance_m,
                ticket
            );
            outcome.events.push(NavigationEvent::RecalculationStarted);
            outcome.recalculation = Some(RecalculationRequest {
                ticket,
                origin: position.point,
                destination: self.state.route.destination(),
            });
        }

        outcome
    }

    pub fn on_location_error(&mut self, error: &LocationError) -> Vec<NavigationEvent> {
        if !self.active || self.state.phase == Phase::Arrived {
            return Vec::new();
        }
        match self.health.record_error(error) {
            HealthChange::Lost { consecutive_errors } => {
                vec![NavigationEvent::LocationUnavailable { consecutive_errors }]
            }
            _ => Vec::new(),
        }
    }

    /// Apply a routing response. Stale tickets, and anything after
    /// arrival or cancellation, are discarded.
    pub fn on_recalculation_result(
        &mut self,
        ticket: u64,
        result: Result<Route, RoutingError>,
    ) -> Vec<NavigationEvent> {
        if !self.active || self.pending_ticket != Some(ticket) {
            log::debug!("Discarding recalculation result for ticket {}", ticket);
            return Vec::new();
        }
        self.pending_ticket = None;
        self.state.phase = Phase::Navigating;

        match result {
            Ok(route) => {
                log::info!(
                    "Route updated: {} steps, {:.0} m",
                    route.steps().len(),
                    route.total_distance_m()
                );
                self.state.route = route.clone();
                self.state.set_step_index(0);
                vec![NavigationEvent::RouteUpdated { route }]
            }
            Err(e) => {
                log::warn!("Recalculation failed, keeping current route: {}", e);
                vec![NavigationEvent::RecalculationFailed]
            }
        }
    }

    /// Start over with a route to a new destination
    pub fn set_destination(&mut self, route: Route) -> NavResult<()> {
        if !self.active {
            return Err(NavError::SessionEnded);
        }
        log::info!("New destination, {} steps", route.steps().len());
        self.state = NavigationState::new(route);
        self.pending_ticket = None;
        Ok(())
    }

    /// End the session; every later input is ignored
    pub fn cancel(&mut self) {
        if self.active {
            log::info!("Navigation cancelled");
        }
        self.active = false;
        self.pending_ticket = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Arrived or cancelled
    pub fn is_finished(&self) -> bool {
        !self.active || self.state.phase == Phase::Arrived
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn current_step_index(&self) -> usize {
        self.state.current_step_index
    }

    pub fn current_position(&self) -> Option<Position> {
        self.current_position
    }

    /// Distance to the current step's end plus all later steps (m)
    pub fn remaining_distance_m(&self) -> Option<f64> {
        let position = self.current_position?;
        let steps = self.state.route.steps();
        let idx = self.state.current_step_index;
        let to_step_end = distance_meters(position.point, steps[idx].end_point);
        let after: f64 = steps[idx + 1..].iter().map(|s| s.distance_m).sum();
        Some(to_step_end + after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::fixtures::three_step_route;
    use std::time::Duration;

    fn controller() -> NavigationController {
        NavigationController::new(three_step_route(), &NavigationConfig::default()).unwrap()
    }

    fn fix(lat: f64, lon: f64) -> Position {
        Position::now(GeoPoint::new(lat, lon))
    }

    // ~50 m west of the route start
    fn stray() -> Position {
        fix(51.5000, -0.10072)
    }

    fn detour_route() -> Route {
        Route::direct(GeoPoint::new(51.5000, -0.10072), GeoPoint::new(51.5015, -0.0984)).unwrap()
    }

    #[test]
    fn test_scenario_step_then_arrival() {
        let mut nav = controller();
        let route = three_step_route();
        let t0 = Instant::now();

        let out = nav.on_position(Position::now(route.steps()[0].end_point), t0);
        assert_eq!(out.events, vec![NavigationEvent::StepAdvanced { index: 1 }]);
        assert_eq!(nav.current_step_index(), 1);

        // Jump straight to the destination from step 1
        let out = nav.on_position(Position::now(route.destination()), t0 + Duration::from_secs(1));
        assert_eq!(out.events, vec![NavigationEvent::Arrived]);
        assert_eq!(nav.phase(), Phase::Arrived);
        assert_eq!(nav.current_step_index(), 1);
        assert!(nav.is_finished());
    }

    #[test]
    fn test_arrival_is_idempotent() {
        let mut nav = controller();
        let dest = three_step_route().destination();
        let t0 = Instant::now();

        nav.on_position(Position::now(dest), t0);
        let later = nav.on_position(stray(), t0 + Duration::from_secs(30));
        assert_eq!(later, PositionOutcome::default());
        assert!(nav.on_position(Position::now(dest), t0).events.is_empty());
    }

    #[test]
    fn test_step_index_monotonic_and_single_increment() {
        let mut nav = controller();
        let route = three_step_route();
        let t0 = Instant::now();
        let mut last = 0;

        let walk = [
            route.steps()[1].end_point,
            route.steps()[0].end_point,
            route.steps()[0].end_point,
            route.steps()[1].end_point,
            route.origin(),
        ];
        for (i, p) in walk.into_iter().enumerate() {
            nav.on_position(Position::now(p), t0 + Duration::from_secs(i as u64));
            let idx = nav.current_step_index();
            assert!(idx >= last && idx <= last + 1);
            last = idx;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn test_debounce_across_fixes() {
        let mut nav = controller();
        let t0 = Instant::now();

        let first = nav.on_position(stray(), t0);
        let request = first.recalculation.unwrap();
        assert_eq!(first.events, vec![NavigationEvent::RecalculationStarted]);
        assert_eq!(request.destination, three_step_route().destination());
        assert_eq!(nav.phase(), Phase::Recalculating);

        nav.on_recalculation_result(request.ticket, Err(RoutingError::Timeout));

        // 5 s after the first request: suppressed
        let second = nav.on_position(stray(), t0 + Duration::from_secs(5));
        assert!(second.recalculation.is_none());

        // 11 s after: issued again
        let third = nav.on_position(stray(), t0 + Duration::from_secs(11));
        assert!(third.recalculation.is_some());
    }

    #[test]
    fn test_no_overlapping_requests_while_recalculating() {
        let mut nav = controller();
        let t0 = Instant::now();

        assert!(nav.on_position(stray(), t0).recalculation.is_some());
        let out = nav.on_position(stray(), t0 + Duration::from_secs(60));
        assert!(out.recalculation.is_none());
        assert!(out.events.is_empty());
        assert_eq!(nav.current_position().unwrap().point, stray().point);
    }

    #[test]
    fn test_recalculation_failure_keeps_route() {
        let mut nav = controller();
        let before = nav.state().route().clone();
        let request = nav.on_position(stray(), Instant::now()).recalculation.unwrap();

        let events = nav.on_recalculation_result(request.ticket, Err(RoutingError::RateLimited));
        assert_eq!(events, vec![NavigationEvent::RecalculationFailed]);
        assert_eq!(nav.state().route(), &before);
        assert_eq!(nav.phase(), Phase::Navigating);

        // Duplicate delivery is ignored
        assert!(nav
            .on_recalculation_result(request.ticket, Err(RoutingError::RateLimited))
            .is_empty());
    }

    #[test]
    fn test_recalculation_success_resets_step() {
        let mut nav = controller();
        let t0 = Instant::now();
        nav.on_position(Position::now(three_step_route().steps()[0].end_point), t0);
        assert_eq!(nav.current_step_index(), 1);

        let request = nav.on_position(stray(), t0).recalculation.unwrap();
        let events = nav.on_recalculation_result(request.ticket, Ok(detour_route()));

        assert_eq!(events, vec![NavigationEvent::RouteUpdated { route: detour_route() }]);
        assert_eq!(nav.current_step_index(), 0);
        assert_eq!(nav.state().route(), &detour_route());
        assert_eq!(nav.phase(), Phase::Navigating);
    }

    #[test]
    fn test_result_after_arrival_discarded() {
        let mut nav = controller();
        let t0 = Instant::now();
        let request = nav.on_position(stray(), t0).recalculation.unwrap();

        let out = nav.on_position(Position::now(three_step_route().destination()), t0);
        assert_eq!(out.events, vec![NavigationEvent::Arrived]);

        assert!(nav
            .on_recalculation_result(request.ticket, Ok(detour_route()))
            .is_empty());
        assert_eq!(nav.phase(), Phase::Arrived);
    }

    #[test]
    fn test_cancel_discards_in_flight_result() {
        let mut nav = controller();
        let request = nav.on_position(stray(), Instant::now()).recalculation.unwrap();
        nav.cancel();

        assert!(nav
            .on_recalculation_result(request.ticket, Ok(detour_route()))
            .is_empty());
        assert!(nav.on_position(stray(), Instant::now()).events.is_empty());
        assert!(!nav.is_active());
        assert!(matches!(
            nav.set_destination(detour_route()),
            Err(NavError::SessionEnded)
        ));
    }

    #[test]
    fn test_location_errors() {
        let mut nav = controller();
        let err = LocationError::new(crate::position::LocationErrorKind::Timeout, "no fix");

        for _ in 0..4 {
            assert!(nav.on_location_error(&err).is_empty());
        }
        assert_eq!(
            nav.on_location_error(&err),
            vec![NavigationEvent::LocationUnavailable { consecutive_errors: 5 }]
        );
        assert!(nav.on_location_error(&err).is_empty());

        let out = nav.on_position(fix(51.50025, -0.1000), Instant::now());
        assert_eq!(out.events, vec![NavigationEvent::LocationRestored]);
    }

    #[test]
    fn test_set_destination_resets_state() {
        let mut nav = controller();
        nav.on_position(stray(), Instant::now());
        nav.set_destination(detour_route()).unwrap();

        assert_eq!(nav.phase(), Phase::Navigating);
        assert_eq!(nav.current_step_index(), 0);
        assert!(nav.state().last_recalculation_at().is_none());
    }

    #[test]
    fn test_remaining_distance() {
        let mut nav = controller();
        assert!(nav.remaining_distance_m().is_none());

        nav.on_position(Position::now(three_step_route().origin()), Instant::now());
        let remaining = nav.remaining_distance_m().unwrap();
        // 111 m to the first step's end + 111 + 55
        assert!((remaining - 277.0).abs() < 2.0, "got {remaining}");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = NavigationConfig {
            arrival_threshold_m: -1.0,
            ..NavigationConfig::default()
        };
        assert!(matches!(
            NavigationController::new(three_step_route(), &config),
            Err(NavError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_step_index_clamped_to_route() {
        let mut state = NavigationState::new(three_step_route());
        state.set_step_index(99);
        assert_eq!(state.current_step_index(), 2);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&NavigationEvent::StepAdvanced { index: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"step_advanced","index":2}"#);
        let json = serde_json::to_string(&NavigationEvent::Arrived).unwrap();
        assert_eq!(json, r#"{"type":"arrived"}"#);
    }
}
