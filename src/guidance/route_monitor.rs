use crate::controller::NavigationState;
use crate::geometry::nearest_distance_to_polyline;
use crate::types::Position;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonitorDecision {
    pub off_route: bool,
    pub should_recalculate: bool,
    /// Distance to the route polyline (m)
    pub distance_m: f64,
}

/// Off-route detection with a debounced recalculation trigger.
///
/// The debounce is a hard floor measured against
/// `NavigationState::last_recalculation_at`, which only the controller
/// writes once a request is actually issued.
#[derive(Clone, Copy, Debug)]
pub struct RouteMonitor {
    off_route_threshold_m: f64,
    debounce: Duration,
}

impl RouteMonitor {
    pub fn new(off_route_threshold_m: f64, debounce: Duration) -> Self {
        RouteMonitor {
            off_route_threshold_m,
            debounce,
        }
    }

    pub fn evaluate(
        &self,
        position: &Position,
        state: &NavigationState,
        now: Instant,
    ) -> MonitorDecision {
        let distance_m = nearest_distance_to_polyline(position.point, state.route().geometry());
        let off_route = distance_m > self.off_route_threshold_m;

        let debounce_elapsed = match state.last_recalculation_at() {
            None => true,
            // saturating: a `now` earlier than the last request counts as zero elapsed
            Some(last) => now.saturating_duration_since(last) >= self.debounce,
        };

        let should_recalculate = off_route && debounce_elapsed;
        if off_route {
            log::debug!(
                "Off route by {:.1} m (recalculate: {})",
                distance_m,
                should_recalculate
            );
        }

        MonitorDecision {
            off_route,
            should_recalculate,
            distance_m,
        }
    }
}
