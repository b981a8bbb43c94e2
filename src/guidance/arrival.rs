use crate::geometry::distance_meters;
use crate::route::Route;
use crate::types::Position;

/// Destination proximity check, independent of step progress
#[derive(Clone, Copy, Debug)]
pub struct ArrivalDetector {
    threshold_m: f64,
}

impl ArrivalDetector {
    pub fn new(threshold_m: f64) -> Self {
        ArrivalDetector { threshold_m }
    }

    pub fn evaluate(&self, position: &Position, route: &Route) -> bool {
        distance_meters(position.point, route.destination()) < self.threshold_m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ARRIVAL_M;
    use crate::route::fixtures::three_step_route;
    use crate::types::GeoPoint;

    #[test]
    fn test_arrival_threshold() {
        let route = three_step_route();
        let detector = ArrivalDetector::new(DEFAULT_ARRIVAL_M);
        let dest = route.destination();

        assert!(detector.evaluate(&Position::now(dest), &route));
        // ~11 m south of the destination
        let near = GeoPoint::new(dest.latitude - 0.0001, dest.longitude);
        assert!(detector.evaluate(&Position::now(near), &route));
        // ~33 m south
        let far = GeoPoint::new(dest.latitude - 0.0003, dest.longitude);
        assert!(!detector.evaluate(&Position::now(far), &route));
    }
}
