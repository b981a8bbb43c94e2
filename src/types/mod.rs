use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// WGS84 coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

// geo uses (x, y) = (lon, lat)
impl From<GeoPoint> for geo::Point<f64> {
    fn from(p: GeoPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

impl From<geo::Point<f64>> for GeoPoint {
    fn from(p: geo::Point<f64>) -> Self {
        GeoPoint::new(p.y(), p.x())
    }
}

/// One live fix from the location service.
///
/// Timestamps come from the device clock and are carried for display only;
/// fixes are processed in arrival order, not timestamp order.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub point: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    pub fn new(point: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Position { point, timestamp }
    }

    /// Fix stamped with the current wall clock
    pub fn now(point: GeoPoint) -> Self {
        Position {
            point,
            timestamp: Utc::now(),
        }
    }
}
