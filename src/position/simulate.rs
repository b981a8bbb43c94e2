use crate::geometry::distance_meters;
use crate::types::{GeoPoint, Position};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use geo::{HaversineBearing, HaversineDestination, HaversineIntermediate, Point};

/// Stretch of the walk pushed sideways off the path
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detour {
    /// Distance along the path where the detour begins (m)
    pub start_m: f64,
    pub length_m: f64,
    /// Perpendicular offset, positive to the right of travel (m)
    pub offset_m: f64,
}

/// Synthetic walker that samples points along a polyline at a fixed spacing.
///
/// Used by the demo binary and tests in place of a real device.
#[derive(Clone, Debug)]
pub struct SimulatedWalk {
    path: Vec<GeoPoint>,
    spacing_m: f64,
    detour: Option<Detour>,
}

impl SimulatedWalk {
    pub fn new(path: Vec<GeoPoint>, spacing_m: f64) -> Self {
        SimulatedWalk {
            path,
            spacing_m: spacing_m.max(0.1),
            detour: None,
        }
    }

    pub fn with_detour(mut self, detour: Detour) -> Self {
        self.detour = Some(detour);
        self
    }

    /// Sampled points, always ending exactly on the last path vertex
    pub fn points(&self) -> Vec<GeoPoint> {
        let mut out = Vec::new();
        let Some(&last) = self.path.last() else {
            return out;
        };

        let mut travelled = 0.0;
        let mut next_sample = 0.0;

        for pair in self.path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let seg_len = distance_meters(a, b);
            if seg_len <= f64::EPSILON {
                continue;
            }

            let pa: Point<f64> = a.into();
            let pb: Point<f64> = b.into();

            while next_sample < travelled + seg_len {
                let f = (next_sample - travelled) / seg_len;
                let mut p = pa.haversine_intermediate(&pb, f);

                if let Some(offset) = self.offset_at(next_sample) {
                    let bearing = pa.haversine_bearing(pb) + 90.0;
                    p = p.haversine_destination(bearing, offset);
                }

                out.push(GeoPoint::from(p));
                next_sample += self.spacing_m;
            }
            travelled += seg_len;
        }

        out.push(last);
        out
    }

    /// Points stamped `interval` apart starting at `start`
    pub fn positions(&self, start: DateTime<Utc>, interval: std::time::Duration) -> Vec<Position> {
        let step = ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::seconds(1));
        self.points()
            .into_iter()
            .enumerate()
            .map(|(i, p)| Position::new(p, start + step * i as i32))
            .collect()
    }

    fn offset_at(&self, along_m: f64) -> Option<f64> {
        self.detour.and_then(|d| {
            (along_m >= d.start_m && along_m < d.start_m + d.length_m).then_some(d.offset_m)
        })
    }
}
