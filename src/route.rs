//! Validated walking route: polyline geometry partitioned into maneuver steps.

use crate::geometry::polyline_length;
use crate::types::GeoPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a route was rejected before installation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("Route geometry needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("Invalid coordinate at geometry index {0}")]
    InvalidCoordinate(usize),

    #[error("Route has no steps")]
    NoSteps,

    #[error("Step {step} span ({start}, {end}) is out of bounds or reversed")]
    InvalidSpan { step: usize, start: usize, end: usize },

    #[error("Step {step} starts at {start} but previous step ended at {expected}")]
    NonContiguous {
        step: usize,
        start: usize,
        expected: usize,
    },

    #[error("Steps end at index {end} but geometry ends at {last}")]
    IncompleteCoverage { end: usize, last: usize },

    #[error("Step {0} end point does not match its geometry span")]
    EndPointMismatch(usize),

    #[error("Step {0} has a negative or non-finite distance/duration")]
    InvalidMeasure(usize),

    #[error("Total distance must be finite and non-negative")]
    InvalidTotal,
}

impl RouteError {
    /// Attribute a per-step error to step `index` of the enclosing route
    pub fn for_step(self, index: usize) -> Self {
        match self {
            RouteError::InvalidSpan { start, end, .. } => RouteError::InvalidSpan {
                step: index,
                start,
                end,
            },
            RouteError::NonContiguous { start, expected, .. } => RouteError::NonContiguous {
                step: index,
                start,
                expected,
            },
            RouteError::EndPointMismatch(_) => RouteError::EndPointMismatch(index),
            RouteError::InvalidMeasure(_) => RouteError::InvalidMeasure(index),
            other => other,
        }
    }
}

/// Maneuver kinds, numbered like OpenRouteService instruction types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverType {
    Left,
    Right,
    SharpLeft,
    SharpRight,
    SlightLeft,
    SlightRight,
    Straight,
    EnterRoundabout,
    ExitRoundabout,
    UTurn,
    Goal,
    Depart,
    KeepLeft,
    KeepRight,
}

impl ManeuverType {
    /// Unknown codes fall back to `Straight`
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ManeuverType::Left,
            1 => ManeuverType::Right,
            2 => ManeuverType::SharpLeft,
            3 => ManeuverType::SharpRight,
            4 => ManeuverType::SlightLeft,
            5 => ManeuverType::SlightRight,
            6 => ManeuverType::Straight,
            7 => ManeuverType::EnterRoundabout,
            8 => ManeuverType::ExitRoundabout,
            9 => ManeuverType::UTurn,
            10 => ManeuverType::Goal,
            11 => ManeuverType::Depart,
            12 => ManeuverType::KeepLeft,
            13 => ManeuverType::KeepRight,
            _ => ManeuverType::Straight,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ManeuverType::Left => 0,
            ManeuverType::Right => 1,
            ManeuverType::SharpLeft => 2,
            ManeuverType::SharpRight => 3,
            ManeuverType::SlightLeft => 4,
            ManeuverType::SlightRight => 5,
            ManeuverType::Straight => 6,
            ManeuverType::EnterRoundabout => 7,
            ManeuverType::ExitRoundabout => 8,
            ManeuverType::UTurn => 9,
            ManeuverType::Goal => 10,
            ManeuverType::Depart => 11,
            ManeuverType::KeepLeft => 12,
            ManeuverType::KeepRight => 13,
        }
    }
}

/// One instruction-sized piece of a route.
///
/// `geometry_span` is the inclusive range of geometry indices the step
/// covers. Consecutive steps share their boundary vertex, so a step owns
/// `(start, end]` and the first step additionally owns index 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub maneuver: ManeuverType,
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry_span: (usize, usize),
    pub end_point: GeoPoint,
}

impl Step {
    /// Build a step whose end point is read from `geometry[span.1]`.
    ///
    /// A step knows nothing of its position in the route, so a span error
    /// names step 0; callers building a list re-tag it with
    /// [`RouteError::for_step`].
    pub fn new(
        maneuver: ManeuverType,
        distance_m: f64,
        duration_s: f64,
        geometry_span: (usize, usize),
        geometry: &[GeoPoint],
    ) -> Result<Self, RouteError> {
        let end_point = geometry
            .get(geometry_span.1)
            .copied()
            .ok_or(RouteError::InvalidSpan {
                step: 0,
                start: geometry_span.0,
                end: geometry_span.1,
            })?;

        Ok(Step {
            maneuver,
            distance_m,
            duration_s,
            geometry_span,
            end_point,
        })
    }
}

#[derive(Deserialize)]
struct RouteData {
    geometry: Vec<GeoPoint>,
    steps: Vec<Step>,
    #[serde(default)]
    total_distance_m: f64,
}

impl TryFrom<RouteData> for Route {
    type Error = RouteError;

    fn try_from(data: RouteData) -> Result<Self, Self::Error> {
        Route::new(data.geometry, data.steps, data.total_distance_m)
    }
}

/// A route that has passed validation.
///
/// Fields are private so every `Route` in the engine upholds the step
/// partition and end-point invariants; deserialisation validates too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteData")]
pub struct Route {
    geometry: Vec<GeoPoint>,
    steps: Vec<Step>,
    total_distance_m: f64,
}

impl Route {
    /// Validate and build a route.
    ///
    /// A zero `total_distance_m` is replaced by the polyline length.
    pub fn new(
        geometry: Vec<GeoPoint>,
        steps: Vec<Step>,
        total_distance_m: f64,
    ) -> Result<Self, RouteError> {
        if geometry.len() < 2 {
            return Err(RouteError::TooFewPoints(geometry.len()));
        }
        if let Some(idx) = geometry.iter().position(|p| !p.is_valid()) {
            return Err(RouteError::InvalidCoordinate(idx));
        }
        if steps.is_empty() {
            return Err(RouteError::NoSteps);
        }
        if !total_distance_m.is_finite() || total_distance_m < 0.0 {
            return Err(RouteError::InvalidTotal);
        }

        let last = geometry.len() - 1;
        let mut expected_start = 0;

        for (i, step) in steps.iter().enumerate() {
            let (start, end) = step.geometry_span;
            if start > end || end > last {
                return Err(RouteError::InvalidSpan { step: i, start, end });
            }
            if start != expected_start {
                return Err(RouteError::NonContiguous {
                    step: i,
                    start,
                    expected: expected_start,
                });
            }
            if step.end_point != geometry[end] {
                return Err(RouteError::EndPointMismatch(i));
            }
            let measures_ok = step.distance_m.is_finite()
                && step.distance_m >= 0.0
                && step.duration_s.is_finite()
                && step.duration_s >= 0.0;
            if !measures_ok {
                return Err(RouteError::InvalidMeasure(i));
            }
            expected_start = end;
        }

        if expected_start != last {
            return Err(RouteError::IncompleteCoverage {
                end: expected_start,
                last,
            });
        }

        let total_distance_m = if total_distance_m > 0.0 {
            total_distance_m
        } else {
            polyline_length(&geometry)
        };

        Ok(Route {
            geometry,
            steps,
            total_distance_m,
        })
    }

    /// Straight two-point route with a single `Goal` step
    pub fn direct(origin: GeoPoint, destination: GeoPoint) -> Result<Self, RouteError> {
        let geometry = vec![origin, destination];
        let distance = polyline_length(&geometry);
        let step = Step::new(ManeuverType::Goal, distance, 0.0, (0, 1), &geometry)?;
        Route::new(geometry, vec![step], distance)
    }

    pub fn geometry(&self) -> &[GeoPoint] {
        &self.geometry
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn origin(&self) -> GeoPoint {
        self.geometry[0]
    }

    /// End point of the last step
    pub fn destination(&self) -> GeoPoint {
        // Non-empty by construction
        self.steps[self.steps.len() - 1].end_point
    }

    /// Index of the step owning a geometry vertex
    pub fn step_for_vertex(&self, index: usize) -> Option<usize> {
        if index >= self.geometry.len() {
            return None;
        }
        self.steps
            .iter()
            .position(|s| index <= s.geometry_span.1)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Three-step route heading north then east, ~110 m per leg
    pub fn three_step_route() -> Route {
        let geometry = vec![
            GeoPoint::new(51.5000, -0.1000),
            GeoPoint::new(51.5005, -0.1000),
            GeoPoint::new(51.5010, -0.1000),
            GeoPoint::new(51.5010, -0.0992),
            GeoPoint::new(51.5010, -0.0984),
            GeoPoint::new(51.5015, -0.0984),
        ];
        let steps = vec![
            Step::new(ManeuverType::Depart, 111.0, 80.0, (0, 2), &geometry).unwrap(),
            Step::new(ManeuverType::Right, 111.0, 80.0, (2, 4), &geometry).unwrap(),
            Step::new(ManeuverType::Left, 55.0, 40.0, (4, 5), &geometry).unwrap(),
        ];
        Route::new(geometry, steps, 0.0).unwrap()
    }
}
