use crate::controller::NavigationState;
use crate::geometry::distance_meters;
use crate::types::Position;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepDecision {
    pub advance: bool,
    pub new_index: usize,
}

/// Advances through maneuver steps one at a time.
///
/// A step completes when the fix is within `completion_threshold_m` of its
/// end point. At most one step is advanced per fix, and the last step never
/// advances (arrival handles the end of the route).
#[derive(Clone, Copy, Debug)]
pub struct StepTracker {
    completion_threshold_m: f64,
}

impl StepTracker {
    pub fn new(completion_threshold_m: f64) -> Self {
        StepTracker {
            completion_threshold_m,
        }
    }

    pub fn evaluate(&self, position: &Position, state: &NavigationState) -> StepDecision {
        let index = state.current_step_index();
        let steps = state.route().steps();

        let hold = StepDecision {
            advance: false,
            new_index: index,
        };

        if index + 1 >= steps.len() {
            return hold;
        }

        let d = distance_meters(position.point, steps[index].end_point);
        if d < self.completion_threshold_m {
            log::debug!("Step {} complete ({:.1} m from its end)", index, d);
            StepDecision {
                advance: true,
                new_index: index + 1,
            }
        } else {
            hold
        }
    }
}
