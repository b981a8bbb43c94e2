//! Per-fix decision functions.
//!
//! Each evaluator reads explicit state and returns an explicit decision;
//! none of them mutates anything. The controller applies the decisions.

pub mod arrival;
pub mod route_monitor;
pub mod step_tracker;

pub use arrival::ArrivalDetector;
pub use route_monitor::{MonitorDecision, RouteMonitor};
pub use step_tracker::{StepDecision, StepTracker};
