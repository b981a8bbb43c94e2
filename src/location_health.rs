use crate::position::LocationError;

/// What the controller should tell the UI after a fix or a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthChange {
    /// Nothing worth reporting
    Unchanged,
    /// Failures crossed the limit (or a fatal one arrived)
    Lost { consecutive_errors: u32 },
    /// First good fix after a loss
    Restored,
}

/// Tracks consecutive location failures for one navigation session.
///
/// Intermittent failures are ignored. A streak of `error_limit`
/// consecutive failures, or a single permission denial, escalates once;
/// the next good fix clears the streak.
#[derive(Clone, Debug)]
pub struct LocationHealth {
    error_limit: u32,
    consecutive_errors: u32,
    escalated: bool,
}

impl LocationHealth {
    pub fn new(error_limit: u32) -> Self {
        LocationHealth {
            error_limit: error_limit.max(1),
            consecutive_errors: 0,
            escalated: false,
        }
    }

    pub fn record_error(&mut self, error: &LocationError) -> HealthChange {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);

        if self.escalated {
            return HealthChange::Unchanged;
        }

        if error.is_fatal() || self.consecutive_errors >= self.error_limit {
            self.escalated = true;
            log::warn!(
                "Location lost after {} consecutive error(s), last: {}",
                self.consecutive_errors,
                error
            );
            return HealthChange::Lost {
                consecutive_errors: self.consecutive_errors,
            };
        }

        log::debug!(
            "Ignoring transient location error {}/{}: {}",
            self.consecutive_errors,
            self.error_limit,
            error
        );
        HealthChange::Unchanged
    }

    pub fn record_fix(&mut self) -> HealthChange {
        self.consecutive_errors = 0;
        if std::mem::take(&mut self.escalated) {
            log::info!("Location restored");
            HealthChange::Restored
        } else {
            HealthChange::Unchanged
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn is_healthy(&self) -> bool {
        !self.escalated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::LocationErrorKind;

    fn timeout() -> LocationError {
        LocationError::new(LocationErrorKind::Timeout, "no fix")
    }

    #[test]
    fn test_intermittent_errors_ignored() {
        let mut health = LocationHealth::new(3);
        assert_eq!(health.record_error(&timeout()), HealthChange::Unchanged);
        assert_eq!(health.record_error(&timeout()), HealthChange::Unchanged);
        assert_eq!(health.record_fix(), HealthChange::Unchanged);
        assert_eq!(health.record_error(&timeout()), HealthChange::Unchanged);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_escalates_once_per_streak() {
        let mut health = LocationHealth::new(3);
        health.record_error(&timeout());
        health.record_error(&timeout());
        assert_eq!(
            health.record_error(&timeout()),
            HealthChange::Lost { consecutive_errors: 3 }
        );
        assert_eq!(health.record_error(&timeout()), HealthChange::Unchanged);
        assert_eq!(health.consecutive_errors(), 4);
        assert!(!health.is_healthy());

        assert_eq!(health.record_fix(), HealthChange::Restored);
        assert_eq!(health.record_fix(), HealthChange::Unchanged);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_permission_denied_escalates_immediately() {
        let mut health = LocationHealth::new(5);
        let denied = LocationError::new(LocationErrorKind::PermissionDenied, "denied");
        assert_eq!(
            health.record_error(&denied),
            HealthChange::Lost { consecutive_errors: 1 }
        );
    }

    #[test]
    fn test_zero_limit_clamped() {
        let mut health = LocationHealth::new(0);
        assert!(matches!(health.record_error(&timeout()), HealthChange::Lost { .. }));
    }
}
