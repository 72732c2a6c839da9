// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentStatus, BookingError};

/// Appointment state machine: pending, then confirmed, then completed, with
/// cancellation possible until completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), BookingError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(BookingError::InvalidStateTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tokio_test::assert_ok;
    use crate::models::AppointmentStatus::*;

    const ALL: [AppointmentStatus; 4] = [Pending, Confirmed, Completed, Cancelled];

    #[test]
    fn forward_path_and_cancellation_are_allowed() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_ok!(lifecycle.validate_status_transition(Pending, Confirmed));
        assert_ok!(lifecycle.validate_status_transition(Confirmed, Completed));
        assert_ok!(lifecycle.validate_status_transition(Pending, Cancelled));
        assert_ok!(lifecycle.validate_status_transition(Confirmed, Cancelled));
    }

    #[test]
    fn nothing_moves_back_to_pending() {
        let lifecycle = AppointmentLifecycleService::new();
        for status in ALL {
            assert_matches!(
                lifecycle.validate_status_transition(status, Pending),
                Err(BookingError::InvalidStateTransition { to: Pending, .. })
            );
        }
    }

    #[test]
    fn skipping_confirmation_is_rejected() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_matches!(
            lifecycle.validate_status_transition(Pending, Completed),
            Err(BookingError::InvalidStateTransition { from: Pending, to: Completed })
        );
    }

    #[test]
    fn completed_and_cancelled_are_terminal() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.is_terminal(Completed));
        assert!(lifecycle.is_terminal(Cancelled));
        assert!(!lifecycle.is_terminal(Pending));

        for status in ALL {
            assert!(lifecycle.validate_status_transition(Completed, status).is_err());
            assert!(lifecycle.validate_status_transition(Cancelled, status).is_err());
        }
    }
}
