//! Per-action state machine with validated transitions.
//!
//! Pending -> Processing -> Succeeded/Failed
//! Pending -> Failed (rejected before any network call)

use crate::error::ActionError;
use crate::run::RunState;

/// Validate that a state transition is allowed.
///
/// Valid transitions:
/// - Pending -> Processing
/// - Pending -> Failed
/// - Processing -> Succeeded
/// - Processing -> Failed
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), ActionError> {
    let valid = matches!(
        (from, to),
        (RunState::Pending, RunState::Processing)
            | (RunState::Pending, RunState::Failed)
            | (RunState::Processing, RunState::Succeeded)
            | (RunState::Processing, RunState::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(ActionError::InvalidTransition(from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RunState; 4] = [
        RunState::Pending,
        RunState::Processing,
        RunState::Succeeded,
        RunState::Failed,
    ];

    #[test]
    fn test_pending_to_processing() {
        assert!(validate_transition(RunState::Pending, RunState::Processing).is_ok());
    }

    #[test]
    fn test_pending_to_failed() {
        assert!(validate_transition(RunState::Pending, RunState::Failed).is_ok());
    }

    #[test]
    fn test_processing_to_terminal() {
        assert!(validate_transition(RunState::Processing, RunState::Succeeded).is_ok());
        assert!(validate_transition(RunState::Processing, RunState::Failed).is_ok());
    }

    #[test]
    fn test_pending_to_succeeded_invalid() {
        assert!(validate_transition(RunState::Pending, RunState::Succeeded).is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        for from in [RunState::Succeeded, RunState::Failed] {
            for to in ALL {
                assert!(
                    validate_transition(from, to).is_err(),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_self_transitions_invalid() {
        for state in ALL {
            assert!(validate_transition(state, state).is_err());
        }
    }

    #[test]
    fn test_all_valid_transitions_count() {
        let mut valid_count = 0;
        for from in ALL {
            for to in ALL {
                if validate_transition(from, to).is_ok() {
                    valid_count += 1;
                }
            }
        }
        assert_eq!(valid_count, 4, "Expected exactly 4 valid transitions");
    }

    #[test]
    fn test_invalid_transition_error_message() {
        let err = validate_transition(RunState::Failed, RunState::Processing).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed"));
        assert!(msg.contains("processing"));
    }
}
