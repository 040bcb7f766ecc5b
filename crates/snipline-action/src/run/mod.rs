//! Lifecycle of one action instance.
//!
//! An [`ActionRun`] tracks a single dispatch from `Pending` to a terminal
//! state and maps each state onto the [`ExecutionStatus`] written to the
//! ledger.

pub mod state_machine;

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use snipline_core::types::{ExecutionStatus, RecordId};

use crate::error::ActionError;
use crate::run::state_machine::validate_transition;

/// State of an in-flight action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }

    /// Ledger status for this state. `Pending` has no ledger entry yet.
    pub fn execution_status(&self) -> ExecutionStatus {
        match self {
            RunState::Pending => ExecutionStatus::Unexecuted,
            RunState::Processing => ExecutionStatus::Processing,
            RunState::Succeeded => ExecutionStatus::Success,
            RunState::Failed => ExecutionStatus::Error,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Processing => "processing",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which entry point started the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Prompt,
    Webhook,
    PromptWebhook,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Prompt => "prompt",
            ActionKind::Webhook => "webhook",
            ActionKind::PromptWebhook => "prompt_webhook",
        };
        f.write_str(s)
    }
}

/// One action instance.
#[derive(Debug)]
pub struct ActionRun {
    pub id: Uuid,
    pub kind: ActionKind,
    pub record_id: RecordId,
    /// Prompt name or webhook id the run targets.
    pub target: String,
    state: RunState,
    started: Instant,
}

impl ActionRun {
    pub fn new(kind: ActionKind, record_id: RecordId, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            record_id,
            target: target.into(),
            state: RunState::Pending,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Move to `to`, returning the ledger status to record.
    pub fn transition(&mut self, to: RunState) -> Result<ExecutionStatus, ActionError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(to.execution_status())
    }

    pub fn start(&mut self) -> Result<ExecutionStatus, ActionError> {
        self.transition(RunState::Processing)
    }

    /// Terminal transition chosen by `succeeded`.
    pub fn finish(&mut self, succeeded: bool) -> Result<ExecutionStatus, ActionError> {
        let to = if succeeded {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.transition(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> ActionRun {
        ActionRun::new(ActionKind::Prompt, RecordId::new(), "Summary")
    }

    #[test]
    fn test_new_run_is_pending() {
        let r = run();
        assert_eq!(r.state(), RunState::Pending);
        assert_eq!(r.state().execution_status(), ExecutionStatus::Unexecuted);
        assert_eq!(r.target, "Summary");
    }

    #[test]
    fn test_success_path() {
        let mut r = run();
        assert_eq!(r.start().unwrap(), ExecutionStatus::Processing);
        assert_eq!(r.finish(true).unwrap(), ExecutionStatus::Success);
        assert!(r.state().is_terminal());
    }

    #[test]
    fn test_failure_path() {
        let mut r = run();
        r.start().unwrap();
        assert_eq!(r.finish(false).unwrap(), ExecutionStatus::Error);
    }

    #[test]
    fn test_fail_before_start() {
        let mut r = run();
        assert_eq!(r.finish(false).unwrap(), ExecutionStatus::Error);
    }

    #[test]
    fn test_cannot_finish_twice() {
        let mut r = run();
        r.start().unwrap();
        r.finish(true).unwrap();
        assert!(matches!(
            r.finish(false),
            Err(ActionError::InvalidTransition(RunState::Succeeded, RunState::Failed))
        ));
        assert_eq!(r.state(), RunState::Succeeded);
    }

    #[test]
    fn test_cannot_succeed_without_processing() {
        let mut r = run();
        assert!(r.finish(true).is_err());
        assert_eq!(r.state(), RunState::Pending);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(RunState::Processing.to_string(), "processing");
        assert_eq!(ActionKind::PromptWebhook.to_string(), "prompt_webhook");
    }
}
