//! Stage short-circuiting and terminal workflow outcomes.
//!
//! Every pipeline stage returns [`StageResult<T>`]: `Ok(value)` continues
//! the chain, `Err(Halt::Blocked { .. })` is a deliberate policy stop, and
//! `Err(Halt::Error { .. })` is an infrastructure fault. Using `Result`
//! makes the three-way chain a plain `?` chain while keeping failure
//! handling exhaustive.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DepgateError;

/// A stage outcome that terminates the pipeline.
///
/// `Blocked` is expected-and-actionable (file an issue, stop); `Error` is
/// unexpected-and-diagnostic (abort with full command context). The two
/// demand different operator responses and are never collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Halt {
    /// Deliberate policy stop: unsafe assessment, verification failure,
    /// dry-run guard.
    Blocked { reason: String, context: Value },

    /// Infrastructure/tooling fault.
    Error { reason: String },
}

impl Halt {
    /// A policy stop with no additional context.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Halt::Blocked {
            reason: reason.into(),
            context: Value::Null,
        }
    }

    /// A policy stop carrying a context snapshot for the report.
    pub fn blocked_with(reason: impl Into<String>, context: Value) -> Self {
        Halt::Blocked {
            reason: reason.into(),
            context,
        }
    }

    /// An infrastructure fault.
    pub fn error(reason: impl Into<String>) -> Self {
        Halt::Error {
            reason: reason.into(),
        }
    }
}

impl From<DepgateError> for Halt {
    /// Stage-boundary conversion: schema violations of model output are
    /// policy stops, everything else is an infrastructure fault.
    fn from(err: DepgateError) -> Self {
        match err {
            DepgateError::Validation(v) => Halt::Blocked {
                reason: format!("assessment validation failed: {v}"),
                context: Value::Null,
            },
            other => Halt::Error {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for a single pipeline stage.
pub type StageResult<T> = std::result::Result<T, Halt>;

/// Terminal result of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// The update was applied, verified and published.
    ///
    /// `pr_url` is `None` for a successful dry-run, which stops short of
    /// commit/push/PR.
    Completed { pr_url: Option<String> },

    /// A policy stop; a structured report was produced.
    Blocked { reason: String, context: Value },

    /// The run aborted on an infrastructure fault.
    Error { reason: String },
}

impl From<Halt> for WorkflowOutcome {
    fn from(halt: Halt) -> Self {
        match halt {
            Halt::Blocked { reason, context } => WorkflowOutcome::Blocked { reason, context },
            Halt::Error { reason } => WorkflowOutcome::Error { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ValidationError;
    use serde_json::json;

    #[test]
    fn test_validation_error_becomes_blocked() {
        let err = DepgateError::Validation(ValidationError::NotAnObject);
        match Halt::from(err) {
            Halt::Blocked { reason, .. } => {
                assert!(reason.contains("not a JSON object"));
            }
            other => panic!("expected Blocked, got {:?}", other),
        }
    }

    #[test]
    fn test_exec_error_becomes_error() {
        let err = DepgateError::Exec("command timed out after 300000ms".to_string());
        match Halt::from(err) {
            Halt::Error { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_halt_maps_onto_workflow_outcome() {
        let halt = Halt::blocked_with("unsafe change", json!({"dep": "ash"}));
        let outcome = WorkflowOutcome::from(halt);
        assert_eq!(
            outcome,
            WorkflowOutcome::Blocked {
                reason: "unsafe change".to_string(),
                context: json!({"dep": "ash"}),
            }
        );
    }

    #[test]
    fn test_workflow_outcome_serde_roundtrip() {
        let outcomes = [
            WorkflowOutcome::Completed {
                pr_url: Some("https://example.com/pr/1".to_string()),
            },
            WorkflowOutcome::Blocked {
                reason: "verification failed".to_string(),
                context: Value::Null,
            },
            WorkflowOutcome::Error {
                reason: "git not installed".to_string(),
            },
        ];
        for outcome in &outcomes {
            let json = serde_json::to_string(outcome).expect("serialize");
            let back: WorkflowOutcome = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(*outcome, back);
        }
    }
}
