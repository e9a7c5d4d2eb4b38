//! Structured observability hooks for pipeline lifecycle events.
//!
//! Emission functions for the key moments of a run: stage start,
//! command completion, gate decisions, and the terminal outcome. All
//! events go out at `info!` level except faults, which use `warn!`.

use tracing::{info, warn};

use crate::exec::CommandResult;

/// RAII guard that enters a run-scoped tracing span for the duration of
/// one pipeline run.
pub struct PipelineSpan {
    _span: tracing::span::EnteredSpan,
}

impl PipelineSpan {
    /// Create and enter a span tagged with the run label (the target
    /// dependency, or "select" before one is chosen).
    pub fn enter(label: &str) -> Self {
        let span = tracing::info_span!("depgate.run", target = %label);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a pipeline stage began.
pub fn emit_stage_started(stage: &str) {
    info!(event = "stage.started", stage = %stage);
}

/// Emit event: a command invocation finished, with its classification.
pub fn emit_command_finished(command: &str, result: &CommandResult, duration_ms: u64) {
    match result {
        CommandResult::Success { .. } => {
            info!(event = "command.finished", command = %command, duration_ms, outcome = "success");
        }
        CommandResult::Failed { exit_code, .. } => {
            info!(
                event = "command.finished",
                command = %command,
                duration_ms,
                outcome = "failed",
                exit_code = exit_code,
            );
        }
        CommandResult::Error { message } => {
            warn!(event = "command.error", command = %command, duration_ms, error = %message);
        }
    }
}

/// Emit event: the safety gate blocked a dependency change.
pub fn emit_gate_blocked(dependency: &str, reason: &str) {
    info!(event = "gate.blocked", dependency = %dependency, reason = %reason);
}

/// Emit event: the run reached a terminal outcome.
pub fn emit_run_finished(outcome: &str) {
    info!(event = "run.finished", outcome = %outcome);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        let _span = PipelineSpan::enter("ash");
        emit_stage_started("verify");
        emit_command_finished(
            "mix test",
            &CommandResult::Failed {
                exit_code: 1,
                output: String::new(),
            },
            42,
        );
        emit_gate_blocked("ash", "security concern detected in dependency change");
        emit_run_finished("blocked");
    }
}
