//! Pipeline configuration, resolved once at start.
//!
//! All knobs are explicit values threaded through the run — no ambient
//! globals, including for verbosity.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::exec::{NullSink, ProgressSink, StderrSink};
use crate::gate::GateMode;

/// Default evaluator model identifier, overridable per run.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4-20250514";

/// Wall-clock budget for one assistant invocation. Evaluations read a
/// whole diff and can legitimately run for a while.
pub const AGENT_TIMEOUT: Duration = Duration::from_secs(600);

/// Immutable configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Repository checkout the pipeline mutates in place.
    pub workdir: PathBuf,

    /// Explicit target dependency. Mutually exclusive with `random`.
    pub dependency: Option<String>,

    /// Pick a random update-eligible candidate instead.
    pub random: bool,

    /// Base branch the update branch is created from and the PR targets.
    pub base_branch: String,

    /// Evaluator model identifier.
    pub model: String,

    /// Strict gate mode: also block on breaking/compatibility verdicts.
    pub strict: bool,

    /// Stop before any commit/branch/PR side effect.
    pub dry_run: bool,

    /// Stream rendered command output to stderr.
    pub verbose: bool,

    /// Skip the clean-worktree precondition.
    pub allow_dirty: bool,

    /// Injection-simulation fixture: a diff file to assess in isolation.
    pub injection_fixture: Option<PathBuf>,

    /// Marker string to scan the simulated assessment for.
    pub injection_marker: Option<String>,
}

impl PipelineOptions {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            dependency: None,
            random: false,
            base_branch: "main".to_string(),
            model: DEFAULT_MODEL.to_string(),
            strict: false,
            dry_run: false,
            verbose: false,
            allow_dirty: false,
            injection_fixture: None,
            injection_marker: None,
        }
    }

    pub fn gate_mode(&self) -> GateMode {
        if self.strict {
            GateMode::Strict
        } else {
            GateMode::SecurityOnly
        }
    }

    /// Progress sink matching the verbosity setting.
    pub fn progress_sink(&self) -> Arc<dyn ProgressSink> {
        if self.verbose {
            Arc::new(StderrSink)
        } else {
            Arc::new(NullSink)
        }
    }

    /// Scratch directory for persisted diff files.
    pub fn scratch_dir(&self) -> PathBuf {
        self.workdir.join(".depgate").join("diffs")
    }
}
