//! depgate-core: risk-gated automated dependency updates.
//!
//! The crate drives one workflow end to end: enumerate outdated
//! dependencies of a project checkout, fetch the published source diff
//! of a candidate update, have an AI evaluator assess it in a sandbox,
//! gate on the normalized assessment, apply the update, assess every
//! transitive version change, verify the project, and open a pull
//! request. Blocked runs produce a structured report instead.
//!
//! Layering:
//! - [`exec`] — the command engine every external tool runs through
//! - [`assess`] / [`gate`] — normalization and policy over evaluator output
//! - [`adapters`] — thin wrappers for mix, git, gh and the evaluator
//! - [`pipeline`] — the orchestrator tying the stages together

pub mod adapters;
pub mod assess;
pub mod config;
pub mod domain;
pub mod exec;
pub mod gate;
pub mod lockfile;
pub mod obs;
pub mod pipeline;
pub mod telemetry;

pub use config::PipelineOptions;
pub use domain::{Assessment, DepgateError, Halt, Result, StageResult, WorkflowOutcome};
pub use pipeline::Pipeline;

/// Crate version, for CLI reporting.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
