//! Domain models for depgate.
//!
//! Canonical definitions for the core entities:
//! - `Assessment`: normalized risk evaluation of one version change
//! - `Halt` / `StageResult`: short-circuiting stage outcomes
//! - `WorkflowOutcome`: terminal result of one orchestrator run
//! - the error taxonomy (`ExecError`, `ValidationError`, `DepgateError`)

pub mod assessment;
pub mod error;
pub mod outcome;

pub use assessment::{Assessment, AssessmentFields, Compatibility, DependencyKind, RiskStatus};
pub use error::{DepgateError, ExecError, Result, ValidationError};
pub use outcome::{Halt, StageResult, WorkflowOutcome};
