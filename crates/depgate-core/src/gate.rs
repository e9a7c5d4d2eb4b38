//! Safety gate over normalized dependency assessments.
//!
//! Scans assessments in discovery order and reports the first unsafe one.
//! First-unsafe-wins is deliberate: blocking behavior stays deterministic
//! and reproducible across runs with the same lock deltas.

use serde::{Deserialize, Serialize};

use crate::domain::assessment::{Assessment, Compatibility, RiskStatus};

/// Gate policy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Block only on the safety flag and security verdicts.
    SecurityOnly,

    /// Additionally block on breaking-change and compatibility verdicts.
    Strict,
}

impl GateMode {
    /// Mode-dependent block reason text.
    pub fn block_reason(self) -> &'static str {
        match self {
            GateMode::Strict => "unsafe or incompatible dependency change",
            GateMode::SecurityOnly => "security concern detected in dependency change",
        }
    }
}

/// Gate evaluation verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateVerdict {
    Pass,

    /// The first unsafe assessment in sequence order.
    Blocked {
        reason: String,
        assessment: Assessment,
    },
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, GateVerdict::Pass)
    }
}

/// Whether one assessment is unsafe under the given mode.
pub fn is_unsafe(assessment: &Assessment, mode: GateMode) -> bool {
    let fields = &assessment.fields;
    if !fields.safe {
        return true;
    }
    if matches!(
        fields.security_status,
        RiskStatus::Concern | RiskStatus::Unknown
    ) {
        return true;
    }
    if mode == GateMode::Strict {
        if matches!(
            fields.breaking_status,
            RiskStatus::Concern | RiskStatus::Unknown
        ) {
            return true;
        }
        if matches!(
            fields.compatibility,
            Compatibility::Incompatible | Compatibility::Unknown
        ) {
            return true;
        }
    }
    false
}

/// Scan assessments in order and block on the first unsafe one.
pub fn ensure_safe(assessments: &[Assessment], mode: GateMode) -> GateVerdict {
    for assessment in assessments {
        if is_unsafe(assessment, mode) {
            return GateVerdict::Blocked {
                reason: mode.block_reason().to_string(),
                assessment: assessment.clone(),
            };
        }
    }
    GateVerdict::Pass
}
