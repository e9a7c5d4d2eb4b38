//! Markdown rendering of run reports.
//!
//! The same accumulated [`RunReport`] backs both surfaces: the pull
//! request body for a completed run and the issue body (or dry-run
//! printout) for a blocked one.

use chrono::Utc;
use serde_json::Value;

use crate::domain::{Assessment, Compatibility, RiskStatus};
use crate::lockfile::LockDelta;

/// Everything the pipeline accumulated about one run, for reporting.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub dependency: String,
    pub from_version: String,
    pub to_version: String,
    pub assessments: Vec<Assessment>,
    pub deltas: Vec<LockDelta>,
    pub remediation: Option<String>,
}

impl RunReport {
    pub fn title(&self) -> String {
        format!(
            "Update {} from {} to {}",
            self.dependency, self.from_version, self.to_version
        )
    }

    /// Body for the pull request of a completed run.
    pub fn pr_body(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Automated dependency update of `{}` from {} to {}.\n\n",
            self.dependency, self.from_version, self.to_version
        ));

        if !self.deltas.is_empty() {
            out.push_str("## Lockfile changes\n\n");
            out.push_str("| Dependency | From | To |\n|---|---|---|\n");
            for delta in &self.deltas {
                out.push_str(&format!(
                    "| {} | {} | {} |\n",
                    delta.dep, delta.from, delta.to
                ));
            }
            out.push('\n');
        }

        out.push_str("## Assessments\n\n");
        for assessment in &self.assessments {
            push_assessment(&mut out, assessment);
        }

        if let Some(summary) = &self.remediation {
            out.push_str("## Remediation\n\n");
            out.push_str("Verification initially failed; the following fix was applied and the checks re-run:\n\n");
            out.push_str(summary);
            out.push_str("\n\n");
        }

        out.push_str(&footer());
        out
    }

    /// Body for the issue (or dry-run printout) of a blocked run.
    pub fn blocked_body(&self, reason: &str, context: &Value) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "The automated update of `{}` from {} to {} was blocked.\n\n",
            self.dependency, self.from_version, self.to_version
        ));
        out.push_str(&format!("**Reason:** {reason}\n\n"));

        if !context.is_null() {
            out.push_str("## Context\n\n```json\n");
            out.push_str(&serde_json::to_string_pretty(context).unwrap_or_default());
            out.push_str("\n```\n\n");
        }

        if !self.assessments.is_empty() {
            out.push_str("## Assessments\n\n");
            for assessment in &self.assessments {
                push_assessment(&mut out, assessment);
            }
        }

        out.push_str("No changes were committed or pushed.\n\n");
        out.push_str(&footer());
        out
    }
}

fn push_assessment(out: &mut String, assessment: &Assessment) {
    let fields = &assessment.fields;
    out.push_str(&format!(
        "### {} {} -> {} ({:?})\n\n",
        assessment.dependency, assessment.from_version, assessment.to_version, assessment.kind
    ));
    out.push_str(&format!(
        "- safe: {}\n- security: {}\n- breaking: {}\n- compatibility: {}\n",
        fields.safe,
        risk_label(fields.security_status),
        risk_label(fields.breaking_status),
        compatibility_label(fields.compatibility),
    ));
    out.push_str(&format!("\n{}\n\n", fields.change_summary));

    if !fields.security_concerns.is_empty() {
        out.push_str("Security concerns:\n\n");
        for concern in &fields.security_concerns {
            out.push_str(&format!("- {concern}\n"));
        }
        out.push('\n');
    }
    if !fields.breaking_changes.is_empty() {
        out.push_str("Breaking changes:\n\n");
        for change in &fields.breaking_changes {
            out.push_str(&format!("- {change}\n"));
        }
        out.push('\n');
    }
}

fn risk_label(status: RiskStatus) -> &'static str {
    match status {
        RiskStatus::None => "none",
        RiskStatus::Concern => "concern",
        RiskStatus::Unknown => "unknown",
    }
}

fn compatibility_label(compatibility: Compatibility) -> &'static str {
    match compatibility {
        Compatibility::Compatible => "compatible",
        Compatibility::Incompatible => "incompatible",
        Compatibility::Unknown => "unknown",
    }
}

fn footer() -> String {
    format!(
        "---\nGenerated by depgate at {}.\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
