//! Normalized risk assessments of dependency version changes.

use serde::{Deserialize, Serialize};

/// Whether a change was requested directly or pulled in transitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Direct,
    Transitive,
}

/// Security / breaking-change verdict for one dimension of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    None,
    Concern,
    Unknown,
}

/// Compatibility verdict for the consuming project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    Compatible,
    Incompatible,
    Unknown,
}

/// The schema-validated body of an assessment, exactly as replied by the
/// evaluator after normalization. Only [`crate::assess::normalize`]
/// constructs this; a partially validated payload never reaches the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentFields {
    pub safe: bool,
    pub security_status: RiskStatus,
    pub security_concerns: Vec<String>,
    pub breaking_status: RiskStatus,
    pub breaking_changes: Vec<String>,
    pub compatibility: Compatibility,
    pub security_change_summary: String,
    pub security_notes: String,
    pub compatibility_change_summary: String,
    pub compatibility_notes: String,
    pub change_summary: String,
    pub notes: String,
}

/// One normalized evaluation of a dependency version change, with the
/// provenance the pipeline attaches. Never mutated after construction
/// (except the one-shot compatibility merge for direct changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub dependency: String,
    pub from_version: String,
    pub to_version: String,
    pub kind: DependencyKind,

    #[serde(flatten)]
    pub fields: AssessmentFields,
}

impl Assessment {
    pub fn new(
        dependency: impl Into<String>,
        from_version: impl Into<String>,
        to_version: impl Into<String>,
        kind: DependencyKind,
        fields: AssessmentFields,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            from_version: from_version.into(),
            to_version: to_version.into(),
            kind,
            fields,
        }
    }

    /// Overlay the compatibility-facing fields from a workspace-profile
    /// evaluation onto this (sandbox-profile) assessment. Security fields
    /// always come from the sandboxed evaluation of the untrusted diff.
    pub fn merge_compatibility(&mut self, other: AssessmentFields) {
        self.fields.breaking_status = other.breaking_status;
        self.fields.breaking_changes = other.breaking_changes;
        self.fields.compatibility = other.compatibility;
        self.fields.compatibility_change_summary = other.compatibility_change_summary;
        self.fields.compatibility_notes = other.compatibility_notes;
        if !other.safe {
            self.fields.safe = false;
        }
    }

    /// Every textual field of the assessment, named, for scanning.
    /// Array fields contribute one entry per element.
    pub fn text_fields(&self) -> Vec<(String, &str)> {
        let f = &self.fields;
        let mut out: Vec<(String, &str)> = vec![
            ("security_change_summary".to_string(), &f.security_change_summary),
            ("security_notes".to_string(), &f.security_notes),
            ("compatibility_change_summary".to_string(), &f.compatibility_change_summary),
            ("compatibility_notes".to_string(), &f.compatibility_notes),
            ("change_summary".to_string(), &f.change_summary),
            ("notes".to_string(), &f.notes),
        ];
        for (i, item) in f.security_concerns.iter().enumerate() {
            out.push((format!("security_concerns[{i}]"), item));
        }
        for (i, item) in f.breaking_changes.iter().enumerate() {
            out.push((format!("breaking_changes[{i}]"), item));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn safe_fields() -> AssessmentFields {
        AssessmentFields {
            safe: true,
            security_status: RiskStatus::None,
            security_concerns: vec![],
            breaking_status: RiskStatus::None,
            breaking_changes: vec![],
            compatibility: Compatibility::Compatible,
            security_change_summary: String::new(),
            security_notes: String::new(),
            compatibility_change_summary: String::new(),
            compatibility_notes: String::new(),
            change_summary: "Patch release".to_string(),
            notes: String::new(),
        }
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&RiskStatus::Concern).expect("serialize"),
            "\"concern\""
        );
        assert_eq!(
            serde_json::to_string(&Compatibility::Incompatible).expect("serialize"),
            "\"incompatible\""
        );
    }

    #[test]
    fn test_merge_compatibility_keeps_security_fields() {
        let mut a = Assessment::new("ash", "3.14.0", "3.15.0", DependencyKind::Direct, {
            let mut f = safe_fields();
            f.security_status = RiskStatus::Concern;
            f.security_concerns = vec!["uses eval".to_string()];
            f
        });

        let mut compat = safe_fields();
        compat.compatibility = Compatibility::Incompatible;
        compat.compatibility_notes = "callback arity changed".to_string();
        a.merge_compatibility(compat);

        assert_eq!(a.fields.security_status, RiskStatus::Concern);
        assert_eq!(a.fields.security_concerns.len(), 1);
        assert_eq!(a.fields.compatibility, Compatibility::Incompatible);
        assert_eq!(a.fields.compatibility_notes, "callback arity changed");
    }

    #[test]
    fn test_merge_compatibility_propagates_unsafe() {
        let mut a = Assessment::new(
            "ash",
            "3.14.0",
            "3.15.0",
            DependencyKind::Direct,
            safe_fields(),
        );
        let mut compat = safe_fields();
        compat.safe = false;
        a.merge_compatibility(compat);
        assert!(!a.fields.safe);
    }

    #[test]
    fn test_text_fields_include_array_elements() {
        let mut fields = safe_fields();
        fields.breaking_changes = vec!["removed Foo.bar/2".to_string()];
        let a = Assessment::new("ash", "1.0.0", "2.0.0", DependencyKind::Transitive, fields);

        let names: Vec<String> = a.text_fields().into_iter().map(|(n, _)| n).collect();
        assert!(names.contains(&"change_summary".to_string()));
        assert!(names.contains(&"breaking_changes[0]".to_string()));
    }

    #[test]
    fn test_assessment_serde_roundtrip() {
        let a = Assessment::new(
            "phoenix",
            "1.8.2",
            "1.8.3",
            DependencyKind::Direct,
            safe_fields(),
        );
        let json = serde_json::to_string(&a).expect("serialize");
        let back: Assessment = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(a, back);
    }
}
