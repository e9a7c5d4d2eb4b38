//! Thin adapter over `mix` / Hex for dependency operations.
//!
//! Everything here is textual plumbing around external commands: the
//! outdated table, package diffs, lock snapshots, and the verification
//! check commands. Interpretation stays minimal by design.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::domain::Result;
use crate::exec::{execute, CommandSpec};
use crate::lockfile::{self, LockSnapshot};

/// One row of the `mix hex.outdated` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedRow {
    pub dep: String,
    pub current: String,
    pub latest: String,
    pub status: String,
}

impl OutdatedRow {
    /// Whether hex reports this row as updatable within the project's
    /// version requirements.
    pub fn update_eligible(&self) -> bool {
        self.status.starts_with("Update possible")
    }
}

/// Enumerate outdated dependencies.
///
/// `mix hex.outdated` exits 1 when updates exist, so both 0 and 1 are
/// allowed exit codes.
pub async fn outdated(dir: &Path) -> Result<Vec<OutdatedRow>> {
    let spec = CommandSpec::new("mix", ["hex.outdated"])
        .cwd(dir)
        .allowed_exit_codes(vec![0, 1]);
    let display = spec.display();
    let output = execute(spec).await.require_success(&display)?;
    Ok(parse_outdated_table(&output))
}

/// Parse the tabular `mix hex.outdated` output into rows.
///
/// Columns: Dependency, Current, Latest, Status (status may contain
/// spaces). Header, rule and footer lines are skipped.
pub fn parse_outdated_table(text: &str) -> Vec<OutdatedRow> {
    strip_ansi(text)
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let dep = parts.next()?;
            let current = parts.next()?;
            let latest = parts.next()?;
            let status: Vec<&str> = parts.collect();
            if dep == "Dependency" || !looks_like_version(current) {
                return None;
            }
            Some(OutdatedRow {
                dep: dep.to_string(),
                current: current.to_string(),
                latest: latest.to_string(),
                status: status.join(" "),
            })
        })
        .collect()
}

fn looks_like_version(token: &str) -> bool {
    token
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
}

fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let ansi = ANSI.get_or_init(|| {
        Regex::new("\x1b\\[[0-9;]*[A-Za-z]").expect("ansi escape pattern is a valid regex")
    });
    ansi.replace_all(text, "").into_owned()
}

/// Update one dependency to the latest version the requirements allow.
pub async fn update(dir: &Path, dep: &str) -> Result<String> {
    let spec = CommandSpec::new("mix", ["deps.update", dep])
        .cwd(dir)
        .timeout(Duration::from_secs(600));
    let display = spec.display();
    execute(spec).await.require_success(&display)
}

/// Fetch the published package diff between two versions.
///
/// Like `git diff`, exit code 1 signals "differences found".
pub async fn fetch_diff(dir: &Path, dep: &str, from: &str, to: &str) -> Result<String> {
    let range = format!("{from}..{to}");
    let spec = CommandSpec::new("mix", ["hex.package", "diff", dep, &range])
        .cwd(dir)
        .allowed_exit_codes(vec![0, 1])
        .timeout(Duration::from_secs(600));
    let display = spec.display();
    execute(spec).await.require_success(&display)
}

/// Scratch path for one persisted diff, one file per
/// `(dependency, from, to)`.
pub fn diff_path(scratch_dir: &Path, dep: &str, from: &str, to: &str) -> PathBuf {
    scratch_dir.join(format!("{dep}-{from}-{to}.md"))
}

/// Persist a fetched diff for the evaluator and the remediation stage.
pub fn persist_diff(
    scratch_dir: &Path,
    dep: &str,
    from: &str,
    to: &str,
    diff: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;
    let path = diff_path(scratch_dir, dep, from, to);
    std::fs::write(&path, diff)?;
    Ok(path)
}

/// Snapshot the resolved dependency versions from `mix.lock`.
pub fn lock_snapshot(dir: &Path) -> Result<LockSnapshot> {
    let content = std::fs::read_to_string(dir.join("mix.lock"))?;
    Ok(lockfile::parse_mix_lock(&content))
}

/// One verification check the pipeline runs after applying an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCheck {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl VerificationCheck {
    pub fn new<I, S>(name: impl Into<String>, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn command_spec(&self, dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program, self.args.clone())
            .cwd(dir)
            .timeout(Duration::from_secs(900))
    }
}

/// The full ordered verification suite: dependency compile, project
/// compile with warnings treated as failures, test suite.
pub fn verification_checks() -> Vec<VerificationCheck> {
    vec![
        VerificationCheck::new("deps.compile", "mix", ["deps.compile"]),
        VerificationCheck::new("compile", "mix", ["compile", "--warnings-as-errors"]),
        VerificationCheck::new("test", "mix", ["test"]),
    ]
}

/// The subset re-run after a remediation attempt: compile and test.
pub fn remediation_checks() -> Vec<VerificationCheck> {
    vec![
        VerificationCheck::new("compile", "mix", ["compile", "--warnings-as-errors"]),
        VerificationCheck::new("test", "mix", ["test"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
Dependency  Current  Latest  Status
ash         3.14.0   3.15.0  Update possible
phoenix     1.8.2    1.8.2   Up-to-date
telemetry   0.4.3    1.3.0   Update not possible

Run `mix hex.outdated APP` to see requirements for a specific dependency.
";

    #[test]
    fn test_parse_outdated_table_rows() {
        let rows = parse_outdated_table(TABLE);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].dep, "ash");
        assert_eq!(rows[0].current, "3.14.0");
        assert_eq!(rows[0].latest, "3.15.0");
        assert_eq!(rows[0].status, "Update possible");
        assert_eq!(rows[2].status, "Update not possible");
    }

    #[test]
    fn test_update_eligibility() {
        let rows = parse_outdated_table(TABLE);
        assert!(rows[0].update_eligible());
        assert!(!rows[1].update_eligible());
        assert!(!rows[2].update_eligible());
    }

    #[test]
    fn test_parse_strips_ansi_colors() {
        let colored = "ash         \x1b[31m3.14.0\x1b[0m   3.15.0  Update possible\n";
        let rows = parse_outdated_table(colored);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].current, "3.14.0");
    }

    #[test]
    fn test_diff_path_is_per_version_pair() {
        let scratch = Path::new("/tmp/scratch");
        assert_eq!(
            diff_path(scratch, "ash", "3.14.0", "3.15.0"),
            PathBuf::from("/tmp/scratch/ash-3.14.0-3.15.0.md")
        );
    }

    #[test]
    fn test_persist_and_read_back_diff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = persist_diff(dir.path(), "ash", "3.14.0", "3.15.0", "--- a\n+++ b\n")
            .expect("persist");
        let content = std::fs::read_to_string(path).expect("read back");
        assert!(content.contains("+++ b"));
    }

    #[test]
    fn test_lock_snapshot_reads_mix_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("mix.lock"),
            "%{\n  \"ash\": {:hex, :ash, \"3.14.0\", \"cafe\", [:mix], [], \"hexpm\", \"beef\"},\n}\n",
        )
        .expect("write lock");
        let snapshot = lock_snapshot(dir.path()).expect("snapshot");
        assert_eq!(snapshot.get("ash").map(String::as_str), Some("3.14.0"));
    }

    #[test]
    fn test_verification_suite_order() {
        let names: Vec<String> = verification_checks()
            .into_iter()
            .map(|check| check.name)
            .collect();
        assert_eq!(names, vec!["deps.compile", "compile", "test"]);
    }

    #[test]
    fn test_remediation_reruns_compile_and_test_only() {
        let names: Vec<String> = remediation_checks()
            .into_iter()
            .map(|check| check.name)
            .collect();
        assert_eq!(names, vec!["compile", "test"]);
    }
}
