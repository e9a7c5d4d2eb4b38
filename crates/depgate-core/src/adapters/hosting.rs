//! Thin adapter over the `gh` CLI for pull requests and issues.

use std::path::Path;

use crate::domain::{DepgateError, Result};
use crate::exec::{execute, CommandSpec};

/// Open a pull request and return its URL.
pub async fn create_pull_request(
    dir: &Path,
    title: &str,
    body: &str,
    base: &str,
    head: &str,
) -> Result<String> {
    let spec = CommandSpec::new(
        "gh",
        [
            "pr", "create", "--title", title, "--body", body, "--base", base, "--head", head,
        ],
    )
    .cwd(dir);
    let display = spec.display();
    let output = execute(spec).await.require_success(&display)?;
    extract_url(&output, "pull request")
}

/// File an issue and return its URL.
pub async fn create_issue(dir: &Path, title: &str, body: &str) -> Result<String> {
    let spec = CommandSpec::new("gh", ["issue", "create", "--title", title, "--body", body])
        .cwd(dir);
    let display = spec.display();
    let output = execute(spec).await.require_success(&display)?;
    extract_url(&output, "issue")
}

/// `gh` prints the created resource URL on its own line; take the last
/// such line to skip any preamble.
fn extract_url(output: &str, what: &str) -> Result<String> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("https://"))
        .map(str::to_string)
        .ok_or_else(|| DepgateError::Parse {
            what: format!("{what} URL"),
            detail: format!("no https:// line in output: {output:?}"),
        })
}
