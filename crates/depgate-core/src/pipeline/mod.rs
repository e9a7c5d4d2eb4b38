//! The risk-gated update pipeline.
//!
//! One run drives the whole workflow: pick a target, assess its
//! published diff, gate, apply the update, assess every transitive
//! version change the lockfile picked up, gate again, verify the
//! project, and publish a pull request. Any stage can halt the chain
//! with a policy block or an infrastructure fault; blocked runs produce
//! a structured report (an issue, or a printout in dry-run).

pub mod injection;
pub mod report;

use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::warn;

use crate::adapters::mix::{OutdatedRow, VerificationCheck};
use crate::adapters::{agent, git, hosting, mix};
use crate::config::PipelineOptions;
use crate::domain::{DependencyKind, Halt, StageResult, WorkflowOutcome};
use crate::exec::{execute, CommandResult};
use crate::gate::{ensure_safe, GateVerdict};
use crate::lockfile::compute_delta;
use crate::obs;
use report::RunReport;

pub struct Pipeline {
    opts: PipelineOptions,
}

impl Pipeline {
    pub fn new(opts: PipelineOptions) -> Self {
        Self { opts }
    }

    /// Run the pipeline to a terminal outcome. Never returns an error;
    /// every failure mode is folded into the outcome.
    pub async fn run(&self) -> WorkflowOutcome {
        let label = self.opts.dependency.as_deref().unwrap_or("select");
        let _span = obs::PipelineSpan::enter(label);

        let mut report = RunReport::default();
        match self.execute(&mut report).await {
            Ok(pr_url) => {
                obs::emit_run_finished("completed");
                WorkflowOutcome::Completed { pr_url }
            }
            Err(halt) => self.handle_halt(halt, &report).await,
        }
    }

    /// The stage chain. `Ok(Some(url))` is a published PR, `Ok(None)` a
    /// successful dry-run.
    async fn execute(&self, report: &mut RunReport) -> StageResult<Option<String>> {
        let opts = &self.opts;
        let dir = &opts.workdir;

        obs::emit_stage_started("preflight");
        if !opts.allow_dirty && !git::worktree_clean(dir).await? {
            return Err(Halt::error(
                "worktree has uncommitted changes (use --allow-dirty to override)",
            ));
        }
        let lock_before = mix::lock_snapshot(dir)?;

        obs::emit_stage_started("select");
        let rows = mix::outdated(dir).await?;
        let target = select_target(&rows, opts)?.clone();
        report.dependency = target.dep.clone();
        report.from_version = target.current.clone();
        report.to_version = target.latest.clone();

        obs::emit_stage_started("assess");
        let scratch = opts.scratch_dir();
        let diff = mix::fetch_diff(dir, &target.dep, &target.current, &target.latest).await?;
        let diff_path =
            mix::persist_diff(&scratch, &target.dep, &target.current, &target.latest, &diff)?;
        let mut assessment = agent::evaluate_security(
            &diff_path,
            &target.dep,
            &target.current,
            &target.latest,
            DependencyKind::Direct,
            opts,
        )
        .await?;
        if opts.strict {
            let compat = agent::evaluate_compatibility(
                &target.dep,
                &target.current,
                &target.latest,
                &diff_path,
                opts,
            )
            .await?;
            assessment.merge_compatibility(compat);
        }
        report.assessments.push(assessment);
        self.gate(report)?;

        obs::emit_stage_started("update");
        let branch = branch_name(&target.dep, &target.latest);
        if !opts.dry_run {
            git::create_branch(dir, &branch, &opts.base_branch).await?;
        }
        mix::update(dir, &target.dep).await?;

        let lock_after = mix::lock_snapshot(dir)?;
        let mut deltas = compute_delta(&lock_before, &lock_after);
        deltas.retain(|delta| delta.dep != target.dep);
        report.deltas = deltas.clone();

        // Each transitive change is assessed and gated before the next
        // one is fetched, so an unsafe one stops further evaluator work.
        for delta in &deltas {
            let diff = mix::fetch_diff(dir, &delta.dep, &delta.from, &delta.to).await?;
            let diff_path =
                mix::persist_diff(&scratch, &delta.dep, &delta.from, &delta.to, &diff)?;
            let assessment = agent::evaluate_security(
                &diff_path,
                &delta.dep,
                &delta.from,
                &delta.to,
                DependencyKind::Transitive,
                opts,
            )
            .await?;
            report.assessments.push(assessment);
            self.gate(report)?;
        }

        obs::emit_stage_started("verify");
        self.run_verification(report, &diff_path, mix::verification_checks())
            .await?;

        if opts.dry_run {
            return Ok(None);
        }

        obs::emit_stage_started("publish");
        git::commit_all(dir, &report.title()).await?;
        git::push_branch(dir, &branch).await?;
        let url = hosting::create_pull_request(
            dir,
            &report.title(),
            &report.pr_body(),
            &opts.base_branch,
            &branch,
        )
        .await?;
        Ok(Some(url))
    }

    fn gate(&self, report: &RunReport) -> StageResult<()> {
        match ensure_safe(&report.assessments, self.opts.gate_mode()) {
            GateVerdict::Pass => Ok(()),
            GateVerdict::Blocked { reason, assessment } => {
                obs::emit_gate_blocked(&assessment.dependency, &reason);
                let context = serde_json::to_value(&assessment).unwrap_or(Value::Null);
                Err(Halt::blocked_with(reason, context))
            }
        }
    }

    /// Run the verification suite; on failure, attempt remediation once
    /// and re-run the compile and test checks. Dry-runs never remediate.
    ///
    /// Takes the checks as a parameter so callers (and tests) control
    /// what "verification" means.
    pub async fn run_verification(
        &self,
        report: &mut RunReport,
        diff_path: &std::path::Path,
        checks: Vec<VerificationCheck>,
    ) -> StageResult<()> {
        let Some((check, output)) = self.first_failure(&checks).await? else {
            return Ok(());
        };

        if self.opts.dry_run {
            return Err(Halt::blocked_with(
                format!("verification failed: {}", check.name),
                json!({ "check": check.name, "output": output }),
            ));
        }

        let summary = match agent::remediate(&check.name, &output, diff_path, &self.opts).await {
            Ok(summary) => summary,
            Err(err) => {
                return Err(Halt::blocked_with(
                    format!("verification failed and remediation could not run: {err}"),
                    json!({ "check": check.name, "output": output }),
                ));
            }
        };

        if let Some((check, output)) = self.first_failure(&mix::remediation_checks()).await? {
            return Err(Halt::blocked_with(
                format!("verification still failing after remediation: {}", check.name),
                json!({ "check": check.name, "output": output, "remediation": summary }),
            ));
        }
        report.remediation = Some(summary);
        Ok(())
    }

    /// Run checks in order; the first non-passing one stops the suite.
    async fn first_failure(
        &self,
        checks: &[VerificationCheck],
    ) -> StageResult<Option<(VerificationCheck, String)>> {
        for check in checks {
            let spec = check
                .command_spec(&self.opts.workdir)
                .sink(self.opts.progress_sink());
            match execute(spec).await {
                CommandResult::Success { .. } => continue,
                CommandResult::Failed { output, .. } => {
                    return Ok(Some((check.clone(), output)));
                }
                CommandResult::Error { message } => {
                    return Err(Halt::error(format!(
                        "verification check {} could not run: {message}",
                        check.name
                    )));
                }
            }
        }
        Ok(None)
    }

    /// Terminal handling for a halted run. A block produces a report
    /// surface; a fault just propagates.
    async fn handle_halt(&self, halt: Halt, report: &RunReport) -> WorkflowOutcome {
        match &halt {
            Halt::Blocked { reason, context } => {
                obs::emit_run_finished("blocked");
                let body = report.blocked_body(reason, context);
                if self.opts.dry_run {
                    println!("{body}");
                } else {
                    let title = if report.dependency.is_empty() {
                        "Blocked dependency update".to_string()
                    } else {
                        format!(
                            "Blocked dependency update: {} {} -> {}",
                            report.dependency, report.from_version, report.to_version
                        )
                    };
                    if let Err(err) =
                        hosting::create_issue(&self.opts.workdir, &title, &body).await
                    {
                        warn!(event = "issue.failed", error = %err);
                    }
                }
                halt.into()
            }
            Halt::Error { .. } => {
                obs::emit_run_finished("error");
                halt.into()
            }
        }
    }
}

/// Branch name for one update.
pub fn branch_name(dep: &str, to: &str) -> String {
    format!("dep-update/{dep}-{to}")
}

/// Choose the update target: the named dependency if one was given,
/// otherwise the first (or a random) update-eligible row.
pub fn select_target<'a>(
    rows: &'a [OutdatedRow],
    opts: &PipelineOptions,
) -> StageResult<&'a OutdatedRow> {
    if let Some(name) = &opts.dependency {
        let row = rows
            .iter()
            .find(|row| row.dep == *name)
            .ok_or_else(|| Halt::blocked(format!("dependency {name} is not outdated")))?;
        if !row.update_eligible() {
            return Err(Halt::blocked(format!(
                "dependency {name} cannot be updated: {}",
                row.status
            )));
        }
        return Ok(row);
    }

    let eligible: Vec<&OutdatedRow> = rows.iter().filter(|row| row.update_eligible()).collect();
    if eligible.is_empty() {
        return Err(Halt::blocked("no update-eligible dependencies found"));
    }
    if opts.random {
        Ok(eligible
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(eligible[0]))
    } else {
        Ok(eligible[0])
    }
}
