//! Resolved-dependency snapshots and lock deltas.
//!
//! A [`LockSnapshot`] maps dependency name to resolved version. Comparing
//! the snapshot taken before an update against the one taken after yields
//! the [`LockDelta`] rows the pipeline assesses transitively.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Resolved dependency versions at one point in time. BTreeMap keeps
/// delta discovery order deterministic.
pub type LockSnapshot = BTreeMap<String, String>;

/// One dependency whose resolved version changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDelta {
    pub dep: String,
    pub from: String,
    pub to: String,
}

/// Dependencies present in both snapshots whose version changed, in
/// deterministic (name) order.
///
/// A delta is a version pair, so dependencies present in only one
/// snapshot (added or removed by the update) are not reported and
/// therefore not assessed transitively.
pub fn compute_delta(before: &LockSnapshot, after: &LockSnapshot) -> Vec<LockDelta> {
    before
        .iter()
        .filter_map(|(dep, old)| {
            after
                .get(dep)
                .filter(|new| *new != old)
                .map(|new| LockDelta {
                    dep: dep.clone(),
                    from: old.clone(),
                    to: new.clone(),
                })
        })
        .collect()
}

/// Scrape dependency name and resolved version out of `mix.lock`.
///
/// Entries look like:
/// `"ash": {:hex, :ash, "3.14.0", "abc...", [:mix], [...], "hexpm", ...},`
/// Unparseable lines are skipped; this is a thin adapter, not a parser
/// for the full Elixir term syntax.
pub fn parse_mix_lock(content: &str) -> LockSnapshot {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    let entry = ENTRY.get_or_init(|| {
        Regex::new(r#"(?m)^\s*"([^"]+)":\s*\{:\w+,\s*:[\w.]+,\s*"([^"]+)""#)
            .expect("lock entry pattern is a valid regex")
    });

    entry
        .captures_iter(content)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}
