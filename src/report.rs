// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Step outcomes and run report.
//!
//! Every step of a bootstrap run produces an [`Outcome`]. The [`RunReport`]
//! collects them in the order the steps ran, and summarizes the run at the
//! end: what changed, what was already in place, and what needs the user's
//! attention.

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{info, warn};

/// Outcome of a single bootstrap step.
///
/// A fatal failure is never an outcome. It halts the run as an error instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Capability was installed, or plugin was fetched.
    Installed,

    /// Configuration was patched, or default shell was switched.
    Changed,

    /// Nothing to do.
    AlreadyPresent,

    /// Step failed, but the run can go on without it.
    NonFatalFailure {
        reason: String,
        remedy: Option<String>,
    },
}

impl Outcome {
    /// Construct non-fatal failure without a remedy.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::NonFatalFailure {
            reason: reason.into(),
            remedy: None,
        }
    }

    /// Construct non-fatal failure with a manual remedy for the user.
    pub fn failed_with_remedy(reason: impl Into<String>, remedy: impl Into<String>) -> Self {
        Self::NonFatalFailure {
            reason: reason.into(),
            remedy: Some(remedy.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NonFatalFailure { .. })
    }
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Installed => fmt.write_str("installed"),
            Self::Changed => fmt.write_str("changed"),
            Self::AlreadyPresent => fmt.write_str("already present"),
            Self::NonFatalFailure {
                reason,
                remedy: None,
            } => write!(fmt, "failed: {reason}"),
            Self::NonFatalFailure {
                reason,
                remedy: Some(remedy),
            } => write!(fmt, "failed: {reason}\n  fix it by hand with: {remedy}"),
        }
    }
}

/// Ordered record of step outcomes of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    steps: Vec<(String, Outcome)>,
}

impl RunReport {
    /// Construct new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record outcome of step.
    ///
    /// Failures get logged as warnings the moment they are recorded.
    pub fn record(&mut self, step: impl Into<String>, outcome: Outcome) {
        let step = step.into();
        if outcome.is_failure() {
            warn!("{step}: {outcome}");
        } else {
            info!("{step}: {outcome}");
        }
        self.steps.push((step, outcome));
    }

    /// Outcome of target step, if it ran.
    pub fn outcome(&self, step: &str) -> Option<&Outcome> {
        self.steps
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, outcome)| outcome)
    }

    /// All steps in the order they ran.
    pub fn steps(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.steps
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Steps that failed without halting the run.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.steps().filter(|(_, outcome)| outcome.is_failure())
    }

    /// Run made no changes to the host at all.
    pub fn is_noop(&self) -> bool {
        self.steps
            .iter()
            .all(|(_, outcome)| *outcome == Outcome::AlreadyPresent)
    }

    /// Log final summary of run.
    pub fn summarize(&self) {
        let changed = self
            .steps
            .iter()
            .filter(|(_, outcome)| matches!(outcome, Outcome::Installed | Outcome::Changed))
            .count();
        let warnings = self.warnings().collect::<Vec<_>>();

        info!(
            "bootstrap finished: {changed} changed, {} already present, {} warnings",
            self.steps.len() - changed - warnings.len(),
            warnings.len()
        );
        for (step, outcome) in warnings {
            warn!("{step}: {outcome}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_and_query_steps() {
        let mut report = RunReport::new();
        report.record("zsh", Outcome::AlreadyPresent);
        report.record("fzf", Outcome::failed_with_remedy("exit status: 100", "sudo apt-get install -y fzf"));
        report.record("edit plugins", Outcome::Changed);

        assert_eq!(report.outcome("zsh"), Some(&Outcome::AlreadyPresent));
        assert_eq!(report.outcome("fish"), None);
        assert_eq!(
            report.warnings().map(|(step, _)| step).collect::<Vec<_>>(),
            vec!["fzf"]
        );
        assert!(!report.is_noop());
    }

    #[test]
    fn display_failure_with_remedy() {
        let outcome = Outcome::failed_with_remedy("permission denied", "chsh -s /usr/bin/zsh");
        assert_eq!(
            outcome.to_string(),
            "failed: permission denied\n  fix it by hand with: chsh -s /usr/bin/zsh"
        );
    }
}
