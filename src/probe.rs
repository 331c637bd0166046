// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Capability probing.
//!
//! Read-only checks for what the host already has. A probe never installs,
//! writes, or otherwise changes anything. When the tooling a probe relies on
//! is itself unavailable, the answer degrades to [`Detection::Absent`]
//! instead of failing the run.

use crate::{
    config::Detect,
    host::{quote, CommandRunner, HostError, Invocation},
};

use std::path::PathBuf;
use tracing::{debug, instrument};

/// Result of probing for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Present,
    Absent,
}

impl Detection {
    pub fn is_present(self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Probe host for capabilities through a command runner.
#[derive(Debug)]
pub struct Prober<'run, R>
where
    R: CommandRunner,
{
    runner: &'run R,
}

impl<'run, R> Prober<'run, R>
where
    R: CommandRunner,
{
    /// Construct new prober.
    pub fn new(runner: &'run R) -> Self {
        Self { runner }
    }

    /// Detect if capability described by predicate is present.
    #[instrument(skip(self), level = "debug")]
    pub fn detect(&self, predicate: &Detect) -> Detection {
        let present = match predicate {
            Detect::Command(name) => self.locate(name).is_some(),
            Detect::Path(path) => path.exists(),
        };

        if present {
            Detection::Present
        } else {
            Detection::Absent
        }
    }

    /// Resolve absolute path of executable through `PATH`.
    ///
    /// Uses the POSIX `command -v` builtin, so no extra tooling like `which`
    /// needs to be installed.
    #[instrument(skip(self), level = "debug")]
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let probe = Invocation::shell(format!("command -v {}", quote(name)));
        match self.runner.run(&probe) {
            // INVARIANT: Only accept absolute paths, `command -v` reports aliases and builtins too.
            Ok(output) => output
                .lines()
                .next()
                .map(PathBuf::from)
                .filter(|path| path.is_absolute()),
            Err(HostError::Failed { .. }) => None,
            Err(error @ HostError::Spawn { .. }) => {
                debug!("cannot probe for {name:?}, assuming absent: {error}");
                None
            }
        }
    }
}
