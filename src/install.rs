// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Idempotent capability installation.
//!
//! The [`Installer`] makes sure a [`Capability`] is present on the host. It
//! never runs an install directive for something that is already there, so
//! running it over and over is always safe.
//!
//! # Mandatory and Optional Capabilities
//!
//! How an install failure is treated depends on one thing only: whether the
//! capability is mandatory. A failed mandatory install halts the whole run as
//! [`InstallError::MandatoryInstallFailed`]. A failed optional install is
//! just a [`Outcome::NonFatalFailure`] that shows up in the final summary.

pub mod manager;

use crate::{
    config::{Capability, InstallDirective},
    context::Context,
    host::{CommandRunner, Invocation},
    install::manager::PackageManager,
    probe::Prober,
    report::Outcome,
};

use std::cell::Cell;
use tracing::{info, instrument, warn};

/// Install capabilities through the host's package manager.
///
/// The package manager is probed once at construction, and that selection
/// sticks for the rest of the run.
#[derive(Debug)]
pub struct Installer<'run, R>
where
    R: CommandRunner,
{
    runner: &'run R,
    prober: Prober<'run, R>,
    manager: Option<PackageManager>,
    privileged: bool,
    refreshed: Cell<bool>,
}

impl<'run, R> Installer<'run, R>
where
    R: CommandRunner,
{
    /// Construct new installer, selecting package manager of host.
    pub fn new(runner: &'run R, context: &Context) -> Self {
        let prober = Prober::new(runner);
        let manager = PackageManager::detect(&prober);
        match manager {
            Some(manager) => info!("using package manager {manager}"),
            None => warn!("no supported package manager found"),
        }

        Self {
            runner,
            prober,
            manager,
            privileged: context.privileged,
            refreshed: Cell::new(false),
        }
    }

    /// Package manager selected for this run.
    pub fn manager(&self) -> Option<PackageManager> {
        self.manager
    }

    /// Make sure capability is present on host.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::MandatoryInstallFailed`] if capability is
    ///   mandatory and could not be installed.
    #[instrument(skip(self, capability), fields(capability = %capability.name), level = "debug")]
    pub fn ensure(&self, capability: &Capability) -> Result<Outcome> {
        if self.prober.detect(&capability.detect).is_present() {
            return Ok(Outcome::AlreadyPresent);
        }

        info!("install {}", capability.name);
        let failure = match self.directive(&capability.install) {
            Ok(invocation) => match self.runner.run_interactive(&invocation) {
                Ok(()) => return Ok(Outcome::Installed),
                Err(error) => (error.to_string(), invocation.to_string()),
            },
            Err(NoPackageManager) => (
                "no supported package manager found".to_string(),
                format!(
                    "install package {:?} with your system's package manager",
                    package_name(&capability.install)
                ),
            ),
        };

        let (reason, remedy) = failure;
        if capability.mandatory {
            return Err(InstallError::MandatoryInstallFailed {
                name: capability.name.clone(),
                reason,
                remedy,
            });
        }

        Ok(Outcome::failed_with_remedy(reason, remedy))
    }

    fn directive(&self, directive: &InstallDirective) -> Result<Invocation, NoPackageManager> {
        match directive {
            InstallDirective::Script(script) => Ok(Invocation::shell(script.clone())),
            InstallDirective::Package(package) => {
                let manager = self.manager.ok_or(NoPackageManager)?;
                self.refresh_once(manager);
                Ok(manager.install(package, self.privileged))
            }
        }
    }

    fn refresh_once(&self, manager: PackageManager) {
        if self.refreshed.replace(true) {
            return;
        }

        if let Some(refresh) = manager.refresh(self.privileged) {
            info!("refresh package index: {refresh}");
            if let Err(error) = self.runner.run_interactive(&refresh) {
                warn!("package index refresh failed, installing anyway: {error}");
            }
        }
    }
}

fn package_name(directive: &InstallDirective) -> &str {
    match directive {
        InstallDirective::Package(package) => package,
        InstallDirective::Script(script) => script,
    }
}

struct NoPackageManager;

/// Capability installation error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Mandatory capability could not be installed.
    #[error("cannot install mandatory {name:?}: {reason}\ninstall it by hand with: {remedy}")]
    MandatoryInstallFailed {
        name: String,
        reason: String,
        remedy: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = InstallError> = std::result::Result<T, E>;
