// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package manager dispatch.
//!
//! Zshup knows a small, closed set of package managers. Exactly one of them
//! is selected per run by probing [`PackageManager::PRIORITY`] in order, and
//! every package install goes through that selection.

use crate::{
    host::{CommandRunner, Invocation},
    probe::Prober,
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Supported package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Apk,
    Brew,
    Pkg,
}

impl PackageManager {
    /// Detection order. First manager found on the host wins.
    pub const PRIORITY: [Self; 8] = [
        Self::Apt,
        Self::Dnf,
        Self::Yum,
        Self::Pacman,
        Self::Zypper,
        Self::Apk,
        Self::Brew,
        Self::Pkg,
    ];

    /// Probe host for first available package manager.
    pub fn detect<R>(prober: &Prober<'_, R>) -> Option<Self>
    where
        R: CommandRunner,
    {
        Self::PRIORITY
            .into_iter()
            .find(|manager| prober.locate(manager.executable()).is_some())
    }

    /// Name of executable to probe for.
    pub fn executable(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
            Self::Pacman => "pacman",
            Self::Zypper => "zypper",
            Self::Apk => "apk",
            Self::Brew => "brew",
            Self::Pkg => "pkg",
        }
    }

    /// Homebrew refuses to run as root. Everything else wants it.
    pub fn needs_root(self) -> bool {
        !matches!(self, Self::Brew)
    }

    /// Non-interactive install of package.
    pub fn install(self, package: &str, privileged: bool) -> Invocation {
        let invocation = Invocation::new(self.executable());
        let invocation = match self {
            Self::Apt | Self::Dnf | Self::Yum => invocation.args(["install", "-y", package]),
            Self::Pacman => invocation.args(["-S", "--noconfirm", "--needed", package]),
            Self::Zypper => invocation.args(["--non-interactive", "install", package]),
            Self::Apk => invocation.args(["add", package]),
            Self::Brew => invocation.args(["install", package]),
            Self::Pkg => invocation.args(["install", "-y", package]),
        };

        invocation.escalate_if(self.needs_root() && !privileged)
    }

    /// Refresh of package index needed before first install, if any.
    pub fn refresh(self, privileged: bool) -> Option<Invocation> {
        let invocation = match self {
            Self::Apt => Invocation::new("apt-get").arg("update"),
            Self::Apk => Invocation::new("apk").arg("update"),
            _ => return None,
        };

        Some(invocation.escalate_if(!privileged))
    }
}

impl Display for PackageManager {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.executable())
    }
}
