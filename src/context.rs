// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run context.
//!
//! Everything a bootstrap run needs to know about its environment is gathered
//! once, up front, into a [`Context`]. Components receive the context at
//! construction time instead of reading environment variables on their own.

use crate::path::{default_plugin_root, default_rc_file, home_dir, NoWayHome};

use chrono::Local;
use std::path::PathBuf;

/// Registry of allowed login shells on most unix systems.
pub const DEFAULT_SHELL_REGISTRY: &str = "/etc/shells";

/// Explicit environment of a single bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// User's home directory.
    pub home: PathBuf,

    /// Name of user running the bootstrap.
    pub user: String,

    /// Directory plugins get cloned under.
    pub plugin_root: PathBuf,

    /// Shell configuration file to patch.
    pub rc_file: PathBuf,

    /// Registry of allowed login shells.
    pub shell_registry: PathBuf,

    /// Login shell according to the environment, i.e., `$SHELL`.
    pub login_shell: Option<PathBuf>,

    /// Run already has root privileges, so `sudo` is never needed.
    pub privileged: bool,

    /// Timestamp of run used to name backups.
    pub stamp: String,
}

impl Context {
    /// Construct context from current process environment.
    ///
    /// Explicit overrides take precedence over environment defaults.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory cannot be determined.
    pub fn from_env(overrides: Overrides) -> Result<Self, NoWayHome> {
        let home = home_dir()?;
        let user = whoami::username();
        let plugin_root = overrides
            .plugin_root
            .unwrap_or_else(|| default_plugin_root(&home));
        let rc_file = overrides
            .rc_file
            .unwrap_or_else(|| default_rc_file(&home));
        let login_shell = std::env::var_os("SHELL")
            .filter(|shell| !shell.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            privileged: user == "root",
            user,
            plugin_root,
            rc_file,
            shell_registry: PathBuf::from(DEFAULT_SHELL_REGISTRY),
            login_shell,
            stamp: Local::now().format("%Y%m%d-%H%M%S").to_string(),
            home,
        })
    }
}

/// Values that replace environment defaults of a [`Context`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub plugin_root: Option<PathBuf>,
    pub rc_file: Option<PathBuf>,
}
