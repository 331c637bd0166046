// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default path to oh-my-zsh installation directory.
///
/// Uses `$ZSH` when set, because that is where the oh-my-zsh installer puts
/// the framework. Otherwise falls back to `~/.oh-my-zsh`.
pub fn default_framework_dir(home: &Path) -> PathBuf {
    std::env::var_os("ZSH")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join(".oh-my-zsh"))
}

/// Determine default plugin root directory.
///
/// This is the oh-my-zsh "custom" directory. Plugins are cloned into its
/// `plugins` subdirectory.
pub fn default_plugin_root(home: &Path) -> PathBuf {
    default_framework_dir(home).join("custom")
}

/// Determine default path to zsh configuration file.
///
/// Zsh reads `.zshrc` from `$ZDOTDIR` when set, and from the home directory
/// otherwise. Does not check if the path returned actually exists.
pub fn default_rc_file(home: &Path) -> PathBuf {
    std::env::var_os("ZDOTDIR")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home.to_path_buf())
        .join(".zshrc")
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
