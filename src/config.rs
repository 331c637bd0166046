// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the bootstrap manifest to simplify the process of
//! serialization and deserialization. File I/O is left to the caller to figure
//! out.
//!
//! # General Layout
//!
//! A manifest declares everything a bootstrap run should make true on the
//! host:
//!
//! - `[shell]`: which shell becomes the user's default login shell.
//! - `[[capability]]`: tools and packages that must be installed.
//! - `[[plugin]]`: plugin repositories to clone into the plugin root.
//! - `[[edit]]`: changes to apply to the shell's configuration file.
//!
//! Zshup ships with a [`DEFAULT_MANIFEST`] that installs zsh, oh-my-zsh, and
//! a couple of popular plugins. Users can replace it entirely with their own
//! manifest file.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Name of framework capability in [`DEFAULT_MANIFEST`].
pub const FRAMEWORK_CAPABILITY: &str = "oh-my-zsh";

/// Manifest used when the user does not supply one.
pub const DEFAULT_MANIFEST: &str = r#"
[shell]
name = "zsh"

[[capability]]
name = "zsh"
detect = { command = "zsh" }
install = { package = "zsh" }
mandatory = true

[[capability]]
name = "git"
detect = { command = "git" }
install = { package = "git" }

[[capability]]
name = "curl"
detect = { command = "curl" }
install = { package = "curl" }

[[capability]]
name = "oh-my-zsh"
detect = { path = "~/.oh-my-zsh/oh-my-zsh.sh" }
install = { script = 'curl -fsSL https://raw.githubusercontent.com/ohmyzsh/ohmyzsh/master/tools/install.sh | sh -s -- --unattended --keep-zshrc' }
mandatory = true

[[plugin]]
name = "zsh-autosuggestions"
url = "https://github.com/zsh-users/zsh-autosuggestions.git"

[[plugin]]
name = "zsh-syntax-highlighting"
url = "https://github.com/zsh-users/zsh-syntax-highlighting.git"

[[edit]]
name = "plugins"
kind = "list-entries"
key = "plugins"
entries = ["git", "zsh-autosuggestions", "zsh-syntax-highlighting"]
before = '^\s*source\s+.*oh-my-zsh\.sh'

[[edit]]
name = "history"
kind = "append-block"
block = """
HISTSIZE=10000
SAVEHIST=10000
setopt SHARE_HISTORY
"""
"#;

/// Bootstrap manifest layout.
///
/// Declared once at startup. Nothing in a manifest is mutated during a run.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Shell to install and switch to.
    pub shell: ShellSettings,

    /// Tools and packages to make sure of.
    #[serde(rename = "capability", default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,

    /// Plugin repositories to fetch.
    #[serde(rename = "plugin", default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginSpec>,

    /// Configuration file edits to apply.
    #[serde(rename = "edit", default, skip_serializing_if = "Vec::is_empty")]
    pub edits: Vec<ConfigEdit>,
}

impl Manifest {
    /// Parse built-in [`DEFAULT_MANIFEST`].
    ///
    /// The framework is looked for inside `framework_dir`, so an oh-my-zsh
    /// installed under a custom `$ZSH` counts as present.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if home directory cannot be
    ///   expanded.
    pub fn builtin(framework_dir: &Path) -> Result<Self> {
        let mut manifest: Self = DEFAULT_MANIFEST.parse()?;
        for capability in &mut manifest.capabilities {
            if capability.name == FRAMEWORK_CAPABILITY {
                capability.detect = Detect::Path(framework_dir.join("oh-my-zsh.sh"));
            }
        }

        Ok(manifest)
    }
}

impl FromStr for Manifest {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: Manifest = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on all path fields.
        for capability in &mut manifest.capabilities {
            if let Detect::Path(path) = &mut capability.detect {
                *path = expand_path(path)?;
            }
        }
        for plugin in &mut manifest.plugins {
            if let Some(destination) = &mut plugin.destination {
                *destination = expand_path(destination)?;
            }
        }

        // INVARIANT: Reject edit patterns that do not compile as regular expressions.
        for edit in &manifest.edits {
            for pattern in edit.patterns() {
                regex::Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    edit: edit.name().into(),
                    source,
                })?;
            }
        }

        Ok(manifest)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Target shell settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ShellSettings {
    /// Executable name of shell, resolved through `PATH`.
    pub name: String,

    /// Make shell the user's default login shell.
    #[serde(default = "default_true")]
    pub switch: bool,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            name: "zsh".into(),
            switch: true,
        }
    }
}

/// Named external tool or package.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Capability {
    /// Name of capability used for reporting.
    pub name: String,

    /// How to check if capability is already present.
    pub detect: Detect,

    /// How to install capability when absent.
    pub install: InstallDirective,

    /// Failure to install halts the whole run.
    #[serde(default)]
    pub mandatory: bool,
}

/// Detection predicate of capability.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Detect {
    /// Executable resolvable through `PATH`.
    Command(String),

    /// File or directory exists.
    Path(PathBuf),
}

/// Install directive of capability.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallDirective {
    /// Install package through host's package manager.
    Package(String),

    /// Run shell command through `sh -c`.
    Script(String),
}

/// Plugin repository to fetch.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PluginSpec {
    /// Name of plugin, also the default directory name.
    pub name: String,

    /// Source location to clone from.
    pub url: String,

    /// Where to clone plugin to.
    ///
    /// Relative paths are resolved against the plugin root. Defaults to
    /// `plugins/<name>` under the plugin root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl PluginSpec {
    /// Resolve absolute destination of plugin relative to plugin root.
    pub fn destination_in(&self, plugin_root: &Path) -> PathBuf {
        match &self.destination {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => plugin_root.join(path),
            None => plugin_root.join("plugins").join(&self.name),
        }
    }
}

/// Named configuration file change.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigEdit {
    /// Replace first line matching `pattern` with `line`.
    ReplaceLine {
        name: String,
        pattern: String,
        line: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<String>,
    },

    /// Append `block` unless its literal content is already present.
    AppendBlock { name: String, block: String },

    /// Make list assignment `key=(...)` contain every name in `entries`.
    ListEntries {
        name: String,
        key: String,
        entries: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before: Option<String>,
    },
}

impl ConfigEdit {
    pub fn name(&self) -> &str {
        match self {
            Self::ReplaceLine { name, .. }
            | Self::AppendBlock { name, .. }
            | Self::ListEntries { name, .. } => name,
        }
    }

    fn patterns(&self) -> Vec<&str> {
        match self {
            Self::ReplaceLine {
                pattern, before, ..
            } => std::iter::once(pattern.as_str())
                .chain(before.as_deref())
                .collect(),
            Self::ListEntries { before, .. } => before.as_deref().into_iter().collect(),
            Self::AppendBlock { .. } => Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Edit carries pattern that is not a valid regular expression.
    #[error("edit {edit:?} has invalid pattern")]
    Pattern {
        edit: String,
        #[source]
        source: regex::Error,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
