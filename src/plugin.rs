// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Plugin fetching.
//!
//! Plugins are plain Git repositories cloned into the plugin root. Zshup never
//! touches a plugin directory that already exists. Users tend to hack on
//! their plugins locally, and a bootstrap run must not clobber that work.
//!
//! # Retrieval
//!
//! The act of getting a repository onto disk is hidden behind [`Retrieval`].
//! The default [`Git2Retrieval`] clones through libgit2 while drawing a
//! progress bar. If the remote wants credentials, the user will be prompted
//! for them, and the progress bar will be suspended for the prompt.

use crate::{config::PluginSpec, report::Outcome};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::{Path, PathBuf},
    time,
};
use tracing::{info, instrument, warn};

/// Layer of indirection for plugin retrieval.
pub trait Retrieval {
    /// Retrieve repository at `url` into `destination`.
    fn retrieve(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Fetch plugins into plugin root.
#[derive(Debug)]
pub struct PluginFetcher<'run, F>
where
    F: Retrieval,
{
    retrieval: &'run F,
    plugin_root: PathBuf,
}

impl<'run, F> PluginFetcher<'run, F>
where
    F: Retrieval,
{
    /// Construct new plugin fetcher.
    pub fn new(retrieval: &'run F, plugin_root: impl Into<PathBuf>) -> Self {
        Self {
            retrieval,
            plugin_root: plugin_root.into(),
        }
    }

    /// Fetch plugin unless its destination already exists.
    ///
    /// Never fails the run. Any failure to fetch is reported as a
    /// [`Outcome::NonFatalFailure`].
    #[instrument(skip(self, plugin), fields(plugin = %plugin.name), level = "debug")]
    pub fn fetch(&self, plugin: &PluginSpec) -> Outcome {
        let destination = plugin.destination_in(&self.plugin_root);
        if destination.exists() {
            return Outcome::AlreadyPresent;
        }

        let remedy = format!("git clone {} {}", plugin.url, destination.display());
        if let Some(parent) = destination.parent() {
            if let Err(error) = mkdirp::mkdirp(parent) {
                return Outcome::failed_with_remedy(
                    FetchError::CreateParent {
                        source: error,
                        path: parent.to_path_buf(),
                    }
                    .to_string(),
                    remedy,
                );
            }
        }

        info!("fetch {} into {}", plugin.url, destination.display());
        match self.retrieval.retrieve(&plugin.url, &destination) {
            Ok(()) => Outcome::Installed,
            Err(error) => {
                // INVARIANT: Never leave partial clone behind, or the next run thinks it is present.
                if destination.exists() {
                    if let Err(cleanup) = std::fs::remove_dir_all(&destination) {
                        warn!(
                            "cannot clean up partial clone at {}: {cleanup}",
                            destination.display()
                        );
                    }
                }

                Outcome::failed_with_remedy(error.to_string(), remedy)
            }
        }
    }
}

/// Plugin retrieval through libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Retrieval;

impl Retrieval for Git2Retrieval {
    /// Clone plugin repository.
    ///
    /// The progress of the clone is displayed through a progress bar that
    /// gets cleared once the clone finishes.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Git2`] if libgit2 operations fail.
    /// - Return [`FetchError::IndicatifStyleTemplate`] if progress bar style
    ///   is invalid.
    fn retrieve(&self, url: &str, destination: &Path) -> Result<()> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(url.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar);
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            let bar_size = stats.total_objects() as u64;
            let bar_pos = stats.received_objects() as u64;
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(bar_size);
                prompter.bar.set_position(bar_pos);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let result = RepoBuilder::new().fetch_options(fo).clone(url, destination);
        prompter.bar.finish_and_clear();
        result?;

        Ok(())
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Plugin fetching error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Parent directory of plugin destination cannot be created.
    #[error("failed to create parent directory {:?}", path.display())]
    CreateParent {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;
