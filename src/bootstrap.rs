// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap orchestration.
//!
//! A bootstrap run walks through its steps strictly in order:
//!
//! 1. Make sure every capability is installed.
//! 2. Fetch every plugin.
//! 3. Apply every configuration edit.
//! 4. Switch the default login shell.
//!
//! No step ever calls back into an earlier one. Every step is idempotent, so
//! an interrupted run is fixed by simply running again.
//!
//! # Failure Policy
//!
//! Only two things halt a run: a mandatory capability that cannot be
//! installed, and a configuration file that does not exist at all. Anything
//! else is recorded in the [`RunReport`] and the run carries on.

use crate::{
    config::Manifest,
    context::Context,
    host::CommandRunner,
    install::{InstallError, Installer},
    patch::{ConfigPatcher, PatchError},
    plugin::{PluginFetcher, Retrieval},
    probe::Prober,
    report::{Outcome, RunReport},
    shell::ShellSwitcher,
};

use tracing::{info, instrument};

/// Bootstrap orchestrator.
///
/// Collaborators are injected, so the whole run can be driven against a
/// scripted host.
#[derive(Debug)]
pub struct Bootstrap<'run, R, F>
where
    R: CommandRunner,
    F: Retrieval,
{
    context: &'run Context,
    manifest: &'run Manifest,
    runner: &'run R,
    retrieval: &'run F,
}

impl<'run, R, F> Bootstrap<'run, R, F>
where
    R: CommandRunner,
    F: Retrieval,
{
    /// Construct new bootstrap orchestrator.
    pub fn new(
        context: &'run Context,
        manifest: &'run Manifest,
        runner: &'run R,
        retrieval: &'run F,
    ) -> Self {
        Self {
            context,
            manifest,
            runner,
            retrieval,
        }
    }

    /// Run bootstrap from start to finish.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::Install`] if a mandatory capability cannot
    ///   be installed. Nothing after the failed capability runs.
    /// - Return [`BootstrapError::Patch`] if configuration file cannot be
    ///   found.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new();

        let installer = Installer::new(self.runner, self.context);
        for capability in &self.manifest.capabilities {
            let outcome = installer.ensure(capability)?;
            report.record(&capability.name, outcome);
        }

        let fetcher = PluginFetcher::new(self.retrieval, &self.context.plugin_root);
        for plugin in &self.manifest.plugins {
            report.record(format!("plugin {}", plugin.name), fetcher.fetch(plugin));
        }

        if !self.manifest.edits.is_empty() {
            let mut patcher = ConfigPatcher::open(&self.context.rc_file, &self.context.stamp)?;
            for edit in &self.manifest.edits {
                let outcome = patcher
                    .apply_edit(edit)
                    .unwrap_or_else(|error| Outcome::failed(error_chain(&error)));
                report.record(format!("edit {}", edit.name()), outcome);
            }
        }

        if self.manifest.shell.switch {
            let outcome = self.switch_shell();
            report.record(format!("default shell {}", self.manifest.shell.name), outcome);
        }

        Ok(report)
    }

    fn switch_shell(&self) -> Outcome {
        let prober = Prober::new(self.runner);
        let Some(shell) = prober.locate(&self.manifest.shell.name) else {
            return Outcome::failed(format!(
                "cannot find {:?} on PATH",
                self.manifest.shell.name
            ));
        };

        info!("resolved {} to {}", self.manifest.shell.name, shell.display());
        ShellSwitcher::new(self.runner, self.context).set_default_shell(&shell)
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }

    message
}

/// Fatal bootstrap error types.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Mandatory capability could not be installed.
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Configuration file could not be opened for patching.
    #[error(transparent)]
    Patch(#[from] PatchError),
}

/// Friendly result alias :3
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Capability, ConfigEdit, Detect, InstallDirective, PluginSpec, ShellSettings},
        host::fake::ScriptedRunner,
        plugin::FetchError,
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, path::Path};

    #[derive(Debug, Default)]
    struct FakeRetrieval {
        calls: RefCell<Vec<String>>,
    }

    impl Retrieval for FakeRetrieval {
        fn retrieve(&self, url: &str, destination: &Path) -> crate::plugin::Result<()> {
            self.calls.borrow_mut().push(url.into());
            std::fs::create_dir(destination).map_err(|source| FetchError::CreateParent {
                source,
                path: destination.to_path_buf(),
            })
        }
    }

    fn context(root: &Path) -> Context {
        Context {
            home: root.into(),
            user: "blah".into(),
            plugin_root: root.join(".oh-my-zsh/custom"),
            rc_file: root.join(".zshrc"),
            shell_registry: root.join("shells"),
            login_shell: Some("/bin/bash".into()),
            privileged: false,
            stamp: "20250101-000000".into(),
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            shell: ShellSettings {
                name: "zsh".into(),
                switch: true,
            },
            capabilities: vec![
                Capability {
                    name: "zsh".into(),
                    detect: Detect::Command("zsh".into()),
                    install: InstallDirective::Package("zsh".into()),
                    mandatory: true,
                },
                Capability {
                    name: "fzf".into(),
                    detect: Detect::Command("fzf".into()),
                    install: InstallDirective::Package("fzf".into()),
                    mandatory: false,
                },
            ],
            plugins: vec![PluginSpec {
                name: "zsh-autosuggestions".into(),
                url: "https://github.com/zsh-users/zsh-autosuggestions.git".into(),
                destination: None,
            }],
            edits: vec![ConfigEdit::ListEntries {
                name: "plugins".into(),
                key: "plugins".into(),
                entries: vec!["git".into(), "zsh-autosuggestions".into()],
                before: None,
            }],
        }
    }

    #[sealed_test]
    fn mandatory_failure_halts_before_fetch_and_edits() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        std::fs::write(root.join(".zshrc"), "plugins=(git)\n")?;
        let context = context(&root);
        let manifest = manifest();
        let runner = ScriptedRunner::new()
            .with_executable("apt-get", "/usr/bin/apt-get")
            .fail("sudo apt-get install -y zsh");
        let retrieval = FakeRetrieval::default();

        let result = Bootstrap::new(&context, &manifest, &runner, &retrieval).run();

        assert!(matches!(result, Err(BootstrapError::Install(_))));
        assert!(retrieval.calls.borrow().is_empty());
        assert_eq!(std::fs::read_to_string(root.join(".zshrc"))?, "plugins=(git)\n");
        assert!(!runner.calls().iter().any(|call| call.contains("fzf")));

        Ok(())
    }

    #[sealed_test]
    fn optional_failures_degrade() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        std::fs::write(root.join(".zshrc"), "plugins=(git)\n")?;
        std::fs::write(root.join("shells"), "/usr/bin/zsh\n")?;
        let context = context(&root);
        let manifest = manifest();
        let runner = ScriptedRunner::new()
            .with_executable("apt-get", "/usr/bin/apt-get")
            .with_executable("zsh", "/usr/bin/zsh")
            .fail("sudo apt-get install -y fzf")
            .fail("chsh -s /usr/bin/zsh");
        let retrieval = FakeRetrieval::default();

        let report = Bootstrap::new(&context, &manifest, &runner, &retrieval).run()?;

        assert_eq!(report.outcome("zsh"), Some(&Outcome::AlreadyPresent));
        assert!(report.outcome("fzf").is_some_and(Outcome::is_failure));
        assert_eq!(report.outcome("plugin zsh-autosuggestions"), Some(&Outcome::Installed));
        assert_eq!(report.outcome("edit plugins"), Some(&Outcome::Changed));
        assert!(report.outcome("default shell zsh").is_some_and(Outcome::is_failure));
        assert_eq!(
            report.warnings().map(|(step, _)| step).collect::<Vec<_>>(),
            vec!["fzf", "default shell zsh"]
        );

        Ok(())
    }

    #[sealed_test]
    fn missing_config_is_fatal() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        let context = context(&root);
        let manifest = manifest();
        let runner = ScriptedRunner::new()
            .with_executable("zsh", "/usr/bin/zsh")
            .with_executable("fzf", "/usr/bin/fzf");
        let retrieval = FakeRetrieval::default();

        let result = Bootstrap::new(&context, &manifest, &runner, &retrieval).run();

        assert!(matches!(
            result,
            Err(BootstrapError::Patch(PatchError::ConfigNotFound { .. }))
        ));

        Ok(())
    }

    #[sealed_test]
    fn second_run_changes_nothing() -> anyhow::Result<()> {
        let root = std::env::current_dir()?;
        std::fs::write(root.join(".zshrc"), "plugins=(git)\n")?;
        std::fs::write(root.join("shells"), "/usr/bin/zsh\n")?;
        let context = context(&root);
        let manifest = manifest();
        let retrieval = FakeRetrieval::default();

        let first = ScriptedRunner::new()
            .with_executable("zsh", "/usr/bin/zsh")
            .with_executable("fzf", "/usr/bin/fzf");
        Bootstrap::new(&context, &manifest, &first, &retrieval).run()?;
        let after_first = std::fs::read_to_string(root.join(".zshrc"))?;

        let second = ScriptedRunner::new()
            .with_executable("zsh", "/usr/bin/zsh")
            .with_executable("fzf", "/usr/bin/fzf")
            .reply("getent passwd blah", "blah:x:1000:1000::/home/blah:/usr/bin/zsh");
        let report = Bootstrap::new(&context, &manifest, &second, &retrieval).run()?;

        assert!(report.is_noop());
        assert_eq!(std::fs::read_to_string(root.join(".zshrc"))?, after_first);
        assert_eq!(after_first, "plugins=(git zsh-autosuggestions)\n");
        assert_eq!(retrieval.calls.borrow().len(), 1);
        assert!(!second.calls().iter().any(|call| call.starts_with("sudo") || call.starts_with("chsh")));

        Ok(())
    }
}
