// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Default login shell switching.
//!
//! Most systems refuse to make a shell the default login shell unless it is
//! listed in the registry of allowed login shells, `/etc/shells`. Package
//! managers usually register the shells they install, but not always, e.g.,
//! Homebrew never does. So switching goes through these states:
//!
//! ```text
//! Unregistered -> Registering -> Registered -> Switched
//! ```
//!
//! A shell that is already registered starts out at `Registered`. Failure at
//! any point never fails the run. Instead the user is told the exact commands
//! to run by hand.

use crate::{
    context::Context,
    host::{CommandRunner, Invocation},
    report::Outcome,
};

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// State of target shell during switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Unregistered,
    Registering,
    Registered,
    Switched,
}

/// Switch user's default login shell.
#[derive(Debug)]
pub struct ShellSwitcher<'run, R>
where
    R: CommandRunner,
{
    runner: &'run R,
    registry: PathBuf,
    user: String,
    login_shell: Option<PathBuf>,
    privileged: bool,
}

impl<'run, R> ShellSwitcher<'run, R>
where
    R: CommandRunner,
{
    /// Construct new shell switcher.
    pub fn new(runner: &'run R, context: &Context) -> Self {
        Self {
            runner,
            registry: context.shell_registry.clone(),
            user: context.user.clone(),
            login_shell: context.login_shell.clone(),
            privileged: context.privileged,
        }
    }

    /// Make `shell` the user's default login shell.
    #[instrument(skip(self), level = "debug")]
    pub fn set_default_shell(&self, shell: &Path) -> Outcome {
        if self.current_shell().as_deref() == Some(shell) {
            return Outcome::AlreadyPresent;
        }

        let switch = Invocation::new("chsh")
            .arg("-s")
            .arg(shell.to_string_lossy());
        let mut state = if self.is_registered(shell) {
            ShellState::Registered
        } else {
            ShellState::Unregistered
        };

        loop {
            debug!("shell {} is {state:?}", shell.display());
            state = match state {
                ShellState::Unregistered => ShellState::Registering,
                ShellState::Registering => {
                    let register = self.register_invocation(shell);
                    info!("register {} in {}", shell.display(), self.registry.display());
                    if let Err(error) = self.runner.run_interactive(&register) {
                        return Outcome::failed_with_remedy(
                            format!("cannot register shell: {error}"),
                            format!("{register} && {switch}"),
                        );
                    }
                    ShellState::Registered
                }
                ShellState::Registered => {
                    info!("switch default shell to {}", shell.display());
                    if let Err(error) = self.runner.run_interactive(&switch) {
                        return Outcome::failed_with_remedy(
                            format!("cannot switch shell: {error}"),
                            switch.to_string(),
                        );
                    }
                    ShellState::Switched
                }
                ShellState::Switched => return Outcome::Changed,
            };
        }
    }

    /// Determine user's current login shell.
    ///
    /// Asks the account database first, because `$SHELL` only changes after
    /// logging in again. That is `getent` on most systems, and directory
    /// services on macOS, which has no `getent`.
    pub fn current_shell(&self) -> Option<PathBuf> {
        self.passwd_shell()
            .or_else(|| self.directory_service_shell())
            .or_else(|| self.login_shell.clone())
    }

    fn passwd_shell(&self) -> Option<PathBuf> {
        let lookup = Invocation::new("getent").arg("passwd").arg(&self.user);
        let entry = self.runner.run(&lookup).ok()?;
        entry
            .lines()
            .next()
            .and_then(|line| line.split(':').nth(6))
            .filter(|shell| !shell.is_empty())
            .map(PathBuf::from)
    }

    fn directory_service_shell(&self) -> Option<PathBuf> {
        let lookup = Invocation::new("dscl")
            .arg(".")
            .arg("-read")
            .arg(format!("/Users/{}", self.user))
            .arg("UserShell");
        let record = self.runner.run(&lookup).ok()?;
        record
            .lines()
            .find_map(|line| line.strip_prefix("UserShell:"))
            .map(str::trim)
            .filter(|shell| !shell.is_empty())
            .map(PathBuf::from)
    }

    /// Shell is listed in registry of allowed login shells.
    ///
    /// Unreadable registry counts as not listing the shell.
    pub fn is_registered(&self, shell: &Path) -> bool {
        read_to_string(&self.registry)
            .map(|content| {
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.starts_with('#'))
                    .any(|line| Path::new(line) == shell)
            })
            .unwrap_or(false)
    }

    fn register_invocation(&self, shell: &Path) -> Invocation {
        Invocation::shell(format!(
            "echo '{}' >> '{}'",
            shell.display(),
            self.registry.display()
        ))
        .escalate_if(!self.privileged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::ScriptedRunner;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    const SHELLS: &str = indoc! {"
        # /etc/shells: valid login shells
        /bin/sh
        /bin/bash
        /usr/bin/zsh
    "};

    fn context(registry: PathBuf) -> Context {
        Context {
            home: "/home/blah".into(),
            user: "blah".into(),
            plugin_root: "/home/blah/.oh-my-zsh/custom".into(),
            rc_file: "/home/blah/.zshrc".into(),
            shell_registry: registry,
            login_shell: Some("/bin/bash".into()),
            privileged: false,
            stamp: "20250101-000000".into(),
        }
    }

    fn passwd(shell: &str) -> String {
        format!("blah:x:1000:1000:Blah:/home/blah:{shell}\n")
    }

    #[sealed_test]
    fn already_default_shell() -> anyhow::Result<()> {
        let registry = std::env::current_dir()?.join("shells");
        std::fs::write(&registry, SHELLS)?;
        let runner = ScriptedRunner::new().reply("getent passwd blah", &passwd("/usr/bin/zsh"));
        let switcher = ShellSwitcher::new(&runner, &context(registry));

        let result = switcher.set_default_shell(Path::new("/usr/bin/zsh"));

        assert_eq!(result, Outcome::AlreadyPresent);
        assert_eq!(runner.calls(), vec!["getent passwd blah"]);

        Ok(())
    }

    #[sealed_test]
    fn switch_registered_shell() -> anyhow::Result<()> {
        let registry = std::env::current_dir()?.join("shells");
        std::fs::write(&registry, SHELLS)?;
        let runner = ScriptedRunner::new().reply("getent passwd blah", &passwd("/bin/bash"));
        let switcher = ShellSwitcher::new(&runner, &context(registry));

        let result = switcher.set_default_shell(Path::new("/usr/bin/zsh"));

        assert_eq!(result, Outcome::Changed);
        assert_eq!(
            runner.calls(),
            vec!["getent passwd blah", "chsh -s /usr/bin/zsh"]
        );

        Ok(())
    }

    #[sealed_test]
    fn register_before_switch() -> anyhow::Result<()> {
        let registry = std::env::current_dir()?.join("shells");
        std::fs::write(&registry, SHELLS)?;
        let runner = ScriptedRunner::new();
        let switcher = ShellSwitcher::new(&runner, &context(registry.clone()));

        let result = switcher.set_default_shell(Path::new("/opt/homebrew/bin/zsh"));

        assert_eq!(result, Outcome::Changed);
        let calls = runner.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(
            calls[2],
            format!(
                "sudo sh -c 'echo '\\''/opt/homebrew/bin/zsh'\\'' >> '\\''{}'\\'''",
                registry.display()
            )
        );
        assert_eq!(calls[3], "chsh -s /opt/homebrew/bin/zsh");

        Ok(())
    }

    #[sealed_test]
    fn failed_registration_skips_switch() -> anyhow::Result<()> {
        let registry = std::env::current_dir()?.join("shells");
        std::fs::write(&registry, SHELLS)?;
        let register = Invocation::shell(format!(
            "echo '/opt/homebrew/bin/zsh' >> '{}'",
            registry.display()
        ))
        .escalate_if(true)
        .to_string();
        let runner = ScriptedRunner::new().fail(&register);
        let switcher = ShellSwitcher::new(&runner, &context(registry));

        let result = switcher.set_default_shell(Path::new("/opt/homebrew/bin/zsh"));

        assert!(matches!(
            result,
            Outcome::NonFatalFailure { remedy: Some(ref remedy), .. }
                if remedy.ends_with("chsh -s /opt/homebrew/bin/zsh")
        ));
        assert!(!runner.calls().iter().any(|call| call.starts_with("chsh")));

        Ok(())
    }

    #[sealed_test]
    fn failed_switch_names_manual_command() -> anyhow::Result<()> {
        let registry = std::env::current_dir()?.join("shells");
        std::fs::write(&registry, SHELLS)?;
        let runner = ScriptedRunner::new().fail("chsh -s /usr/bin/zsh");
        let switcher = ShellSwitcher::new(&runner, &context(registry));

        let result = switcher.set_default_shell(Path::new("/usr/bin/zsh"));

        assert_eq!(
            result,
            Outcome::failed_with_remedy(
                "cannot switch shell: command \"chsh\" failed: chsh -s /usr/bin/zsh exploded",
                "chsh -s /usr/bin/zsh"
            )
        );

        Ok(())
    }

    #[sealed_test]
    fn already_default_shell_without_getent() -> anyhow::Result<()> {
        let registry = std::env::current_dir()?.join("shells");
        std::fs::write(&registry, "/bin/bash\n/bin/zsh\n")?;
        let runner = ScriptedRunner::new()
            .fail("getent passwd blah")
            .reply("dscl . -read /Users/blah UserShell", "UserShell: /bin/zsh\n");
        let switcher = ShellSwitcher::new(&runner, &context(registry));

        assert_eq!(switcher.set_default_shell(Path::new("/bin/zsh")), Outcome::AlreadyPresent);
        assert_eq!(switcher.set_default_shell(Path::new("/bin/zsh")), Outcome::AlreadyPresent);
        assert!(!runner.calls().iter().any(|call| call.starts_with("chsh")));

        Ok(())
    }

    #[test]
    fn current_shell_falls_back_to_environment() {
        let runner = ScriptedRunner::new()
            .fail("getent passwd blah")
            .fail("dscl . -read /Users/blah UserShell");
        let switcher = ShellSwitcher::new(&runner, &context("/etc/shells".into()));

        assert_eq!(switcher.current_shell(), Some(PathBuf::from("/bin/bash")));
    }
}
