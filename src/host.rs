// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Every side effect zshup has on the host outside of plain file edits goes
//! through a [`CommandRunner`]: package installs, install scripts, shell
//! registration, and the shell switch itself. Keeping this behind a trait
//! lets the bootstrap logic run against a scripted host in tests.

use std::{
    borrow::Cow,
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    process::Command,
};

/// A single external command to run.
///
/// Displays as the command line a user would type to run it by hand, which
/// is what gets reported back as a remedy when the command fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    /// Construct new invocation of target program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Invocation of shell command string through `sh -c`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    /// Wrap invocation with `sudo` when `escalate` is set.
    pub fn escalate_if(self, escalate: bool) -> Self {
        if !escalate {
            return self;
        }

        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.program)?;
        for arg in &self.args {
            write!(fmt, " {}", quote(arg))?;
        }

        Ok(())
    }
}

/// Quote word for POSIX shell, leaving plain words alone.
pub fn quote(word: &str) -> Cow<'_, str> {
    let special = |c: char| c.is_whitespace() || "'\"$&|;<>()`\\*?[]{}~#!".contains(c);
    if word.is_empty() || word.contains(special) {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    } else {
        Cow::Borrowed(word)
    }
}

/// Layer of indirection for running external commands.
pub trait CommandRunner {
    /// Run command to completion, capturing its output.
    ///
    /// Returns standard output with trailing newlines chomped.
    fn run(&self, invocation: &Invocation) -> Result<String>;

    /// Run command to completion with inherited standard streams.
    ///
    /// Needed for anything that may prompt the user, e.g., `sudo` or `chsh`.
    fn run_interactive(&self, invocation: &Invocation) -> Result<()>;
}

/// Run commands directly on the host through [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<String> {
        syscall_non_interactive(invocation.program(), invocation.arguments())
    }

    fn run_interactive(&self, invocation: &Invocation) -> Result<()> {
        syscall_interactive(invocation.program(), invocation.arguments())
    }
}

fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let status = Command::new(cmd.as_ref())
        .args(args)
        .spawn()
        .map_err(|source| HostError::Spawn {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            source,
        })?
        .wait()
        .map_err(|source| HostError::Spawn {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            source,
        })?;

    if !status.success() {
        return Err(HostError::Failed {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            message: status.to_string(),
        });
    }

    Ok(())
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref())
        .args(args)
        .output()
        .map_err(|source| HostError::Spawn {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            source,
        })?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

    if !output.status.success() {
        let mut message = output.status.to_string();
        if !stderr.is_empty() {
            message.push_str(format!("\nstderr: {}", chomp(&stderr)).as_str());
        }

        return Err(HostError::Failed {
            program: cmd.as_ref().to_string_lossy().into_owned(),
            message,
        });
    }

    Ok(chomp(&stdout).to_string())
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: &str) -> &str {
    message.trim_end_matches(['\r', '\n'])
}

/// Command execution error types.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Command could not be started at all, e.g., the program is missing.
    #[error("failed to run {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command ran, but exited unsuccessfully.
    #[error("command {program:?} failed: {message}")]
    Failed { program: String, message: String },
}

/// Friendly result alias :3
pub type Result<T, E = HostError> = std::result::Result<T, E>;
