// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Idempotent zsh environment bootstrap.
//!
//! Zshup takes a host from whatever state it is in to a working zsh setup:
//! shell and framework installed, plugins cloned, configuration file patched,
//! and zsh as the default login shell. Every step checks before it acts, so
//! running zshup on an already provisioned host changes nothing.
//!
//! The [`bootstrap::Bootstrap`] orchestrator drives the components in order:
//!
//! 1. [`install::Installer`] ensures capabilities through [`probe::Prober`].
//! 2. [`plugin::PluginFetcher`] clones plugins.
//! 3. [`patch::ConfigPatcher`] applies configuration edits.
//! 4. [`shell::ShellSwitcher`] switches the default login shell.
//!
//! What gets installed, fetched, and patched is declared in a
//! [`config::Manifest`].

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod host;
pub mod install;
pub mod patch;
pub mod path;
pub mod plugin;
pub mod probe;
pub mod report;
pub mod shell;
