// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use zshup::{
    bootstrap::Bootstrap,
    config::Manifest,
    context::{Context, Overrides},
    host::SystemRunner,
    path::default_framework_dir,
    plugin::Git2Retrieval,
};

use anyhow::{Context as _, Result};
use clap::Parser;
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bootstrap a working zsh environment, idempotently.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {
    /// Directory to clone plugins under.
    #[arg(long, env = "ZSH_CUSTOM", value_name = "path")]
    pub plugin_root: Option<PathBuf>,

    /// Manifest to use instead of the builtin one.
    #[arg(short, long, value_name = "path")]
    pub manifest: Option<PathBuf>,

    /// Shell configuration file to patch.
    #[arg(long, value_name = "path")]
    pub rc_file: Option<PathBuf>,

    /// Leave default login shell alone.
    #[arg(long)]
    pub no_switch: bool,
}

impl Cli {
    fn run(self) -> Result<()> {
        let context = Context::from_env(Overrides {
            plugin_root: self.plugin_root,
            rc_file: self.rc_file,
        })?;

        let mut manifest = match &self.manifest {
            Some(path) => read_to_string(path)
                .with_context(|| format!("failed to read manifest {:?}", path.display()))?
                .parse::<Manifest>()
                .with_context(|| format!("invalid manifest {:?}", path.display()))?,
            None => Manifest::builtin(&default_framework_dir(&context.home))?,
        };
        if self.no_switch {
            manifest.shell.switch = false;
        }

        let runner = SystemRunner;
        let retrieval = Git2Retrieval;
        let report = Bootstrap::new(&context, &manifest, &runner, &retrieval).run()?;
        report.summarize();

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}
