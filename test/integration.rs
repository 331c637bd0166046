// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{HostDouble, RepoFixture, RepoKind};

use zshup::{
    bootstrap::Bootstrap,
    config::Manifest,
    context::Context,
    plugin::{Git2Retrieval, PluginFetcher, Retrieval},
    report::Outcome,
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{fs, path::Path};

const ZSHRC: &str = indoc! {r#"
    export ZSH="$HOME/.oh-my-zsh"
    ZSH_THEME="robbyrussell"
    plugins=(git)
    source $ZSH/oh-my-zsh.sh
"#};

const MANIFEST: &str = indoc! {r#"
    [shell]
    name = "zsh"

    [[capability]]
    name = "zsh"
    detect = { command = "zsh" }
    install = { package = "zsh" }
    mandatory = true

    [[capability]]
    name = "oh-my-zsh"
    detect = { path = "@ROOT@/.oh-my-zsh/oh-my-zsh.sh" }
    install = { script = "echo never runs" }
    mandatory = true

    [[plugin]]
    name = "zsh-autosuggestions"
    url = "@PLUGIN@"

    [[edit]]
    name = "plugins"
    kind = "list-entries"
    key = "plugins"
    entries = ["git", "zsh-autosuggestions"]
    before = '^\s*source\s+.*oh-my-zsh\.sh'

    [[edit]]
    name = "theme"
    kind = "replace-line"
    pattern = '^ZSH_THEME='
    line = 'ZSH_THEME="agnoster"'

    [[edit]]
    name = "history"
    kind = "append-block"
    block = """
    HISTSIZE=10000
    SAVEHIST=10000
    """
"#};

fn plugin_source(root: &Path, kind: RepoKind) -> Result<RepoFixture> {
    let repo = RepoFixture::new(root.join("upstream/zsh-autosuggestions"), kind)?;
    repo.stage_and_commit(
        "zsh-autosuggestions.plugin.zsh",
        "source ${0:A:h}/zsh-autosuggestions.zsh\n",
    )?;
    Ok(repo)
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

fn clone_plugin(kind: RepoKind) -> Result<()> {
    let root = std::env::current_dir()?;
    let source = plugin_source(&root, kind)?;
    let destination = root.join("custom/plugins/zsh-autosuggestions");
    fs::create_dir_all(root.join("custom/plugins"))?;

    Git2Retrieval.retrieve(&source.url(), &destination)?;

    assert_eq!(
        fs::read_to_string(destination.join("zsh-autosuggestions.plugin.zsh"))?,
        "source ${0:A:h}/zsh-autosuggestions.zsh\n"
    );

    Ok(())
}

#[sealed_test]
fn git2_retrieval_clones_normal_repository() -> Result<()> {
    clone_plugin(RepoKind::Normal)
}

#[sealed_test]
fn git2_retrieval_clones_bare_repository() -> Result<()> {
    clone_plugin(RepoKind::Bare)
}

#[sealed_test]
fn unreachable_plugin_leaves_nothing_behind() -> Result<()> {
    let root = std::env::current_dir()?;
    let fetcher = PluginFetcher::new(&Git2Retrieval, root.join("custom"));
    let plugin = zshup::config::PluginSpec {
        name: "zsh-missing".into(),
        url: root.join("nowhere").to_string_lossy().into_owned(),
        destination: None,
    };

    let result = fetcher.fetch(&plugin);

    assert!(result.is_failure());
    assert!(!root.join("custom/plugins/zsh-missing").exists());

    Ok(())
}

#[sealed_test]
fn bootstrap_is_idempotent() -> Result<()> {
    let root = std::env::current_dir()?;
    let source = plugin_source(&root, RepoKind::Normal)?;
    fs::create_dir_all(root.join(".oh-my-zsh"))?;
    fs::write(root.join(".oh-my-zsh/oh-my-zsh.sh"), "# framework\n")?;
    fs::write(root.join(".zshrc"), ZSHRC)?;
    fs::write(root.join("shells"), "/bin/bash\n/usr/bin/zsh\n")?;

    let manifest: Manifest = MANIFEST
        .replace("@ROOT@", &root.to_string_lossy())
        .replace("@PLUGIN@", &source.url())
        .parse()?;
    let context = context(&root);
    let host = HostDouble::new("blah", "/bin/bash").with_executable("zsh", "/usr/bin/zsh");

    let first = Bootstrap::new(&context, &manifest, &host, &Git2Retrieval).run()?;
    assert!(first.warnings().next().is_none());
    assert_eq!(first.outcome("plugin zsh-autosuggestions"), Some(&Outcome::Installed));
    assert_eq!(first.outcome("default shell zsh"), Some(&Outcome::Changed));
    assert_eq!(host.login_shell(), Path::new("/usr/bin/zsh"));

    let expect = indoc! {r#"
        export ZSH="$HOME/.oh-my-zsh"
        ZSH_THEME="agnoster"
        plugins=(git zsh-autosuggestions)
        source $ZSH/oh-my-zsh.sh

        HISTSIZE=10000
        SAVEHIST=10000
    "#};
    assert_eq!(fs::read_to_string(root.join(".zshrc"))?, expect);
    assert_eq!(
        fs::read_to_string(root.join(".zshrc.zshup-20250101-000000.bak"))?,
        ZSHRC
    );

    let history_after_first = host.history().len();
    let second = Bootstrap::new(&context, &manifest, &host, &Git2Retrieval).run()?;
    assert!(second.is_noop());
    assert_eq!(fs::read_to_string(root.join(".zshrc"))?, expect);
    assert!(!host.history()[history_after_first..]
        .iter()
        .any(|call| call.starts_with("chsh") || call.starts_with("sudo")));

    Ok(())
}
