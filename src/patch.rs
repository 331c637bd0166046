// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell configuration file patching.
//!
//! Utilities to apply [`ConfigEdit`]s to a shell configuration file such as
//! `.zshrc`. All edits are content-based, never line-number-based. Applying
//! the same edit twice leaves the file exactly as applying it once did.
//!
//! # Edit Kinds
//!
//! - __Replace line__: the first line matching a pattern is replaced
//!   wholesale. Without a match, a fresh line is inserted instead.
//! - __Append block__: a block of text is appended at the end of the file,
//!   separated by a blank line, unless the file already contains it.
//! - __List entries__: a list assignment like `plugins=(git)` gets any
//!   missing entries added to it, keeping whatever the user already listed.
//!
//! # Safety Net
//!
//! Every edit reads a snapshot of the file, modifies it in memory, and writes
//! it back in one go through a temporary file that replaces the original.
//! Before the first change of a run, the untouched content is saved to a
//! backup file next to the original, named after the run's timestamp.

use crate::{config::ConfigEdit, report::Outcome};

use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{self, read_to_string},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Apply edits to shell configuration file.
#[derive(Debug)]
pub struct ConfigPatcher {
    path: PathBuf,
    target: PathBuf,
    backup: PathBuf,
    backed_up: bool,
}

impl ConfigPatcher {
    /// Open configuration file for patching.
    ///
    /// Symbolic links are resolved so edits land in the real file, and the
    /// link itself stays intact.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError::ConfigNotFound`] if configuration file does
    ///   not exist.
    /// - Return [`PatchError::Read`] if configuration file cannot be
    ///   resolved for any other reason.
    pub fn open(path: impl Into<PathBuf>, stamp: impl AsRef<str>) -> Result<Self> {
        let path = path.into();
        let target = fs::canonicalize(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => PatchError::ConfigNotFound { path: path.clone() },
            _ => PatchError::Read {
                source,
                path: path.clone(),
            },
        })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "zshrc".into());
        let backup = path.with_file_name(format!("{file_name}.zshup-{}.bak", stamp.as_ref()));

        Ok(Self {
            path,
            target,
            backup,
            backed_up: false,
        })
    }

    /// Path to configuration file as given by the caller.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to backup file, if one was written during this run.
    pub fn backup(&self) -> Option<&Path> {
        self.backed_up.then_some(self.backup.as_path())
    }

    /// Apply configuration edit.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError::Pattern`] if edit carries an invalid pattern.
    /// - Return [`PatchError::Read`], [`PatchError::Write`], or
    ///   [`PatchError::Backup`] if file I/O fails.
    #[instrument(skip(self, edit), fields(edit = edit.name()), level = "debug")]
    pub fn apply_edit(&mut self, edit: &ConfigEdit) -> Result<Outcome> {
        let changed = match edit {
            ConfigEdit::ReplaceLine {
                name,
                pattern,
                line,
                before,
            } => {
                let pattern = compile(name, pattern)?;
                let before = before.as_deref().map(|before| compile(name, before)).transpose()?;
                self.edit(|rc| rc.replace_line(&pattern, line, before.as_ref()))?
            }
            ConfigEdit::AppendBlock { block, .. } => self.edit(|rc| rc.append_block(block))?,
            ConfigEdit::ListEntries {
                name,
                key,
                entries,
                before,
            } => {
                let before = before.as_deref().map(|before| compile(name, before)).transpose()?;
                self.edit(|rc| rc.list_entries(key, entries, before.as_ref()))?
            }
        };

        if changed {
            info!("patched {} with edit {:?}", self.path.display(), edit.name());
            Ok(Outcome::Changed)
        } else {
            Ok(Outcome::AlreadyPresent)
        }
    }

    /// Edit configuration file.
    ///
    /// Read current content into [`RcEdit`] instance, and directly edit it
    /// before writing the results back. Nothing is written when the editor
    /// makes no change. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// - Return [`PatchError::Read`] if configuration file cannot be read.
    /// - Return [`PatchError::Backup`] if backup cannot be written.
    /// - Return [`PatchError::Write`] if configuration file cannot be written.
    pub fn edit<E>(&mut self, editor: E) -> Result<bool>
    where
        E: FnOnce(&mut RcEdit),
    {
        let content = read_to_string(&self.target).map_err(|source| PatchError::Read {
            source,
            path: self.target.clone(),
        })?;

        let mut rc = RcEdit::from(content.as_str());
        editor(&mut rc);

        if !rc.changed {
            return Ok(false);
        }

        // INVARIANT: Back up pristine content once per run, before the first write.
        if !self.backed_up {
            fs::write(&self.backup, &content).map_err(|source| PatchError::Backup {
                source,
                path: self.backup.clone(),
            })?;
            self.backed_up = true;
            info!("backed up {} to {}", self.path.display(), self.backup.display());
        }

        self.replace_contents(rc.to_string())?;

        Ok(true)
    }

    fn replace_contents(&self, contents: String) -> Result<()> {
        let write_err = |source: std::io::Error| PatchError::Write {
            source,
            path: self.target.clone(),
        };

        let file_name = self
            .target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "zshrc".into());
        let staging = self.target.with_file_name(format!(".{file_name}.zshup.tmp"));

        fs::write(&staging, contents).map_err(write_err)?;
        if let Ok(metadata) = fs::metadata(&self.target) {
            fs::set_permissions(&staging, metadata.permissions()).map_err(write_err)?;
        }
        fs::rename(&staging, &self.target).map_err(write_err)?;
        debug!("rewrote {}", self.target.display());

        Ok(())
    }
}

fn compile(edit: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| PatchError::Pattern {
        edit: edit.into(),
        source,
    })
}

/// In-memory configuration file editor.
///
/// # Invariant
///
/// - Every edit operation is idempotent.
/// - Lines not targeted by an edit are never touched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RcEdit {
    lines: Vec<String>,
    crlf: bool,
    unterminated: bool,
    changed: bool,
}

impl RcEdit {
    /// Construct new empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content was changed by an edit.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Replace first line matching `pattern` with `line`.
    ///
    /// Falls back to inserting `line` when nothing matches. The new line goes
    /// right above the first line matching `before`, or at the end of the
    /// file without such an anchor.
    pub fn replace_line(&mut self, pattern: &Regex, line: &str, before: Option<&Regex>) {
        let matches = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, current)| pattern.is_match(current))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        if matches.len() > 1 {
            warn!(
                "pattern {:?} matches {} lines, only replacing the first one",
                pattern.as_str(),
                matches.len()
            );
        }

        match matches.first() {
            Some(&index) => {
                if self.lines[index] != line {
                    self.lines[index] = line.to_string();
                    self.changed = true;
                }
            }
            // INVARIANT: Do not insert the same line again when the pattern simply misses it.
            None if self.lines.iter().any(|current| current == line) => {}
            None => self.insert_line(line.to_string(), before),
        }
    }

    /// Append `block` at end of content, unless already present.
    pub fn append_block(&mut self, block: &str) {
        let block = block.lines().collect::<Vec<_>>().join("\n");
        let block = block.trim_end_matches('\n');
        if block.is_empty() || self.lines.join("\n").contains(block) {
            return;
        }

        if self.lines.last().is_some_and(|last| !last.trim().is_empty()) {
            self.lines.push(String::new());
        }
        self.lines.extend(block.lines().map(str::to_owned));
        self.changed = true;
    }

    /// Make list assignment `key=(...)` contain every name in `entries`.
    ///
    /// Existing entries and their order are kept. Missing entries are added
    /// at the end of the list in the order given. Handles both single line
    /// and multi-line list assignments. Without any assignment, a fresh one
    /// is inserted like [`RcEdit::replace_line`] would. An assignment that
    /// is never closed is left alone.
    pub fn list_entries(&mut self, key: &str, entries: &[String], before: Option<&Regex>) {
        let list = match self.find_list(key) {
            ListSearch::Found(list) => list,
            ListSearch::Unclosed => {
                warn!("assignment of {key:?} is never closed, leaving it alone");
                return;
            }
            ListSearch::Missing => {
                let mut unique: Vec<&str> = Vec::new();
                for entry in entries {
                    if !unique.contains(&entry.as_str()) {
                        unique.push(entry);
                    }
                }
                self.insert_line(format!("{key}=({})", unique.join(" ")), before);
                return;
            }
        };

        let mut missing: Vec<&str> = Vec::new();
        for entry in entries {
            if !list.entries.contains(entry) && !missing.contains(&entry.as_str()) {
                missing.push(entry);
            }
        }

        if missing.is_empty() {
            return;
        }

        if list.start == list.end {
            let line = &self.lines[list.start];
            let (head, tail) = line.split_at(list.close);
            let head = head.trim_end();
            let separator = if head.ends_with('(') { "" } else { " " };
            self.lines[list.start] = format!("{head}{separator}{}{tail}", missing.join(" "));
        } else {
            let indent = if list.start + 1 < list.end {
                leading_whitespace(&self.lines[list.start + 1]).to_string()
            } else {
                format!("{}  ", leading_whitespace(&self.lines[list.start]))
            };
            let additions = missing.iter().map(|entry| format!("{indent}{entry}"));
            self.lines.splice(list.end..list.end, additions);
        }

        self.changed = true;
    }

    fn insert_line(&mut self, line: String, before: Option<&Regex>) {
        let anchor = before.and_then(|before| self.lines.iter().position(|current| before.is_match(current)));
        match anchor {
            Some(index) => self.lines.insert(index, line),
            None => self.lines.push(line),
        }
        self.changed = true;
    }

    fn find_list(&self, key: &str) -> ListSearch {
        let prefix = format!("{key}=(");
        let starts = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.trim_start().starts_with(&prefix))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        if starts.len() > 1 {
            warn!(
                "found {} assignments of {key:?}, only editing the first one",
                starts.len()
            );
        }

        let Some(&start) = starts.first() else {
            return ListSearch::Missing;
        };
        let Some(open) = self.lines[start].find(&prefix).map(|open| open + prefix.len()) else {
            return ListSearch::Missing;
        };
        let mut body = String::new();
        let mut segment = &self.lines[start][open..];
        let mut offset = open;
        for index in start..self.lines.len() {
            if index != start {
                segment = self.lines[index].as_str();
                offset = 0;
            }

            match segment.find(')') {
                Some(close) => {
                    body.push_str(&segment[..close]);
                    return ListSearch::Found(ListAssignment {
                        start,
                        end: index,
                        close: offset + close,
                        entries: body.split_whitespace().map(str::to_owned).collect(),
                    });
                }
                None => {
                    body.push_str(segment);
                    body.push(' ');
                }
            }
        }

        ListSearch::Unclosed
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Result of looking up list assignment.
#[derive(Debug)]
enum ListSearch {
    Found(ListAssignment),
    Missing,
    Unclosed,
}

/// Location of list assignment in configuration content.
#[derive(Debug)]
struct ListAssignment {
    start: usize,
    end: usize,
    close: usize,
    entries: Vec<String>,
}

impl Display for RcEdit {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let terminator = if self.crlf { "\r\n" } else { "\n" };
        for (index, line) in self.lines.iter().enumerate() {
            fmt.write_str(line)?;
            // INVARIANT: Keep missing final newline missing.
            if !(self.unterminated && index + 1 == self.lines.len()) {
                fmt.write_str(terminator)?;
            }
        }

        Ok(())
    }
}

impl From<&str> for RcEdit {
    fn from(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_owned).collect(),
            crlf: content
                .find('\n')
                .is_some_and(|newline| content[..newline].ends_with('\r')),
            unterminated: !content.is_empty() && !content.ends_with('\n'),
            changed: false,
        }
    }
}

impl From<String> for RcEdit {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

/// Configuration patching error types.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Configuration file does not exist at all.
    #[error("configuration file {:?} not found", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration file cannot be read from.
    #[error("failed to read configuration file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written to.
    #[error("failed to write configuration file {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Backup of configuration file cannot be written.
    #[error("failed to write backup {:?}", path.display())]
    Backup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Edit carries invalid pattern.
    #[error("edit {edit:?} has invalid pattern")]
    Pattern {
        edit: String,
        #[source]
        source: regex::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PatchError> = std::result::Result<T, E>;
