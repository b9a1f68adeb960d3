//! Config file backend.
//!
//! The engine never parses or serializes the real file grammars itself; it
//! asks a `ConfigBackend` whether an artifact exists, what keys it holds,
//! and to write a set of changed keys. `ShellVarsBackend` is the shipped
//! backend: it keeps every artifact in sysconfig `KEY=value` form and only
//! touches the keys it is asked to write.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AuthconfError, Result};
use crate::settings::artifact::Artifact;

/// Read/write access to the configuration artifacts.
///
/// # Contract
///
/// - `read()` of a missing artifact returns an empty map, not an error.
/// - `write()` replaces only the given keys and keeps everything else in
///   the artifact (comments, unrelated keys, file mode).
pub trait ConfigBackend {
    /// Location of the artifact on disk.
    fn path(&self, artifact: Artifact) -> PathBuf;

    /// Returns true if the artifact is present.
    fn exists(&self, artifact: Artifact) -> bool {
        self.path(artifact).exists()
    }

    /// Read every key/value pair stored in the artifact.
    fn read(&self, artifact: Artifact) -> Result<BTreeMap<String, String>>;

    /// Write the given keys into the artifact.
    fn write(&self, artifact: Artifact, values: &[(String, String)]) -> Result<()>;
}

/// Sysconfig-style backend rooted at a system root directory
#[derive(Debug, Clone)]
pub struct ShellVarsBackend {
    root: PathBuf,
}

impl ShellVarsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ConfigBackend for ShellVarsBackend {
    fn path(&self, artifact: Artifact) -> PathBuf {
        artifact.path_under(&self.root)
    }

    fn read(&self, artifact: Artifact) -> Result<BTreeMap<String, String>> {
        let path = self.path(artifact);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(parse_vars(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not present at {}", artifact, path.display());
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, artifact: Artifact, values: &[(String, String)]) -> Result<()> {
        let path = self.path(artifact);
        let write_err = |source: std::io::Error| AuthconfError::Write {
            artifact,
            path: path.clone(),
            source,
        };

        let existing = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(write_err(e)),
        };
        let content = merge_vars(&existing, values);

        let parent = path
            .parent()
            .ok_or_else(|| write_err(std::io::Error::new(ErrorKind::InvalidInput, "no parent")))?;
        fs::create_dir_all(parent).map_err(write_err)?;

        let mut temp = NamedTempFile::new_in(parent).map_err(write_err)?;
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        if let Ok(meta) = fs::metadata(&path) {
            temp.as_file()
                .set_permissions(meta.permissions())
                .map_err(write_err)?;
        }
        temp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!("Wrote {} key(s) to {}", values.len(), path.display());
        Ok(())
    }
}

/// Parse `KEY=value` lines, ignoring comments and anything else.
pub fn parse_vars(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return None;
            }
            Some((key.to_string(), unquote(value.trim())))
        })
        .collect()
}

/// Replace the given keys in `existing`, appending keys not yet present.
///
/// Every line carrying a managed key is rewritten once; repeated lines for
/// the same key are dropped so a stale duplicate cannot shadow the new value.
pub fn merge_vars(existing: &str, values: &[(String, String)]) -> String {
    let mut written: BTreeSet<&str> = BTreeSet::new();
    let mut out = String::with_capacity(existing.len() + values.len() * 16);

    for line in existing.lines() {
        let key = line
            .split_once('=')
            .map(|(k, _)| k.trim())
            .filter(|k| !k.starts_with('#'));
        match key.and_then(|k| values.iter().find(|(vk, _)| vk == k)) {
            Some((k, v)) => {
                if written.insert(k.as_str()) {
                    out.push_str(&format!("{}={}\n", k, quote(v)));
                } else {
                    debug!("Dropping duplicate {} line", k);
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    for (k, v) in values {
        if written.insert(k.as_str()) {
            out.push_str(&format!("{}={}\n", k, quote(v)));
        }
    }
    out
}

fn is_plain(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_./:@,+-%[]".contains(c))
}

fn quote(value: &str) -> String {
    if is_plain(value) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '"' | '\\' | '$' | '`' => {
                quoted.push('\\');
                quoted.push(c);
            }
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let mut out = String::with_capacity(value.len());
        let mut chars = value[1..value.len() - 1].chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some(next) => out.push(next),
                    None => {}
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }
    value.to_string()
}
