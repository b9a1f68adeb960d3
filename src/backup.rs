//! Backup/Restore Manager
//!
//! An archive is a directory `<backup_dir>/<name>/` holding a copy of every
//! artifact file present at save time, `settings.json` with the settings
//! model at that moment and `manifest.json` listing the archived artifacts.
//!
//! Saving is best-effort: copy failures are logged, reported and recorded in
//! the manifest, partial archive contents are kept. Restoring first checks
//! that every copied file the manifest lists is in the archive, so a damaged
//! archive is refused before anything live is touched; after that every
//! artifact is attempted even if one fails. An artifact whose copy failed at
//! save time is left as it is and makes the restore report failure.

use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::backend::ConfigBackend;
use crate::error::{AuthconfError, Result};
use crate::settings::artifact::Artifact;
use crate::settings::{store, AuthSettings};

/// Archive written automatically before every configuration write
pub const LAST_BACKUP: &str = "last";

const MANIFEST_FILE: &str = "manifest.json";
const SETTINGS_FILE: &str = "settings.json";

/// Contents list of one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub name: String,
    /// Seconds since the Unix epoch
    pub created: u64,
    /// Artifacts that existed on disk when the archive was taken
    pub artifacts: BTreeSet<Artifact>,
    /// Artifacts that existed but could not be copied into the archive
    #[serde(default)]
    pub failed: BTreeSet<Artifact>,
}

impl BackupManifest {
    /// Artifacts whose archived copy is usable for a restore.
    pub fn archived(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| !self.failed.contains(a))
    }
}

/// Saves and restores named archives of the configuration artifacts
pub struct BackupManager<'a> {
    backend: &'a dyn ConfigBackend,
    dir: PathBuf,
}

impl<'a> BackupManager<'a> {
    pub fn new(backend: &'a dyn ConfigBackend, dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            dir: dir.into(),
        }
    }

    /// Directory of the archive called `name`.
    pub fn archive_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Copy every artifact into the archive `name`, replacing an existing one.
    pub fn save_backup(&self, name: &str) -> bool {
        match self.save(name) {
            Ok(true) => {
                info!("Saved backup '{}'", name);
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Failed to save backup '{}': {}", name, e);
                false
            }
        }
    }

    /// Copy every artifact from the archive `name` back over the live files.
    pub fn restore_backup(&self, name: &str) -> bool {
        match self.restore(name) {
            Ok(true) => {
                info!("Restored backup '{}'", name);
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Failed to restore backup '{}': {}", name, e);
                false
            }
        }
    }

    /// Restore the archive taken automatically before the last write.
    pub fn restore_last(&self) -> bool {
        self.restore_backup(LAST_BACKUP)
    }

    /// Settings model stored in the archive `name`.
    pub fn archived_settings(&self, name: &str) -> Result<AuthSettings> {
        validate_name(name)?;
        let path = self.archive_dir(name).join(SETTINGS_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| AuthconfError::backup(format!("cannot read {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn manifest(&self, name: &str) -> Result<BackupManifest> {
        validate_name(name)?;
        let path = self.archive_dir(name).join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                AuthconfError::backup(format!("backup '{}' does not exist", name))
            } else {
                AuthconfError::backup(format!("cannot read {}: {}", path.display(), e))
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let archive = self.archive_dir(name);
        if archive.exists() {
            debug!("Replacing existing backup at {}", archive.display());
            fs::remove_dir_all(&archive)?;
        }
        fs::create_dir_all(&archive)?;

        let mut artifacts = BTreeSet::new();
        let mut failed = BTreeSet::new();
        for artifact in Artifact::iter() {
            let live = self.backend.path(artifact);
            if !live.exists() {
                continue;
            }
            artifacts.insert(artifact);
            if let Err(e) = fs::copy(&live, archive.join(artifact.archive_name())) {
                error!("Cannot back up {} ({}): {}", artifact, live.display(), e);
                failed.insert(artifact);
            }
        }
        let ok = failed.is_empty();

        let settings = store::load(self.backend);
        write_atomic(&archive.join(SETTINGS_FILE), serde_json::to_string_pretty(&settings)?.as_bytes())?;

        let manifest = BackupManifest {
            name: name.to_string(),
            created: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            artifacts,
            failed,
        };
        write_atomic(&archive.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?.as_bytes())?;
        Ok(ok)
    }

    fn restore(&self, name: &str) -> Result<bool> {
        let manifest = self.manifest(name)?;
        let archive = self.archive_dir(name);

        let missing: Vec<String> = manifest
            .archived()
            .filter(|a| !archive.join(a.archive_name()).is_file())
            .map(|a| a.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AuthconfError::backup(format!(
                "backup '{}' is incomplete, missing: {}",
                name,
                missing.join(", ")
            )));
        }

        let mut ok = true;
        for artifact in Artifact::iter() {
            let live = self.backend.path(artifact);
            if manifest.failed.contains(&artifact) {
                // Present at save time but never archived; the live file is kept
                error!("Backup '{}' holds no copy of {}, leaving {} untouched", name, artifact, live.display());
                ok = false;
                continue;
            }
            let result = if manifest.artifacts.contains(&artifact) {
                restore_file(&archive.join(artifact.archive_name()), &live)
            } else {
                remove_if_present(&live)
            };
            if let Err(e) = result {
                error!("Cannot restore {} ({}): {}", artifact, live.display(), e);
                ok = false;
            }
        }
        Ok(ok)
    }
}

/// Archive names are a single, non-special path component.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(AuthconfError::usage(format!("invalid backup name '{}'", name)));
    }
    Ok(())
}

fn restore_file(source: &Path, target: &Path) -> std::io::Result<()> {
    let content = fs::read(source)?;
    let parent = target
        .parent()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "target has no parent"))?;
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(&content)?;
    temp.as_file().set_permissions(fs::metadata(source)?.permissions())?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {} (absent from backup)", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| AuthconfError::backup(format!("{} has no parent", path.display())))?;
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.persist(path).map_err(|e| {
        warn!("Cannot persist {}: {}", path.display(), e.error);
        AuthconfError::Io(e.error)
    })?;
    Ok(())
}
