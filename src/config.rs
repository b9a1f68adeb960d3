//! Tool configuration file handling.
//!
//! `ToolConfig` holds the settings of the tool itself (where the system root
//! is, where archives live), not the authentication settings it manages.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AuthconfError;

/// Default location of the tool configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/authconf/authconf.json";

/// Tool configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// System root all artifact paths are resolved under
    pub root: PathBuf,
    /// Directory holding backup archives
    pub backup_dir: PathBuf,
    /// Directory holding trusted LDAP CA certificates
    pub cacert_dir: PathBuf,
    /// TCP connect timeout for probe mode
    pub probe_timeout_secs: u64,
    /// Start/stop daemons after writing
    pub manage_services: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            backup_dir: PathBuf::from("/var/lib/authconfig"),
            cacert_dir: PathBuf::from("/etc/openldap/cacerts"),
            probe_timeout_secs: 3,
            manage_services: true,
        }
    }
}

impl ToolConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Load the explicit file if given, else the default file if present,
    /// else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load_from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(AuthconfError::config("system root must not be empty"));
        }
        if !self.backup_dir.is_absolute() {
            return Err(AuthconfError::config(format!(
                "backup directory must be an absolute path: {:?}",
                self.backup_dir
            )));
        }
        if !self.cacert_dir.is_absolute() {
            return Err(AuthconfError::config(format!(
                "CA certificate directory must be an absolute path: {:?}",
                self.cacert_dir
            )));
        }
        if self.probe_timeout_secs == 0 {
            return Err(AuthconfError::config("probe timeout must be at least one second"));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Returns true if the configuration targets the running system.
    pub fn is_live_root(&self) -> bool {
        self.root == Path::new("/")
    }

    /// `path` (absolute on the target system) resolved under the root.
    pub fn under_root(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("/") {
            Ok(relative) => self.root.join(relative),
            Err(_) => self.root.join(path),
        }
    }
}
