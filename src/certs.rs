//! LDAP CA certificate staging
//!
//! Downloads the CA certificate named by the LDAP CA URL into the
//! certificate directory and refreshes the OpenSSL hash links there.
//! `http(s)://` URLs are fetched with reqwest; `file://` URLs are read from
//! disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::command::{run_command, CommandArgs};
use crate::error::{AuthconfError, Result};

/// File name the downloaded certificate is stored under
pub const DOWNLOADED_CERT_NAME: &str = "authconfig_downloaded.pem";

const REHASH_TOOL: &str = "/usr/sbin/cacertdir_rehash";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The directory holding trusted LDAP CA certificates
#[derive(Debug, Clone)]
pub struct CaCertStore {
    dir: PathBuf,
}

impl CaCertStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch the certificate at `url` and store it in the directory.
    pub fn stage(&self, url: &str) -> Result<PathBuf> {
        let pem = fetch(url)?;
        if !pem.windows(11).any(|w| w == b"-----BEGIN ") {
            return Err(AuthconfError::cacert(format!("{} does not contain a PEM certificate", url)));
        }

        fs::create_dir_all(&self.dir)
            .map_err(|e| AuthconfError::cacert(format!("cannot create {}: {}", self.dir.display(), e)))?;
        let target = self.dir.join(DOWNLOADED_CERT_NAME);
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| AuthconfError::cacert(format!("cannot stage certificate: {}", e)))?;
        temp.write_all(&pem)
            .map_err(|e| AuthconfError::cacert(format!("cannot stage certificate: {}", e)))?;
        temp.persist(&target).map_err(|e| {
            AuthconfError::cacert(format!("cannot write {}: {}", target.display(), e.error))
        })?;

        info!("Stored LDAP CA certificate from {} in {}", url, target.display());
        Ok(target)
    }

    /// Returns true if the directory holds at least one PEM file.
    pub fn has_certificates(&self) -> bool {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries.filter_map(|e| e.ok()).any(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|ext| ext == "pem" || ext == "crt")
                })
            })
            .unwrap_or(false)
    }

    /// Recompute the certificate hash links.
    ///
    /// Skipped when the directory or the rehash tool is absent.
    pub fn rehash(&self) -> Result<()> {
        if !self.dir.is_dir() {
            debug!("No CA certificate directory at {}, skipping rehash", self.dir.display());
            return Ok(());
        }
        if !Path::new(REHASH_TOOL).exists() {
            debug!("{} not installed, skipping rehash", REHASH_TOOL);
            return Ok(());
        }
        run_command(&RehashArgs { dir: self.dir.clone() })?.ensure_success("cacertdir_rehash")
    }
}

struct RehashArgs {
    dir: PathBuf,
}

impl CommandArgs for RehashArgs {
    fn program(&self) -> String {
        REHASH_TOOL.to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.dir.display().to_string()]
    }
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    if let Some(path) = url.strip_prefix("file://") {
        return fs::read(path)
            .map_err(|e| AuthconfError::cacert(format!("cannot read {}: {}", path, e)));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AuthconfError::cacert(format!("unsupported URL scheme in '{}'", url)));
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| AuthconfError::cacert(format!("cannot create HTTP client: {}", e)))?;
    let response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| AuthconfError::cacert(format!("download of {} failed: {}", url, e)))?;
    let body = response
        .bytes()
        .map_err(|e| AuthconfError::cacert(format!("download of {} failed: {}", url, e)))?;
    if body.is_empty() {
        warn!("{} returned an empty body", url);
    }
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn test_stage_from_file_url() {
        let src = TempDir::new().unwrap();
        let cert = src.path().join("ca.pem");
        fs::write(&cert, PEM).unwrap();

        let dir = TempDir::new().unwrap();
        let store = CaCertStore::new(dir.path().join("cacerts"));
        assert!(!store.has_certificates());

        let target = store.stage(&format!("file://{}", cert.display())).unwrap();
        assert_eq!(target.file_name().unwrap(), DOWNLOADED_CERT_NAME);
        assert_eq!(fs::read_to_string(&target).unwrap(), PEM);
        assert!(store.has_certificates());
    }

    #[test]
    fn test_stage_missing_file_is_cacert_error() {
        let dir = TempDir::new().unwrap();
        let store = CaCertStore::new(dir.path());
        let err = store.stage("file:///nonexistent/ca.pem").unwrap_err();
        assert!(matches!(err, AuthconfError::CaCert(_)));
    }

    #[test]
    fn test_stage_rejects_non_pem() {
        let src = TempDir::new().unwrap();
        let bogus = src.path().join("index.html");
        fs::write(&bogus, "<html></html>").unwrap();
        let store = CaCertStore::new(src.path().join("cacerts"));
        assert!(store.stage(&format!("file://{}", bogus.display())).is_err());
        assert!(!store.dir().join(DOWNLOADED_CERT_NAME).exists());
    }

    #[test]
    fn test_unsupported_scheme() {
        let dir = TempDir::new().unwrap();
        let err = CaCertStore::new(dir.path()).stage("ftp://example.com/ca.pem").unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }

    #[test]
    fn test_rehash_without_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        assert!(CaCertStore::new(dir.path().join("absent")).rehash().is_ok());
    }
}
