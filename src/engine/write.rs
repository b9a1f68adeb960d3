//! Reconciliation & Write Engine
//!
//! Turns a pristine/current snapshot pair into an ordered `WritePlan` and
//! executes it.
//!
//! # Execution Order
//!
//! | Step | Failure effect |
//! |------|----------------|
//! | Automatic backup (`last`) | Warning, write continues |
//! | CA certificate staging | `CaCert` status, write continues |
//! | Certificate rehash | Warning |
//! | Artifact writes | `WriteAll` / `WriteChanged` status, remaining artifacts still written |
//! | Domain joins | `Join` status, configuration kept |
//! | Service lifecycle | Warning |
//!
//! # Design
//!
//! - **Pure planning**: `calculate_write_plan` does no I/O
//! - **Partial failure**: every step runs even if an earlier one failed; the
//!   report carries the worst status seen

use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

use crate::backend::ConfigBackend;
use crate::backup::{BackupManager, LAST_BACKUP};
use crate::capabilities::CapabilitySet;
use crate::certs::CaCertStore;
use crate::error::ExitStatus;
use crate::join::{join_domains, DomainJoiner, JoinOutcome, JoinRequest};
use crate::logic::services::{apply_services, resolve_services, ServiceAction, ServiceManager};
use crate::settings::artifact::Artifact;
use crate::settings::{store, AuthSettings, SettingId};
use strum::IntoEnumIterator;

// ============================================================================
// Plan
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Rewrite only artifacts owning a changed setting
    ChangedOnly,
    /// Rewrite every artifact
    All,
}

impl WriteMode {
    /// Exit status reported when an artifact write fails in this mode.
    pub fn failure_status(self) -> ExitStatus {
        match self {
            Self::ChangedOnly => ExitStatus::WriteChanged,
            Self::All => ExitStatus::WriteAll,
        }
    }
}

/// Everything one write pass will do, in order.
#[derive(Debug, Clone, Serialize)]
pub struct WritePlan {
    pub mode: WriteMode,
    /// CA certificate URL to stage before writing
    pub cacert_url: Option<String>,
    /// Artifacts to rewrite, in write order
    pub artifacts: Vec<Artifact>,
    pub joins: Vec<JoinRequest>,
    /// Empty when service management is disabled
    pub services: Vec<ServiceAction>,
}

impl WritePlan {
    /// Returns true if the plan writes no artifact and joins nothing.
    pub fn is_noop(&self) -> bool {
        self.artifacts.is_empty() && self.joins.is_empty() && self.cacert_url.is_none()
    }

    /// Returns a summary of the plan for logging/display.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Write Plan: {:?}", self.mode)];
        if let Some(url) = &self.cacert_url {
            lines.push(format!("  CA certificate: {}", url));
        }
        lines.push(format!("  Artifacts ({}):", self.artifacts.len()));
        for (i, artifact) in self.artifacts.iter().enumerate() {
            lines.push(format!("    {}. {} ({})", i + 1, artifact, artifact.system_path()));
        }
        for join in &self.joins {
            lines.push(format!("  Join: {} as {}", join.kind, join.user));
        }
        if !self.services.is_empty() {
            let services: Vec<String> = self.services.iter().map(|s| s.to_string()).collect();
            lines.push(format!("  Services: {}", services.join(", ")));
        }
        lines.join("\n")
    }
}

/// Calculate the write plan for `current` against the `pristine` snapshot.
pub fn calculate_write_plan(
    pristine: &AuthSettings,
    current: &AuthSettings,
    mode: WriteMode,
    joins: &[JoinRequest],
    caps: &CapabilitySet,
    manage_services: bool,
) -> WritePlan {
    let artifacts = match mode {
        WriteMode::All => Artifact::iter().collect(),
        WriteMode::ChangedOnly => pristine.changed_artifacts(current).into_iter().collect(),
    };
    let cacert_url = Some(current.ldap_cacert_url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string);
    let services = if manage_services {
        resolve_services(current, caps)
    } else {
        Vec::new()
    };

    WritePlan {
        mode,
        cacert_url,
        artifacts,
        joins: joins.to_vec(),
        services,
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one write pass
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub status: ExitStatus,
    pub backup_saved: bool,
    pub written: Vec<Artifact>,
    pub failed: Vec<Artifact>,
    pub joins: JoinOutcome,
    pub service_failures: usize,
}

impl fmt::Display for WriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wrote {} artifact(s), {} failed, {} join(s) failed, {} service action(s) failed (status {})",
            self.written.len(),
            self.failed.len(),
            self.joins.failed.len(),
            self.service_failures,
            self.status.code()
        )
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Executes write plans against the configured collaborators.
pub struct Engine<'a> {
    pub backend: &'a dyn ConfigBackend,
    pub backups: &'a BackupManager<'a>,
    pub certs: &'a CaCertStore,
    pub joiner: &'a dyn DomainJoiner,
    pub services: &'a dyn ServiceManager,
}

impl Engine<'_> {
    /// Execute `plan` for `current`.
    ///
    /// `current` is updated with the IPA joined marker when an IPA join
    /// succeeds.
    pub fn write(&self, current: &mut AuthSettings, plan: &WritePlan) -> WriteReport {
        let mut report = WriteReport::default();
        if plan.is_noop() {
            info!("No artifact changed, only the automatic backup is taken");
        } else {
            info!("{}", plan.summary());
        }

        // Taken even when nothing changed so `restore_last` always works
        report.backup_saved = self.backups.save_backup(LAST_BACKUP);
        if !report.backup_saved {
            warn!("Automatic backup failed, continuing with write");
        }

        if let Some(url) = &plan.cacert_url {
            if let Err(e) = self.certs.stage(url) {
                error!("{}", e);
                report.status = report.status.worst(ExitStatus::CaCert);
            }
        }
        if current.enable_ldap_tls && !self.certs.has_certificates() {
            warn!(
                "LDAP TLS is enabled but {} holds no CA certificate",
                self.certs.dir().display()
            );
        }
        if let Err(e) = self.certs.rehash() {
            warn!("CA certificate rehash failed: {}", e);
        }

        for artifact in &plan.artifacts {
            match store::persist(self.backend, current, *artifact) {
                Ok(()) => report.written.push(*artifact),
                Err(e) => {
                    error!("{}", e);
                    report.failed.push(*artifact);
                    report.status = report.status.worst(plan.mode.failure_status());
                }
            }
        }

        report.joins = join_domains(self.joiner, &plan.joins, current);
        if !report.joins.is_success() {
            report.status = report.status.worst(ExitStatus::Join);
        }
        if report.joins.ipa_joined {
            // The IPA client tool rewrites shared files; only the marker is re-persisted
            current.ipav2_joined = true;
            if let Err(e) = store::persist_settings(self.backend, current, &[SettingId::Ipav2Joined]) {
                error!("Cannot record IPA join: {}", e);
                report.status = report.status.worst(plan.mode.failure_status());
            }
        }

        report.service_failures = apply_services(self.services, &plan.services);

        info!("Write finished: {}", report);
        report
    }
}
