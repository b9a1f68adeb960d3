//! authconf library
//!
//! Reconciles requested authentication settings with the configuration on
//! disk, rewrites only the artifacts that changed, and manages backups and
//! domain joins around those writes.

pub mod backend;
pub mod backup;
pub mod capabilities;
pub mod certs;
pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod join;
pub mod logic;
pub mod probe;
pub mod sanity;
pub mod settings;
pub mod types;

// Re-export main types for convenience
pub use backend::{ConfigBackend, ShellVarsBackend};
pub use backup::{BackupManager, BackupManifest, LAST_BACKUP};
pub use capabilities::CapabilitySet;
pub use certs::CaCertStore;
pub use config::ToolConfig;
pub use error::{AuthconfError, ExitStatus, Result};
pub use join::{join_domains, CommandJoiner, DomainJoiner, JoinOutcome, JoinRequest};
pub use settings::artifact::Artifact;
pub use settings::{AuthSettings, SettingId};
pub use types::{JoinKind, PasswordAlgorithm, SmartcardAction, SmbSecurity};

// Requested changes and their resolution
pub use logic::changes::{ChangeSet, FlagKey, ValueKey};
pub use logic::resolver::{apply, KnownRealms, RealmDiscovery, Resolution, Severity, ValidationIssue};
pub use logic::services::{resolve_services, ServiceAction, ServiceManager, ServiceOp, SystemctlManager};

// Write engine
pub use engine::write::{calculate_write_plan, Engine, WriteMode, WritePlan, WriteReport};
