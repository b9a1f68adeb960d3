//! Domain Join Coordinator
//!
//! Joins run strictly after the configuration is written, since the join
//! tools read the freshly written samba and Kerberos settings. A failed join
//! never rolls back written configuration.

use serde::Serialize;
use tracing::{error, info};

use crate::command::{run_command, CommandArgs};
use crate::error::{AuthconfError, Result};
use crate::settings::AuthSettings;
use crate::types::{JoinKind, SmbSecurity};

/// A join requested by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRequest {
    pub kind: JoinKind,
    pub user: String,
    /// Absent when the credentials carried no `%password` part
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

/// Performs the join against the directory service.
pub trait DomainJoiner {
    fn join(&self, request: &JoinRequest, settings: &AuthSettings) -> Result<()>;
}

// ============================================================================
// Command arguments
// ============================================================================

/// `net [ads] join` for winbind
#[derive(Debug, Clone)]
pub struct NetJoinArgs {
    pub ads: bool,
    pub workgroup: String,
    pub realm: String,
    pub servers: String,
    pub user: String,
    pub password: Option<String>,
}

impl NetJoinArgs {
    pub fn from_request(request: &JoinRequest, settings: &AuthSettings) -> Self {
        Self {
            ads: settings.smb_security == Some(SmbSecurity::Ads),
            workgroup: settings.smb_workgroup.clone(),
            realm: settings.smb_realm.clone(),
            servers: settings.smb_servers.clone(),
            user: request.user.clone(),
            password: request.password.clone(),
        }
    }

    fn credentials(&self, password: Option<&str>) -> String {
        match password {
            Some(p) => format!("{}%{}", self.user, p),
            None => self.user.clone(),
        }
    }

    fn build(&self, password: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();
        if self.ads {
            args.push("ads".to_string());
        }
        args.push("join".to_string());
        if !self.workgroup.is_empty() {
            args.extend(["-w".to_string(), self.workgroup.clone()]);
        }
        if let Some(server) = self.servers.split([',', ' ']).find(|s| !s.is_empty()) {
            args.extend(["-S".to_string(), server.to_string()]);
        }
        if self.ads && !self.realm.is_empty() {
            args.push(format!("realm={}", self.realm));
        }
        args.extend(["-U".to_string(), self.credentials(password)]);
        args
    }
}

impl CommandArgs for NetJoinArgs {
    fn program(&self) -> String {
        "net".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        self.build(self.password.as_deref())
    }

    fn logged_args(&self) -> Vec<String> {
        self.build(self.password.as_ref().map(|_| "***"))
    }
}

/// `ipa-client-install` for IPAv2
#[derive(Debug, Clone)]
pub struct IpaJoinArgs {
    pub domain: String,
    pub realm: String,
    pub server: String,
    pub no_ntp: bool,
    pub user: String,
    pub password: Option<String>,
}

impl IpaJoinArgs {
    pub fn from_request(request: &JoinRequest, settings: &AuthSettings) -> Self {
        Self {
            domain: settings.ipav2_domain.clone(),
            realm: settings.ipav2_realm.clone(),
            server: settings.ipav2_server.clone(),
            no_ntp: settings.ipav2_no_ntp,
            user: request.user.clone(),
            password: request.password.clone(),
        }
    }

    fn build(&self, password: Option<&str>) -> Vec<String> {
        let mut args = vec!["--domain".to_string(), self.domain.clone()];
        if !self.realm.is_empty() {
            args.extend(["--realm".to_string(), self.realm.clone()]);
        }
        if !self.server.is_empty() {
            args.extend(["--server".to_string(), self.server.clone()]);
        }
        if !self.user.is_empty() {
            args.extend(["-p".to_string(), self.user.clone()]);
        }
        if let Some(p) = password {
            args.extend(["-w".to_string(), p.to_string()]);
        }
        args.push("-U".to_string());
        if self.no_ntp {
            args.push("--no-ntp".to_string());
        }
        args
    }
}

impl CommandArgs for IpaJoinArgs {
    fn program(&self) -> String {
        "/usr/sbin/ipa-client-install".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        self.build(self.password.as_deref())
    }

    fn logged_args(&self) -> Vec<String> {
        self.build(self.password.as_ref().map(|_| "***"))
    }
}

// ============================================================================
// Joiners
// ============================================================================

/// Joiner that runs the samba and IPA client tools
#[derive(Debug, Clone, Default)]
pub struct CommandJoiner;

impl DomainJoiner for CommandJoiner {
    fn join(&self, request: &JoinRequest, settings: &AuthSettings) -> Result<()> {
        let output = match request.kind {
            JoinKind::Winbind => run_command(&NetJoinArgs::from_request(request, settings))?,
            JoinKind::Ipa => {
                if settings.ipav2_domain.is_empty() {
                    return Err(AuthconfError::join("IPA domain is not set"));
                }
                run_command(&IpaJoinArgs::from_request(request, settings))?
            }
        };
        output
            .ensure_success(&format!("{} join", request.kind))
            .map_err(|e| AuthconfError::join(e.to_string()))
    }
}

/// Outcome of all requested joins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    pub failed: Vec<JoinKind>,
    /// An IPA join succeeded; the joined marker must be persisted
    pub ipa_joined: bool,
}

impl JoinOutcome {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every join in order; failures are logged and do not stop later joins.
pub fn join_domains(
    joiner: &dyn DomainJoiner,
    requests: &[JoinRequest],
    settings: &AuthSettings,
) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();
    for request in requests {
        info!("Joining {} domain as '{}'", request.kind, request.user);
        match joiner.join(request, settings) {
            Ok(()) => {
                info!("{} join succeeded", request.kind);
                if request.kind == JoinKind::Ipa {
                    outcome.ipa_joined = true;
                }
            }
            Err(e) => {
                error!("{} join failed: {}", request.kind, e);
                outcome.failed.push(request.kind);
            }
        }
    }
    outcome
}
