//! Service lifecycle resolution
//!
//! Translates the resolved settings into start/stop actions for the caching
//! and binding daemons. Services whose software is not installed are left
//! alone.
//!
//! # Resolution Rules
//!
//! | Service  | Running when |
//! |----------|--------------|
//! | nscd     | caching enabled and SSSD not in use |
//! | sssd     | SSSD in use |
//! | nslcd    | LDAP enabled and SSSD not in use |
//! | rpcbind  | NIS enabled (started before ypbind, never stopped) |
//! | ypbind   | NIS enabled |
//! | winbind  | winbind identity or authentication enabled |
//! | oddjobd  | home directory creation enabled |

use serde::Serialize;
use std::fmt;
use tracing::warn;

use crate::capabilities::CapabilitySet;
use crate::command::{run_command, CommandArgs};
use crate::error::Result;
use crate::settings::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceOp {
    /// Enable at boot and (re)start now
    Restart,
    /// Disable at boot and stop now
    Stop,
}

/// One service lifecycle step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceAction {
    pub service: &'static str,
    pub op: ServiceOp,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            ServiceOp::Restart => write!(f, "restart {}", self.service),
            ServiceOp::Stop => write!(f, "stop {}", self.service),
        }
    }
}

/// Resolve service actions for `settings`, in execution order.
pub fn resolve_services(settings: &AuthSettings, caps: &CapabilitySet) -> Vec<ServiceAction> {
    let uses_sssd = settings.uses_sssd(caps);
    let mut actions = Vec::new();
    let mut toggle = |service: &'static str, installed: bool, running: bool| {
        if installed {
            let op = if running { ServiceOp::Restart } else { ServiceOp::Stop };
            actions.push(ServiceAction { service, op });
        }
    };

    toggle("nscd", caps.cache, settings.uses_nscd(caps));
    toggle("sssd", caps.sssd, uses_sssd);
    toggle("nslcd", caps.ldap, settings.enable_ldap && !uses_sssd);
    if caps.nis && settings.enable_nis {
        toggle("rpcbind", true, true);
    }
    toggle("ypbind", caps.nis, settings.enable_nis);
    toggle(
        "winbind",
        caps.winbind,
        settings.enable_winbind || settings.enable_winbind_auth,
    );
    toggle("oddjobd", caps.oddjob, settings.enable_mkhomedir);

    actions
}

/// Applies service actions to the running system.
pub trait ServiceManager {
    fn apply(&self, action: &ServiceAction) -> Result<()>;
}

/// `systemctl` invocation
#[derive(Debug, Clone)]
struct SystemctlArgs {
    verb: &'static str,
    service: &'static str,
}

impl CommandArgs for SystemctlArgs {
    fn program(&self) -> String {
        "systemctl".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![self.verb.to_string(), format!("{}.service", self.service)]
    }
}

/// Service manager backed by systemd
#[derive(Debug, Clone, Default)]
pub struct SystemctlManager;

impl ServiceManager for SystemctlManager {
    fn apply(&self, action: &ServiceAction) -> Result<()> {
        let verbs: [&'static str; 2] = match action.op {
            ServiceOp::Restart => ["enable", "restart"],
            ServiceOp::Stop => ["disable", "stop"],
        };
        for verb in verbs {
            let args = SystemctlArgs {
                verb,
                service: action.service,
            };
            run_command(&args)?.ensure_success(&format!("systemctl {} {}", verb, action.service))?;
        }
        Ok(())
    }
}

/// Apply every action, logging failures and continuing.
///
/// Returns the number of actions that failed.
pub fn apply_services(manager: &dyn ServiceManager, actions: &[ServiceAction]) -> usize {
    let mut failures = 0;
    for action in actions {
        if let Err(e) = manager.apply(action) {
            warn!("Failed to {}: {}", action, e);
            failures += 1;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthconfError;
    use std::cell::RefCell;

    fn names(actions: &[ServiceAction], op: ServiceOp) -> Vec<&'static str> {
        actions.iter().filter(|a| a.op == op).map(|a| a.service).collect()
    }

    #[test]
    fn test_nothing_installed_nothing_to_do() {
        let mut s = AuthSettings::default();
        s.enable_nis = true;
        s.enable_cache = true;
        assert!(resolve_services(&s, &CapabilitySet::default()).is_empty());
    }

    #[test]
    fn test_ldap_via_sssd_stops_nslcd_and_nscd() {
        let mut s = AuthSettings::default();
        s.enable_ldap = true;
        s.enable_cache = true;
        let actions = resolve_services(&s, &CapabilitySet::all());
        assert_eq!(names(&actions, ServiceOp::Restart), vec!["sssd"]);
        assert!(names(&actions, ServiceOp::Stop).contains(&"nslcd"));
        assert!(names(&actions, ServiceOp::Stop).contains(&"nscd"));
    }

    #[test]
    fn test_legacy_ldap_uses_nslcd() {
        let mut s = AuthSettings::default();
        s.enable_ldap = true;
        s.enable_force_legacy = true;
        s.enable_cache = true;
        let actions = resolve_services(&s, &CapabilitySet::all());
        assert_eq!(names(&actions, ServiceOp::Restart), vec!["nscd", "nslcd"]);
    }

    #[test]
    fn test_rpcbind_started_before_ypbind() {
        let mut s = AuthSettings::default();
        s.enable_nis = true;
        let actions = resolve_services(&s, &CapabilitySet::all());
        let restart = names(&actions, ServiceOp::Restart);
        assert_eq!(restart, vec!["rpcbind", "ypbind"]);
    }

    struct Recording {
        fail: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl ServiceManager for Recording {
        fn apply(&self, action: &ServiceAction) -> Result<()> {
            self.seen.borrow_mut().push(action.to_string());
            if action.service == self.fail {
                return Err(AuthconfError::command("boom"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_apply_services_continues_after_failure() {
        let manager = Recording {
            fail: "nscd",
            seen: RefCell::new(Vec::new()),
        };
        let actions = [
            ServiceAction { service: "nscd", op: ServiceOp::Stop },
            ServiceAction { service: "sssd", op: ServiceOp::Restart },
        ];
        assert_eq!(apply_services(&manager, &actions), 1);
        assert_eq!(*manager.seen.borrow(), vec!["stop nscd", "restart sssd"]);
    }

    #[test]
    fn test_systemctl_args() {
        let args = SystemctlArgs { verb: "restart", service: "sssd" };
        assert_eq!(args.to_cli_args(), vec!["restart", "sssd.service"]);
    }
}
