//! Override Resolver
//!
//! Merges a `ChangeSet` into the working settings snapshot.
//!
//! # Design
//!
//! - **Never aborts**: every rule degrades to "skip this field"; problems are
//!   collected as `ValidationIssue`s and logged as they occur
//! - **Fixed rule order**: enables before disables, so disable wins
//! - **Explicit beats derived**: a KDC or admin server given in the same batch
//!   overrides what realm discovery found
//!
//! # Resolution Rules
//!
//! | Rule | Effect |
//! |------|--------|
//! | Unavailable subsystem enabled | Warning, flag still set |
//! | `enable` then `disable` | Disable wins on conflict |
//! | New `krb5realm` | KDC/admin server looked up for the realm |
//! | Numeric policy values | Rejected values leave the setting unchanged |
//! | `winbindjoin=user%pass` | Split on first `%` into a join request |
//! | `smartcardaction=N` | Index into the removal action list |
//! | `requiresmartcard` + module `sssd` | Flag cleared, warning |
//! | Unknown `passalgo` | Falls back to sha256, error |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{error, warn};

use crate::capabilities::CapabilitySet;
use crate::error::ExitStatus;
use crate::join::JoinRequest;
use crate::logic::changes::{ChangeSet, FlagKey, ValueKey};
use crate::settings::{AuthSettings, RealmHosts, SSSD_SMARTCARD_MODULE};
use crate::types::{JoinKind, PasswordAlgorithm, SmartcardAction, SmbSecurity};

// ============================================================================
// Issues
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported only; does not change the exit status
    Warning,
    /// Field dropped; the run ends with a validation status
    Error,
}

/// A problem found while applying one requested change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Request key the issue is about
    pub key: String,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Outcome of applying a `ChangeSet`
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub issues: Vec<ValidationIssue>,
    /// Joins to perform once the configuration is written
    pub joins: Vec<JoinRequest>,
}

impl Resolution {
    fn warn(&mut self, key: impl fmt::Display, message: impl Into<String>) {
        let issue = ValidationIssue {
            key: key.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        };
        warn!("{}", issue);
        self.issues.push(issue);
    }

    fn reject(&mut self, key: impl fmt::Display, message: impl Into<String>) {
        let issue = ValidationIssue {
            key: key.to_string(),
            message: message.into(),
            severity: Severity::Error,
        };
        error!("{}", issue);
        self.issues.push(issue);
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// `Validation` if any change was rejected, otherwise `Success`.
    pub fn status(&self) -> ExitStatus {
        if self.errors().next().is_some() {
            ExitStatus::Validation
        } else {
            ExitStatus::Success
        }
    }
}

// ============================================================================
// Realm discovery
// ============================================================================

/// Looks up the KDC and admin server of a Kerberos realm.
pub trait RealmDiscovery {
    fn kdc(&self, realm: &str) -> Option<String>;
    fn admin_server(&self, realm: &str) -> Option<String>;
}

/// Discovery against the realms already configured on the host
#[derive(Debug, Clone, Default)]
pub struct KnownRealms(BTreeMap<String, RealmHosts>);

impl KnownRealms {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self(settings.kerberos_realms.clone())
    }
}

impl RealmDiscovery for KnownRealms {
    fn kdc(&self, realm: &str) -> Option<String> {
        self.0.get(realm).map(|h| h.kdc.clone()).filter(|s| !s.is_empty())
    }

    fn admin_server(&self, realm: &str) -> Option<String> {
        self.0.get(realm).map(|h| h.admin_server.clone()).filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Apply
// ============================================================================

/// Apply `changes` to `current`.
pub fn apply(
    current: &mut AuthSettings,
    changes: &ChangeSet,
    caps: &CapabilitySet,
    realms: &dyn RealmDiscovery,
) -> Resolution {
    let mut res = Resolution::default();

    // 1. Availability warnings, then enable before disable
    for key in &changes.enable {
        if !is_available(*key, caps) {
            res.warn(key, "the required modules are not installed on this system");
        }
    }
    for key in &changes.enable {
        if let Some(id) = key.setting() {
            current.set_flag(id, true);
        }
    }
    for key in &changes.disable {
        if let Some(id) = key.setting() {
            current.set_flag(id, false);
        }
    }

    // 2. Realm change triggers KDC/admin server discovery
    if let Some(realm) = changes.non_empty(ValueKey::Krb5Realm) {
        if realm != current.kerberos_realm {
            current.kerberos_kdc = realms.kdc(realm).unwrap_or_default();
            current.kerberos_admin_server = realms.admin_server(realm).unwrap_or_default();
        }
    }

    // 3. Numeric password policy
    apply_number(&mut res, changes, ValueKey::PassMinLen, 6, None, &mut current.pass_min_len);
    apply_number(&mut res, changes, ValueKey::PassMinClass, 0, Some(4), &mut current.pass_min_class);
    apply_number(&mut res, changes, ValueKey::PassMaxRepeat, 0, None, &mut current.pass_max_repeat);
    apply_number(
        &mut res,
        changes,
        ValueKey::PassMaxClassRepeat,
        0,
        None,
        &mut current.pass_max_class_repeat,
    );

    // 4. Verbatim values; explicit KDC/admin server land after discovery
    for (key, value) in &changes.values {
        if let Some(id) = key.plain_setting() {
            if value.chars().any(char::is_control) {
                res.reject(key, "value must not contain control characters");
                continue;
            }
            if let Err(e) = current.assign(id, value) {
                res.reject(key, e);
            }
        }
    }

    if let Some(raw) = changes.value(ValueKey::SmbSecurity) {
        if raw.trim().is_empty() {
            current.smb_security = None;
        } else {
            match SmbSecurity::from_str(&raw.trim().to_ascii_lowercase()) {
                Ok(security) => current.smb_security = Some(security),
                Err(_) => res.reject(ValueKey::SmbSecurity, format!("unknown security mode '{}'", raw)),
            }
        }
    }

    // 5. Join credentials
    if let Some(creds) = changes.non_empty(ValueKey::WinbindJoin) {
        let (user, password) = match creds.split_once('%') {
            Some((user, password)) => (user, Some(password.to_string())),
            None => (creds, None),
        };
        res.joins.push(JoinRequest {
            kind: JoinKind::Winbind,
            user: user.to_string(),
            password,
        });
    }
    if let Some(user) = changes.value(ValueKey::Ipav2Join) {
        res.joins.push(JoinRequest {
            kind: JoinKind::Ipa,
            user: user.to_string(),
            password: None,
        });
    }

    // 6. Smart card removal action selector
    if let Some(raw) = changes.non_empty(ValueKey::SmartcardAction) {
        match raw.trim().parse::<usize>().ok().and_then(SmartcardAction::from_index) {
            Some(action) => current.smartcard_action = Some(action),
            None => {
                res.reject(
                    ValueKey::SmartcardAction,
                    format!(
                        "bad smart card removal action '{}', expected {}",
                        raw,
                        SmartcardAction::selector_help()
                    ),
                );
                current.smartcard_action = None;
            }
        }
    }

    // 7. The sssd smart card module enforces the policy itself
    if changes.is_enabled(FlagKey::RequireSmartcard)
        && current.force_smartcard
        && current.smartcard_module == SSSD_SMARTCARD_MODULE
    {
        res.warn(
            FlagKey::RequireSmartcard,
            format!("not supported for module '{}', option is ignored", SSSD_SMARTCARD_MODULE),
        );
        current.force_smartcard = false;
    }

    // 8. Password algorithm; md5 shorthand only without an explicit algorithm
    match changes.non_empty(ValueKey::PassAlgo) {
        None => {
            if changes.is_enabled(FlagKey::Md5) {
                current.password_algorithm = PasswordAlgorithm::Md5;
            }
            if changes.is_disabled(FlagKey::Md5) {
                current.password_algorithm = PasswordAlgorithm::Descrypt;
            }
        }
        Some(name) => match PasswordAlgorithm::from_str(&name.trim().to_ascii_lowercase()) {
            Ok(algorithm) => current.password_algorithm = algorithm,
            Err(_) => {
                res.reject(
                    ValueKey::PassAlgo,
                    format!(
                        "unknown password hashing algorithm '{}' (known: {}), using {}",
                        name,
                        PasswordAlgorithm::names().join(", "),
                        PasswordAlgorithm::FALLBACK
                    ),
                );
                current.password_algorithm = PasswordAlgorithm::FALLBACK;
            }
        },
    }

    current.update_derived();
    res
}

fn apply_number(
    res: &mut Resolution,
    changes: &ChangeSet,
    key: ValueKey,
    min: i64,
    max: Option<i64>,
    slot: &mut Option<u32>,
) {
    let Some(raw) = changes.value(key) else {
        return;
    };
    let value = match raw.trim().parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            res.reject(key, format!("value '{}' is not an integer", raw));
            return;
        }
    };
    if value < min {
        if min == 0 {
            res.reject(key, "value must not be negative");
        } else {
            res.reject(key, format!("minimum value is {}", min));
        }
        return;
    }
    if let Some(max) = max.filter(|max| value > *max) {
        res.reject(key, format!("value must not be higher than {}", max));
        return;
    }
    match u32::try_from(value) {
        Ok(v) => *slot = Some(v),
        Err(_) => res.reject(key, format!("value {} is out of range", value)),
    }
}

/// Returns true if a subsystem enabled by `key` can work on this host.
///
/// LDAP and Kerberos are served by either their legacy modules or SSSD.
fn is_available(key: FlagKey, caps: &CapabilitySet) -> bool {
    match key {
        FlagKey::Nis => caps.nis,
        FlagKey::Krb5 => caps.kerberos || caps.sssd,
        FlagKey::Ldap | FlagKey::LdapAuth => caps.ldap || caps.sssd,
        FlagKey::Sssd | FlagKey::SssdAuth => caps.sssd,
        FlagKey::Cache => caps.cache,
        FlagKey::Fingerprint => caps.fprintd,
        FlagKey::Winbind | FlagKey::WinbindAuth => caps.winbind,
        FlagKey::Ipav2 => caps.ipa,
        _ => true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(current: &mut AuthSettings, changes: &ChangeSet) -> Resolution {
        apply(current, changes, &CapabilitySet::all(), &KnownRealms::default())
    }

    #[test]
    fn test_disable_wins_over_enable() {
        let mut s = AuthSettings::default();
        let changes = ChangeSet::new()
            .enable(FlagKey::Nis)
            .disable(FlagKey::Nis)
            .enable(FlagKey::Ldap);
        let res = resolve(&mut s, &changes);
        assert!(!s.enable_nis);
        assert!(s.enable_ldap);
        assert_eq!(res.status(), ExitStatus::Success);
    }

    #[test]
    fn test_passminlen_bounds() {
        let mut s = AuthSettings::default();
        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::PassMinLen, "5"));
        assert_eq!(s.pass_min_len, None);
        assert_eq!(res.status(), ExitStatus::Validation);

        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::PassMinLen, "6"));
        assert_eq!(s.pass_min_len, Some(6));
        assert_eq!(res.status(), ExitStatus::Success);

        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::PassMinLen, "abc"));
        assert_eq!(s.pass_min_len, Some(6), "rejected value keeps current");
        assert!(res.issues[0].message.contains("not an integer"));
    }

    #[test]
    fn test_passminclass_range_and_batch_continues() {
        let mut s = AuthSettings::default();
        let changes = ChangeSet::new()
            .set(ValueKey::PassMinClass, "5")
            .set(ValueKey::PassMaxRepeat, "-1")
            .set(ValueKey::PassMaxClassRepeat, "2")
            .set(ValueKey::NisDomain, "example");
        let res = resolve(&mut s, &changes);
        assert_eq!(s.pass_min_class, None);
        assert_eq!(s.pass_max_repeat, None);
        assert_eq!(s.pass_max_class_repeat, Some(2));
        assert_eq!(s.nis_domain, "example");
        assert_eq!(res.errors().count(), 2);
    }

    #[test]
    fn test_unknown_algorithm_falls_back() {
        let mut s = AuthSettings::default();
        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::PassAlgo, "rot13"));
        assert_eq!(s.password_algorithm, PasswordAlgorithm::Sha256);
        assert_eq!(res.status(), ExitStatus::Validation);
        assert!(res.issues[0].message.contains("known: descrypt, bigcrypt, md5, sha256, sha512"));
    }

    #[test]
    fn test_md5_shorthand_only_without_passalgo() {
        let mut s = AuthSettings::default();
        resolve(&mut s, &ChangeSet::new().enable(FlagKey::Md5));
        assert_eq!(s.password_algorithm, PasswordAlgorithm::Md5);

        resolve(&mut s, &ChangeSet::new().disable(FlagKey::Md5));
        assert_eq!(s.password_algorithm, PasswordAlgorithm::Descrypt);

        let changes = ChangeSet::new()
            .enable(FlagKey::Md5)
            .set(ValueKey::PassAlgo, "sha512");
        resolve(&mut s, &changes);
        assert_eq!(s.password_algorithm, PasswordAlgorithm::Sha512);
    }

    #[test]
    fn test_winbind_join_split_on_first_percent() {
        let mut s = AuthSettings::default();
        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::WinbindJoin, "admin%p%ss"));
        assert_eq!(res.joins.len(), 1);
        assert_eq!(res.joins[0].kind, JoinKind::Winbind);
        assert_eq!(res.joins[0].user, "admin");
        assert_eq!(res.joins[0].password.as_deref(), Some("p%ss"));

        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::WinbindJoin, "admin"));
        assert_eq!(res.joins[0].password, None);
        assert_eq!(res.status(), ExitStatus::Success);
    }

    #[test]
    fn test_ipa_join_user_only() {
        let mut s = AuthSettings::default();
        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::Ipav2Join, "admin"));
        assert_eq!(res.joins[0].kind, JoinKind::Ipa);
        assert_eq!(res.joins[0].user, "admin");
        assert_eq!(res.joins[0].password, None);
    }

    #[test]
    fn test_smartcard_action_selector() {
        let mut s = AuthSettings::default();
        resolve(&mut s, &ChangeSet::new().set(ValueKey::SmartcardAction, "1"));
        assert_eq!(s.smartcard_action, Some(SmartcardAction::Ignore));

        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::SmartcardAction, "7"));
        assert_eq!(s.smartcard_action, None);
        assert_eq!(res.status(), ExitStatus::Validation);

        s.smartcard_action = Some(SmartcardAction::Lock);
        resolve(&mut s, &ChangeSet::new().set(ValueKey::SmartcardAction, "lock"));
        assert_eq!(s.smartcard_action, None);
    }

    #[test]
    fn test_require_smartcard_rejected_for_sssd_module() {
        let mut s = AuthSettings::default();
        let changes = ChangeSet::new()
            .enable(FlagKey::RequireSmartcard)
            .set(ValueKey::SmartcardModule, "sssd");
        let res = resolve(&mut s, &changes);
        assert!(!s.force_smartcard);
        assert_eq!(s.smartcard_module, "sssd");
        assert_eq!(res.issues.len(), 1);
        assert_eq!(res.issues[0].severity, Severity::Warning);

        let changes = ChangeSet::new()
            .enable(FlagKey::RequireSmartcard)
            .set(ValueKey::SmartcardModule, "coolkey");
        resolve(&mut s, &changes);
        assert!(s.force_smartcard);
    }

    #[test]
    fn test_realm_change_discovers_hosts() {
        let mut known = AuthSettings::default();
        known.kerberos_realm = "EXAMPLE.COM".into();
        known.kerberos_kdc = "kdc.example.com".into();
        known.kerberos_admin_server = "admin.example.com".into();
        known.update_derived();
        let realms = KnownRealms::from_settings(&known);

        let mut s = AuthSettings::default();
        s.kerberos_kdc = "old-kdc".into();
        let changes = ChangeSet::new().set(ValueKey::Krb5Realm, "EXAMPLE.COM");
        apply(&mut s, &changes, &CapabilitySet::all(), &realms);
        assert_eq!(s.kerberos_realm, "EXAMPLE.COM");
        assert_eq!(s.kerberos_kdc, "kdc.example.com");
        assert_eq!(s.kerberos_admin_server, "admin.example.com");
    }

    #[test]
    fn test_explicit_kdc_beats_discovery() {
        let mut s = AuthSettings::default();
        let changes = ChangeSet::new()
            .set(ValueKey::Krb5Realm, "OTHER.ORG")
            .set(ValueKey::Krb5Kdc, "kdc.other.org");
        let res = resolve(&mut s, &changes);
        assert_eq!(s.kerberos_kdc, "kdc.other.org");
        assert_eq!(s.kerberos_admin_server, "", "unknown realm leaves field blank");
        assert!(res.issues.is_empty());
        assert!(s.kerberos_realms.contains_key("OTHER.ORG"));
    }

    #[test]
    fn test_rfc2307bis_derives_schema() {
        let mut s = AuthSettings::default();
        resolve(&mut s, &ChangeSet::new().enable(FlagKey::Rfc2307bis));
        assert_eq!(s.ldap_schema, "rfc2307bis");
        resolve(&mut s, &ChangeSet::new().disable(FlagKey::Rfc2307bis));
        assert_eq!(s.ldap_schema, "");
    }

    #[test]
    fn test_unavailable_subsystem_warns_but_applies() {
        let mut s = AuthSettings::default();
        let caps = CapabilitySet { sssd: true, ..Default::default() };
        let changes = ChangeSet::new()
            .enable(FlagKey::Nis)
            .enable(FlagKey::Ldap)
            .enable(FlagKey::Fingerprint);
        let res = apply(&mut s, &changes, &caps, &KnownRealms::default());
        assert!(s.enable_nis);
        assert!(s.enable_fprintd);
        let keys: Vec<&str> = res.issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["nis", "fingerprint"]);
        assert_eq!(res.status(), ExitStatus::Success);
    }

    #[test]
    fn test_bad_smb_security_rejected() {
        let mut s = AuthSettings::default();
        let res = resolve(&mut s, &ChangeSet::new().set(ValueKey::SmbSecurity, "share"));
        assert_eq!(s.smb_security, None);
        assert_eq!(res.status(), ExitStatus::Validation);
        resolve(&mut s, &ChangeSet::new().set(ValueKey::SmbSecurity, "ADS"));
        assert_eq!(s.smb_security, Some(SmbSecurity::Ads));
    }

    #[test]
    fn test_require_smartcard_enabled_and_disabled_is_silent() {
        let mut s = AuthSettings::default();
        let changes = ChangeSet::new()
            .enable(FlagKey::RequireSmartcard)
            .disable(FlagKey::RequireSmartcard)
            .set(ValueKey::SmartcardModule, "sssd");
        let res = resolve(&mut s, &changes);
        assert!(!s.force_smartcard);
        assert!(res.issues.is_empty());
    }

    #[test]
    fn test_control_characters_rejected() {
        let mut s = AuthSettings::default();
        s.faillock_args = "deny=3".into();
        let changes = ChangeSet::new()
            .set(ValueKey::FaillockArgs, "deny=4\nUSESHADOW=no")
            .set(ValueKey::NisDomain, "corp");
        let res = resolve(&mut s, &changes);
        assert_eq!(s.faillock_args, "deny=3");
        assert_eq!(s.nis_domain, "corp");
        assert_eq!(res.status(), ExitStatus::Validation);
    }
}
