//! Requested changes
//!
//! A `ChangeSet` is the plain data handed from a front end to the resolver:
//! the boolean keys to enable, the boolean keys to disable and literal
//! key/value overrides. Request keys are closed enums so that an unknown key
//! is rejected when the request is built, not halfway through a run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{AuthconfError, Result};
use crate::settings::SettingId;

/// Boolean request key accepted by `--enable` / `--disable`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FlagKey {
    #[strum(to_string = "shadow", serialize = "useshadow")]
    Shadow,
    /// Shorthand for the md5 / descrypt password algorithm
    #[strum(to_string = "md5", serialize = "usemd5")]
    Md5,
    Nis,
    Ldap,
    LdapAuth,
    #[strum(to_string = "ldaptls", serialize = "ldapstarttls")]
    LdapTls,
    Rfc2307bis,
    Smartcard,
    RequireSmartcard,
    Fingerprint,
    Ecryptfs,
    Krb5,
    Krb5KdcDns,
    Krb5RealmDns,
    Winbind,
    WinbindAuth,
    WinbindUseDefaultDomain,
    WinbindOffline,
    WinbindKrb5,
    Ipav2,
    Ipav2NoNtp,
    Wins,
    PreferDns,
    Hesiod,
    Sssd,
    SssdAuth,
    ForceLegacy,
    CacheCreds,
    Cache,
    LocAuthorize,
    PamAccess,
    SysNetAuth,
    MkHomeDir,
    ReqLower,
    ReqUpper,
    ReqDigit,
    ReqOther,
    Faillock,
}

impl FlagKey {
    /// Setting toggled by this key. `Md5` drives the password algorithm
    /// instead and has none.
    pub const fn setting(self) -> Option<SettingId> {
        Some(match self {
            Self::Md5 => return None,
            Self::Shadow => SettingId::Shadow,
            Self::Nis => SettingId::Nis,
            Self::Ldap => SettingId::Ldap,
            Self::LdapAuth => SettingId::LdapAuth,
            Self::LdapTls => SettingId::LdapTls,
            Self::Rfc2307bis => SettingId::Rfc2307bis,
            Self::Smartcard => SettingId::Smartcard,
            Self::RequireSmartcard => SettingId::RequireSmartcard,
            Self::Fingerprint => SettingId::Fingerprint,
            Self::Ecryptfs => SettingId::Ecryptfs,
            Self::Krb5 => SettingId::Kerberos,
            Self::Krb5KdcDns => SettingId::KerberosKdcDns,
            Self::Krb5RealmDns => SettingId::KerberosRealmDns,
            Self::Winbind => SettingId::Winbind,
            Self::WinbindAuth => SettingId::WinbindAuth,
            Self::WinbindUseDefaultDomain => SettingId::WinbindUseDefaultDomain,
            Self::WinbindOffline => SettingId::WinbindOffline,
            Self::WinbindKrb5 => SettingId::WinbindKrb5,
            Self::Ipav2 => SettingId::Ipav2,
            Self::Ipav2NoNtp => SettingId::Ipav2NoNtp,
            Self::Wins => SettingId::Wins,
            Self::PreferDns => SettingId::PreferDns,
            Self::Hesiod => SettingId::Hesiod,
            Self::Sssd => SettingId::Sssd,
            Self::SssdAuth => SettingId::SssdAuth,
            Self::ForceLegacy => SettingId::ForceLegacy,
            Self::CacheCreds => SettingId::CacheCreds,
            Self::Cache => SettingId::Cache,
            Self::LocAuthorize => SettingId::LocAuthorize,
            Self::PamAccess => SettingId::PamAccess,
            Self::SysNetAuth => SettingId::SysNetAuth,
            Self::MkHomeDir => SettingId::MkHomeDir,
            Self::ReqLower => SettingId::PassReqLower,
            Self::ReqUpper => SettingId::PassReqUpper,
            Self::ReqDigit => SettingId::PassReqDigit,
            Self::ReqOther => SettingId::PassReqOther,
            Self::Faillock => SettingId::Faillock,
        })
    }
}

/// Literal request key accepted by `--set KEY=VALUE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueKey {
    PassAlgo,
    NisDomain,
    NisServer,
    LdapServer,
    LdapBaseDn,
    LdapLoadCacert,
    SmartcardModule,
    /// Numeric index into the removal action list
    SmartcardAction,
    Krb5Kdc,
    Krb5AdminServer,
    Krb5Realm,
    SmbSecurity,
    SmbRealm,
    SmbServers,
    SmbWorkgroup,
    #[strum(to_string = "smbidmaprange", serialize = "smbidmapuid", serialize = "smbidmapgid")]
    SmbIdmapRange,
    WinbindSeparator,
    WinbindTemplateHomedir,
    WinbindTemplateShell,
    /// `user%password` credentials for a winbind join
    WinbindJoin,
    Ipav2Domain,
    Ipav2Realm,
    Ipav2Server,
    /// User for an IPA join
    Ipav2Join,
    HesiodLhs,
    HesiodRhs,
    PassMinLen,
    PassMinClass,
    PassMaxRepeat,
    PassMaxClassRepeat,
    FaillockArgs,
}

impl ValueKey {
    /// Setting written verbatim from this key.
    ///
    /// Keys with dedicated resolver rules (algorithm, removal action, join
    /// credentials, security mode, numeric policy) return `None`.
    pub const fn plain_setting(self) -> Option<SettingId> {
        Some(match self {
            Self::NisDomain => SettingId::NisDomain,
            Self::NisServer => SettingId::NisServer,
            Self::LdapServer => SettingId::LdapServer,
            Self::LdapBaseDn => SettingId::LdapBaseDn,
            Self::LdapLoadCacert => SettingId::LdapCacertUrl,
            Self::SmartcardModule => SettingId::SmartcardModule,
            Self::Krb5Kdc => SettingId::KerberosKdc,
            Self::Krb5AdminServer => SettingId::KerberosAdminServer,
            Self::Krb5Realm => SettingId::KerberosRealm,
            Self::SmbRealm => SettingId::SmbRealm,
            Self::SmbServers => SettingId::SmbServers,
            Self::SmbWorkgroup => SettingId::SmbWorkgroup,
            Self::SmbIdmapRange => SettingId::SmbIdmapRange,
            Self::WinbindSeparator => SettingId::WinbindSeparator,
            Self::WinbindTemplateHomedir => SettingId::WinbindTemplateHomedir,
            Self::WinbindTemplateShell => SettingId::WinbindTemplateShell,
            Self::Ipav2Domain => SettingId::Ipav2Domain,
            Self::Ipav2Realm => SettingId::Ipav2Realm,
            Self::Ipav2Server => SettingId::Ipav2Server,
            Self::HesiodLhs => SettingId::HesiodLhs,
            Self::HesiodRhs => SettingId::HesiodRhs,
            Self::FaillockArgs => SettingId::FaillockArgs,
            Self::PassAlgo
            | Self::SmartcardAction
            | Self::SmbSecurity
            | Self::WinbindJoin
            | Self::Ipav2Join
            | Self::PassMinLen
            | Self::PassMinClass
            | Self::PassMaxRepeat
            | Self::PassMaxClassRepeat => return None,
        })
    }
}

/// Parse a `--enable`/`--disable` argument.
pub fn parse_flag_key(raw: &str) -> Result<FlagKey> {
    FlagKey::from_str(&raw.to_ascii_lowercase()).map_err(|_| {
        let known: Vec<String> = FlagKey::iter().map(|k| k.to_string()).collect();
        AuthconfError::usage(format!("unknown option '{}' (expected one of: {})", raw, known.join(", ")))
    })
}

/// Parse a `KEY=VALUE` argument. The value may be empty.
pub fn parse_assignment(raw: &str) -> Result<(ValueKey, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| AuthconfError::usage(format!("expected KEY=VALUE, got '{}'", raw)))?;
    let key = ValueKey::from_str(&key.trim().to_ascii_lowercase()).map_err(|_| {
        let known: Vec<String> = ValueKey::iter().map(|k| k.to_string()).collect();
        AuthconfError::usage(format!("unknown key '{}' (expected one of: {})", key, known.join(", ")))
    })?;
    Ok((key, value.to_string()))
}

/// One batch of requested changes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub enable: Vec<FlagKey>,
    pub disable: Vec<FlagKey>,
    pub values: Vec<(ValueKey, String)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(mut self, key: FlagKey) -> Self {
        self.enable.push(key);
        self
    }

    pub fn disable(mut self, key: FlagKey) -> Self {
        self.disable.push(key);
        self
    }

    pub fn set(mut self, key: ValueKey, value: impl Into<String>) -> Self {
        self.values.push((key, value.into()));
        self
    }

    pub fn is_enabled(&self, key: FlagKey) -> bool {
        self.enable.contains(&key)
    }

    pub fn is_disabled(&self, key: FlagKey) -> bool {
        self.disable.contains(&key)
    }

    /// Value given for `key`; the last occurrence wins.
    pub fn value(&self, key: ValueKey) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value given for `key`, treating an empty string as absent.
    pub fn non_empty(&self, key: ValueKey) -> Option<&str> {
        self.value(key).filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.enable.is_empty() && self.disable.is_empty() && self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_aliases() {
        assert_eq!(parse_flag_key("usemd5").unwrap(), FlagKey::Md5);
        assert_eq!(parse_flag_key("useshadow").unwrap(), FlagKey::Shadow);
        assert_eq!(parse_flag_key("ldapstarttls").unwrap(), FlagKey::LdapTls);
        assert_eq!(parse_flag_key("LDAPAUTH").unwrap(), FlagKey::LdapAuth);
        assert_eq!(FlagKey::LdapTls.to_string(), "ldaptls");
        assert!(parse_flag_key("telnet").is_err());
    }

    #[test]
    fn test_every_flag_but_md5_maps_to_a_flag_setting() {
        use crate::settings::ValueKind;
        for key in FlagKey::iter() {
            match key.setting() {
                Some(id) => assert_eq!(id.kind(), ValueKind::Flag, "{}", key),
                None => assert_eq!(key, FlagKey::Md5),
            }
        }
    }

    #[test]
    fn test_parse_assignment() {
        let (key, value) = parse_assignment("krb5realm=EXAMPLE.COM").unwrap();
        assert_eq!(key, ValueKey::Krb5Realm);
        assert_eq!(value, "EXAMPLE.COM");

        let (key, value) = parse_assignment("winbindjoin=admin%se=cret").unwrap();
        assert_eq!(key, ValueKey::WinbindJoin);
        assert_eq!(value, "admin%se=cret");

        assert_eq!(parse_assignment("smbidmapuid=16777216-33554431").unwrap().0, ValueKey::SmbIdmapRange);
        assert_eq!(parse_assignment("ldapserver=").unwrap().1, "");
        assert!(matches!(parse_assignment("ldapserver"), Err(AuthconfError::Usage(_))));
        assert!(matches!(parse_assignment("bogus=1"), Err(AuthconfError::Usage(_))));
    }

    #[test]
    fn test_last_value_wins() {
        let changes = ChangeSet::new()
            .set(ValueKey::NisDomain, "first")
            .set(ValueKey::NisDomain, "second");
        assert_eq!(changes.value(ValueKey::NisDomain), Some("second"));
        assert_eq!(changes.value(ValueKey::NisServer), None);
    }

    #[test]
    fn test_non_empty() {
        let changes = ChangeSet::new().set(ValueKey::PassAlgo, "");
        assert_eq!(changes.value(ValueKey::PassAlgo), Some(""));
        assert_eq!(changes.non_empty(ValueKey::PassAlgo), None);
        assert!(!changes.is_empty());
        assert!(ChangeSet::new().is_empty());
    }
}
