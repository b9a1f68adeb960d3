//! The authentication settings model.
//!
//! `AuthSettings` is one snapshot of every configurable attribute. A run
//! loads one pristine snapshot, clones it into a working copy, lets the
//! resolver mutate the copy and then diffs the two to decide which
//! artifacts must be rewritten.
//!
//! Settings are addressed through `SettingId`, a static table generated by
//! `setting_table!`: each entry names the struct field, its value kind, the
//! variable name it is persisted under, its display group and the artifacts
//! that own it. The first owner is the artifact the value is loaded from.

pub mod artifact;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::capabilities::CapabilitySet;
use crate::types::{PasswordAlgorithm, SmartcardAction, SmbSecurity};
use artifact::Artifact;

/// KDC and admin server known for one Kerberos realm
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmHosts {
    pub kdc: String,
    pub admin_server: String,
}

/// Complete in-memory authentication configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    // Shadow & password policy
    pub enable_shadow: bool,
    pub password_algorithm: PasswordAlgorithm,
    pub pass_min_len: Option<u32>,
    pub pass_min_class: Option<u32>,
    pub pass_max_repeat: Option<u32>,
    pub pass_max_class_repeat: Option<u32>,
    pub pass_req_lower: bool,
    pub pass_req_upper: bool,
    pub pass_req_digit: bool,
    pub pass_req_other: bool,
    pub enable_faillock: bool,
    pub faillock_args: String,

    // NIS
    pub enable_nis: bool,
    pub nis_domain: String,
    pub nis_server: String,

    // LDAP
    pub enable_ldap: bool,
    pub enable_ldap_auth: bool,
    pub ldap_server: String,
    pub ldap_base_dn: String,
    pub enable_ldap_tls: bool,
    pub enable_rfc2307bis: bool,
    /// Derived from `enable_rfc2307bis` by `update_derived`
    pub ldap_schema: String,
    /// Transient: only drives certificate staging, never persisted
    pub ldap_cacert_url: String,

    // Kerberos
    pub enable_kerberos: bool,
    pub kerberos_realm: String,
    pub kerberos_kdc: String,
    pub kerberos_admin_server: String,
    pub kerberos_kdc_via_dns: bool,
    pub kerberos_realm_via_dns: bool,
    /// Every realm the Kerberos artifact knows about
    pub kerberos_realms: BTreeMap<String, RealmHosts>,

    // Winbind / Samba
    pub enable_winbind: bool,
    pub enable_winbind_auth: bool,
    pub smb_security: Option<SmbSecurity>,
    pub smb_realm: String,
    pub smb_servers: String,
    pub smb_workgroup: String,
    pub smb_idmap_range: String,
    pub winbind_separator: String,
    pub winbind_template_homedir: String,
    pub winbind_template_shell: String,
    pub winbind_use_default_domain: bool,
    pub winbind_offline: bool,
    pub winbind_krb5: bool,

    // IPAv2
    pub enable_ipav2: bool,
    pub ipav2_domain: String,
    pub ipav2_realm: String,
    pub ipav2_server: String,
    pub ipav2_no_ntp: bool,
    pub ipav2_joined: bool,

    // Host name resolution
    pub enable_wins: bool,
    pub prefer_dns_in_hosts: bool,

    // Hesiod
    pub enable_hesiod: bool,
    pub hesiod_lhs: String,
    pub hesiod_rhs: String,

    // SSSD
    pub enable_sssd: bool,
    pub enable_sssd_auth: bool,
    pub enable_force_legacy: bool,
    pub enable_cache_creds: bool,

    // Caching
    pub enable_cache: bool,

    // Local access control
    pub enable_loc_authorize: bool,
    pub enable_pam_access: bool,
    pub enable_sys_net_auth: bool,
    pub enable_mkhomedir: bool,
    pub enable_ecryptfs: bool,

    // Smart card & fingerprint
    pub enable_smartcard: bool,
    pub force_smartcard: bool,
    pub smartcard_module: String,
    pub smartcard_action: Option<SmartcardAction>,
    pub enable_fprintd: bool,
}

/// Display group a setting is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Group {
    #[strum(serialize = "Password policy")]
    Password,
    #[strum(serialize = "NIS")]
    Nis,
    #[strum(serialize = "LDAP")]
    Ldap,
    #[strum(serialize = "Kerberos")]
    Kerberos,
    #[strum(serialize = "Winbind")]
    Winbind,
    #[strum(serialize = "IPAv2")]
    Ipav2,
    #[strum(serialize = "Host resolution")]
    Hosts,
    #[strum(serialize = "Hesiod")]
    Hesiod,
    #[strum(serialize = "SSSD")]
    Sssd,
    #[strum(serialize = "Caching")]
    Cache,
    #[strum(serialize = "Local access")]
    Access,
    #[strum(serialize = "Smart card & fingerprint")]
    Smartcard,
}

/// Semantic type of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Flag,
    Text,
    Number,
    Algorithm,
    Security,
    Action,
}

/// Borrowed view of one setting's value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingRef<'a> {
    Flag(&'a bool),
    Text(&'a String),
    Number(&'a Option<u32>),
    Algorithm(&'a PasswordAlgorithm),
    Security(&'a Option<SmbSecurity>),
    Action(&'a Option<SmartcardAction>),
}

impl SettingRef<'_> {
    /// Canonical text form, as persisted by the backend.
    pub fn render(&self) -> String {
        match self {
            Self::Flag(b) => if **b { "yes" } else { "no" }.to_string(),
            Self::Text(s) => (*s).clone(),
            Self::Number(n) => n.map(|n| n.to_string()).unwrap_or_default(),
            Self::Algorithm(a) => a.to_string(),
            Self::Security(s) => s.map(|s| s.to_string()).unwrap_or_default(),
            Self::Action(a) => a.map(|a| a.to_string()).unwrap_or_default(),
        }
    }
}

/// Mutable handle on one setting
#[derive(Debug)]
pub enum SlotMut<'a> {
    Flag(&'a mut bool),
    Text(&'a mut String),
    Number(&'a mut Option<u32>),
    Algorithm(&'a mut PasswordAlgorithm),
    Security(&'a mut Option<SmbSecurity>),
    Action(&'a mut Option<SmartcardAction>),
}

macro_rules! setting_table {
    ($( $id:ident => $field:ident: $kind:ident, $var:literal, $group:ident, [$($owner:ident),*]; )*) => {
        /// Identifier of every setting in `AuthSettings`
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
        #[strum(serialize_all = "snake_case")]
        pub enum SettingId {
            $( $id, )*
        }

        impl SettingId {
            /// Variable name the setting is persisted under
            pub const fn var_name(self) -> &'static str {
                match self { $( Self::$id => $var, )* }
            }

            /// Field name in `AuthSettings`
            pub const fn field_name(self) -> &'static str {
                match self { $( Self::$id => stringify!($field), )* }
            }

            pub const fn kind(self) -> ValueKind {
                match self { $( Self::$id => ValueKind::$kind, )* }
            }

            pub const fn group(self) -> Group {
                match self { $( Self::$id => Group::$group, )* }
            }

            /// Artifacts whose content depends on this setting
            pub const fn owners(self) -> &'static [Artifact] {
                match self { $( Self::$id => &[$(Artifact::$owner),*], )* }
            }
        }

        impl AuthSettings {
            /// Borrow the value of one setting.
            pub fn value(&self, id: SettingId) -> SettingRef<'_> {
                match id { $( SettingId::$id => SettingRef::$kind(&self.$field), )* }
            }

            /// Mutable handle on one setting.
            pub fn slot_mut(&mut self, id: SettingId) -> SlotMut<'_> {
                match id { $( SettingId::$id => SlotMut::$kind(&mut self.$field), )* }
            }
        }
    };
}

setting_table! {
    Shadow => enable_shadow: Flag, "USESHADOW", Password, [Sysconfig, Pam];
    PasswordAlgorithm => password_algorithm: Algorithm, "PASSWDALGORITHM", Password, [Sysconfig, Pam, LoginDefs, Libuser];
    PassMinLen => pass_min_len: Number, "PASSMINLEN", Password, [Pwquality];
    PassMinClass => pass_min_class: Number, "PASSMINCLASS", Password, [Pwquality];
    PassMaxRepeat => pass_max_repeat: Number, "PASSMAXREPEAT", Password, [Pwquality];
    PassMaxClassRepeat => pass_max_class_repeat: Number, "PASSMAXCLASSREPEAT", Password, [Pwquality];
    PassReqLower => pass_req_lower: Flag, "PASSREQLOWER", Password, [Pwquality];
    PassReqUpper => pass_req_upper: Flag, "PASSREQUPPER", Password, [Pwquality];
    PassReqDigit => pass_req_digit: Flag, "PASSREQDIGIT", Password, [Pwquality];
    PassReqOther => pass_req_other: Flag, "PASSREQOTHER", Password, [Pwquality];
    Faillock => enable_faillock: Flag, "USEFAILLOCK", Password, [Sysconfig, Pam];
    FaillockArgs => faillock_args: Text, "FAILLOCKARGS", Password, [Sysconfig, Pam];

    Nis => enable_nis: Flag, "USENIS", Nis, [Sysconfig, Nsswitch, Pam];
    NisDomain => nis_domain: Text, "NISDOMAIN", Nis, [Yp, Network];
    NisServer => nis_server: Text, "NISSERVER", Nis, [Yp];

    Ldap => enable_ldap: Flag, "USELDAP", Ldap, [Sysconfig, Nsswitch, Sssd];
    LdapAuth => enable_ldap_auth: Flag, "USELDAPAUTH", Ldap, [Sysconfig, Pam, Sssd];
    LdapServer => ldap_server: Text, "LDAPSERVER", Ldap, [Ldap, Nslcd, Sssd];
    LdapBaseDn => ldap_base_dn: Text, "LDAPBASEDN", Ldap, [Ldap, Nslcd, Sssd];
    LdapTls => enable_ldap_tls: Flag, "LDAPTLS", Ldap, [Ldap, Nslcd, Sssd];
    Rfc2307bis => enable_rfc2307bis: Flag, "USERFC2307BIS", Ldap, [Sysconfig, Nslcd, Sssd];
    LdapSchema => ldap_schema: Text, "LDAPSCHEMA", Ldap, [Nslcd, Sssd];
    LdapCacertUrl => ldap_cacert_url: Text, "LDAPCACERTURL", Ldap, [];

    Kerberos => enable_kerberos: Flag, "USEKERBEROS", Kerberos, [Sysconfig, Pam, Sssd];
    KerberosRealm => kerberos_realm: Text, "KRB5REALM", Kerberos, [Krb5, Sssd];
    KerberosKdc => kerberos_kdc: Text, "KRB5KDC", Kerberos, [Krb5, Sssd];
    KerberosAdminServer => kerberos_admin_server: Text, "KRB5ADMINSERVER", Kerberos, [Krb5, Sssd];
    KerberosKdcDns => kerberos_kdc_via_dns: Flag, "KRB5KDCDNS", Kerberos, [Krb5];
    KerberosRealmDns => kerberos_realm_via_dns: Flag, "KRB5REALMDNS", Kerberos, [Krb5];

    Winbind => enable_winbind: Flag, "USEWINBIND", Winbind, [Sysconfig, Nsswitch];
    WinbindAuth => enable_winbind_auth: Flag, "USEWINBINDAUTH", Winbind, [Sysconfig, Pam];
    SmbSecurity => smb_security: Security, "SMBSECURITY", Winbind, [Samba];
    SmbRealm => smb_realm: Text, "SMBREALM", Winbind, [Samba];
    SmbServers => smb_servers: Text, "SMBSERVERS", Winbind, [Samba];
    SmbWorkgroup => smb_workgroup: Text, "SMBWORKGROUP", Winbind, [Samba];
    SmbIdmapRange => smb_idmap_range: Text, "SMBIDMAPRANGE", Winbind, [Samba];
    WinbindSeparator => winbind_separator: Text, "WINBINDSEPARATOR", Winbind, [Samba];
    WinbindTemplateHomedir => winbind_template_homedir: Text, "WINBINDTEMPLATEHOMEDIR", Winbind, [Samba];
    WinbindTemplateShell => winbind_template_shell: Text, "WINBINDTEMPLATESHELL", Winbind, [Samba];
    WinbindUseDefaultDomain => winbind_use_default_domain: Flag, "WINBINDUSEDEFAULTDOMAIN", Winbind, [Samba];
    WinbindOffline => winbind_offline: Flag, "WINBINDOFFLINE", Winbind, [Samba];
    WinbindKrb5 => winbind_krb5: Flag, "WINBINDKRB5", Winbind, [Samba];

    Ipav2 => enable_ipav2: Flag, "USEIPAV2", Ipav2, [Sysconfig, Nsswitch, Pam, Sssd];
    Ipav2Domain => ipav2_domain: Text, "IPAV2DOMAIN", Ipav2, [Sysconfig];
    Ipav2Realm => ipav2_realm: Text, "IPAV2REALM", Ipav2, [Sysconfig];
    Ipav2Server => ipav2_server: Text, "IPAV2SERVER", Ipav2, [Sysconfig];
    Ipav2NoNtp => ipav2_no_ntp: Flag, "IPAV2NONTP", Ipav2, [Sysconfig];
    Ipav2Joined => ipav2_joined: Flag, "IPADOMAINJOINED", Ipav2, [Sysconfig];

    Wins => enable_wins: Flag, "USEWINS", Hosts, [Nsswitch];
    PreferDns => prefer_dns_in_hosts: Flag, "PREFERDNS", Hosts, [Nsswitch];

    Hesiod => enable_hesiod: Flag, "USEHESIOD", Hesiod, [Sysconfig, Nsswitch];
    HesiodLhs => hesiod_lhs: Text, "HESIODLHS", Hesiod, [Hesiod];
    HesiodRhs => hesiod_rhs: Text, "HESIODRHS", Hesiod, [Hesiod];

    Sssd => enable_sssd: Flag, "USESSSD", Sssd, [Sysconfig, Nsswitch];
    SssdAuth => enable_sssd_auth: Flag, "USESSSDAUTH", Sssd, [Sysconfig, Pam];
    ForceLegacy => enable_force_legacy: Flag, "FORCELEGACY", Sssd, [Sysconfig];
    CacheCreds => enable_cache_creds: Flag, "CACHECREDENTIALS", Sssd, [Sysconfig, Sssd];

    Cache => enable_cache: Flag, "USECACHE", Cache, [Sysconfig];

    LocAuthorize => enable_loc_authorize: Flag, "USELOCAUTHORIZE", Access, [Sysconfig, Pam];
    PamAccess => enable_pam_access: Flag, "USEPAMACCESS", Access, [Sysconfig, Pam];
    SysNetAuth => enable_sys_net_auth: Flag, "USESYSNETAUTH", Access, [Sysconfig, Pam];
    MkHomeDir => enable_mkhomedir: Flag, "USEMKHOMEDIR", Access, [Sysconfig, Pam];
    Ecryptfs => enable_ecryptfs: Flag, "USEECRYPTFS", Access, [Sysconfig, Pam];

    Smartcard => enable_smartcard: Flag, "USESMARTCARD", Smartcard, [Sysconfig, Pam, Dconf];
    RequireSmartcard => force_smartcard: Flag, "FORCESMARTCARD", Smartcard, [Sysconfig, Pam, Dconf];
    SmartcardModule => smartcard_module: Text, "SMARTCARDMODULE", Smartcard, [Dconf];
    SmartcardAction => smartcard_action: Action, "SMARTCARDACTION", Smartcard, [Dconf];
    Fingerprint => enable_fprintd: Flag, "USEFPRINTD", Smartcard, [Sysconfig, Pam];
}

impl SettingId {
    /// Artifact the value is read from at load time.
    pub fn primary_owner(self) -> Option<Artifact> {
        self.owners().first().copied()
    }

    /// Settings owned by `artifact`, in table order.
    pub fn owned_by(artifact: Artifact) -> impl Iterator<Item = SettingId> {
        SettingId::iter().filter(move |id| id.owners().contains(&artifact))
    }
}

/// Smart card module name that enforces the smart card policy itself
pub const SSSD_SMARTCARD_MODULE: &str = "sssd";

impl AuthSettings {
    /// Canonical text form of one setting.
    pub fn render(&self, id: SettingId) -> String {
        self.value(id).render()
    }

    /// Parse `raw` and store it in the setting `id`.
    ///
    /// Empty input clears optional values. On error the setting is left
    /// unchanged.
    pub fn assign(&mut self, id: SettingId, raw: &str) -> Result<(), String> {
        let raw = raw.trim();
        match self.slot_mut(id) {
            SlotMut::Flag(slot) => *slot = parse_flag(raw)?,
            SlotMut::Text(slot) => *slot = raw.to_string(),
            SlotMut::Number(slot) => {
                *slot = if raw.is_empty() {
                    None
                } else {
                    Some(raw.parse().map_err(|_| format!("'{}' is not a number", raw))?)
                }
            }
            SlotMut::Algorithm(slot) => {
                *slot = PasswordAlgorithm::from_str(&raw.to_lowercase())
                    .map_err(|_| format!("unknown password algorithm '{}'", raw))?
            }
            SlotMut::Security(slot) => {
                *slot = if raw.is_empty() {
                    None
                } else {
                    Some(
                        SmbSecurity::from_str(&raw.to_lowercase())
                            .map_err(|_| format!("unknown security mode '{}'", raw))?,
                    )
                }
            }
            SlotMut::Action(slot) => {
                *slot = if raw.is_empty() {
                    None
                } else {
                    Some(
                        SmartcardAction::from_str(raw)
                            .map_err(|_| format!("unknown smart card action '{}'", raw))?,
                    )
                }
            }
        }
        Ok(())
    }

    /// Set a boolean setting. Returns false if `id` is not a flag.
    pub fn set_flag(&mut self, id: SettingId, value: bool) -> bool {
        match self.slot_mut(id) {
            SlotMut::Flag(slot) => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Returns true if any setting differs between the two snapshots.
    pub fn differs(&self, other: &Self) -> bool {
        SettingId::iter().any(|id| self.value(id) != other.value(id))
    }

    /// Settings whose values differ between the two snapshots.
    pub fn changed_settings(&self, other: &Self) -> BTreeSet<SettingId> {
        SettingId::iter()
            .filter(|id| self.value(*id) != other.value(*id))
            .collect()
    }

    /// Artifacts owning at least one setting that differs.
    ///
    /// Membership does not depend on argument order.
    pub fn changed_artifacts(&self, other: &Self) -> BTreeSet<Artifact> {
        self.changed_settings(other)
            .into_iter()
            .flat_map(|id| id.owners().iter().copied())
            .collect()
    }

    /// Recompute fields derived from other settings.
    pub fn update_derived(&mut self) {
        self.ldap_schema = if self.enable_rfc2307bis {
            "rfc2307bis".to_string()
        } else {
            String::new()
        };

        if !self.kerberos_realm.is_empty() {
            self.kerberos_realms.insert(
                self.kerberos_realm.clone(),
                RealmHosts {
                    kdc: self.kerberos_kdc.clone(),
                    admin_server: self.kerberos_admin_server.clone(),
                },
            );
        }
    }

    /// Returns true if SSSD serves identity or authentication lookups.
    ///
    /// IPAv2 and the explicit SSSD flags always use it; LDAP and Kerberos
    /// use it implicitly unless legacy modules are forced or SSSD is not
    /// installed.
    pub fn uses_sssd(&self, caps: &CapabilitySet) -> bool {
        if self.enable_sssd || self.enable_sssd_auth || self.enable_ipav2 {
            return true;
        }
        if self.enable_force_legacy || !caps.sssd {
            return false;
        }
        let ldap = self.enable_ldap || self.enable_ldap_auth;
        let krb5 = self.enable_kerberos && !self.enable_winbind_auth;
        (ldap || krb5) && !self.enable_nis && !self.enable_hesiod
    }

    /// Returns true if the name-service cache daemon should run.
    pub fn uses_nscd(&self, caps: &CapabilitySet) -> bool {
        self.enable_cache && caps.cache && !self.uses_sssd(caps)
    }
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Ok(true),
        "no" | "false" | "0" | "off" | "" => Ok(false),
        _ => Err(format!("'{}' is not a boolean", raw)),
    }
}

impl fmt::Display for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in Group::iter() {
            writeln!(f, "{}:", group)?;
            for id in SettingId::iter().filter(|id| id.group() == group) {
                match self.value(id) {
                    SettingRef::Flag(b) => writeln!(
                        f,
                        "  {} is {}",
                        id.field_name(),
                        if *b { "enabled" } else { "disabled" }
                    )?,
                    other => writeln!(f, "  {} = \"{}\"", id.field_name(), other.render())?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_does_not_differ() {
        let mut settings = AuthSettings::default();
        settings.enable_ldap = true;
        settings.ldap_server = "ldap://ldap.example.com".to_string();
        let copy = settings.clone();
        assert!(!settings.differs(&copy));
        assert!(settings.changed_artifacts(&copy).is_empty());
    }

    #[test]
    fn test_changed_artifacts_follow_ownership() {
        let pristine = AuthSettings::default();
        let mut current = pristine.clone();
        current.nis_server = "nis.example.com".to_string();
        let changed = pristine.changed_artifacts(&current);
        assert_eq!(changed, BTreeSet::from([Artifact::Yp]));

        current.enable_kerberos = true;
        let changed = pristine.changed_artifacts(&current);
        assert!(changed.contains(&Artifact::Sysconfig));
        assert!(changed.contains(&Artifact::Pam));
        assert!(changed.contains(&Artifact::Sssd));
        assert!(!changed.contains(&Artifact::Krb5));
    }

    #[test]
    fn test_changed_artifacts_symmetric() {
        let a = AuthSettings::default();
        let mut b = a.clone();
        b.smb_workgroup = "EXAMPLE".to_string();
        b.pass_min_len = Some(9);
        assert_eq!(a.changed_artifacts(&b), b.changed_artifacts(&a));
    }

    #[test]
    fn test_cacert_url_owned_by_nothing() {
        let a = AuthSettings::default();
        let mut b = a.clone();
        b.ldap_cacert_url = "https://example.com/ca.pem".to_string();
        assert!(a.differs(&b));
        assert!(a.changed_artifacts(&b).is_empty());
    }

    #[test]
    fn test_assign_parses_kinds() {
        let mut s = AuthSettings::default();
        s.assign(SettingId::Shadow, "yes").unwrap();
        assert!(s.enable_shadow);
        s.assign(SettingId::PassMinLen, "12").unwrap();
        assert_eq!(s.pass_min_len, Some(12));
        s.assign(SettingId::PassMinLen, "").unwrap();
        assert_eq!(s.pass_min_len, None);
        s.assign(SettingId::PasswordAlgorithm, "MD5").unwrap();
        assert_eq!(s.password_algorithm, PasswordAlgorithm::Md5);
        s.assign(SettingId::SmbSecurity, "ads").unwrap();
        assert_eq!(s.smb_security, Some(SmbSecurity::Ads));
        s.assign(SettingId::SmartcardAction, "Ignore").unwrap();
        assert_eq!(s.smartcard_action, Some(SmartcardAction::Ignore));
    }

    #[test]
    fn test_assign_rejects_garbage_and_keeps_value() {
        let mut s = AuthSettings::default();
        s.pass_min_len = Some(8);
        assert!(s.assign(SettingId::PassMinLen, "eight").is_err());
        assert_eq!(s.pass_min_len, Some(8));
        assert!(s.assign(SettingId::Nis, "maybe").is_err());
        assert!(s.assign(SettingId::PasswordAlgorithm, "rot13").is_err());
    }

    #[test]
    fn test_render_roundtrips_through_assign() {
        let mut source = AuthSettings::default();
        source.enable_winbind = true;
        source.smb_security = Some(SmbSecurity::Domain);
        source.pass_max_repeat = Some(3);
        source.smartcard_action = Some(SmartcardAction::Lock);
        let mut target = AuthSettings::default();
        for id in SettingId::iter() {
            target.assign(id, &source.render(id)).unwrap();
        }
        assert!(!source.differs(&target));
    }

    #[test]
    fn test_set_flag_only_for_flags() {
        let mut s = AuthSettings::default();
        assert!(s.set_flag(SettingId::MkHomeDir, true));
        assert!(s.enable_mkhomedir);
        assert!(!s.set_flag(SettingId::LdapServer, true));
    }

    #[test]
    fn test_update_derived_schema_and_realms() {
        let mut s = AuthSettings::default();
        s.enable_rfc2307bis = true;
        s.kerberos_realm = "EXAMPLE.COM".to_string();
        s.kerberos_kdc = "kdc.example.com".to_string();
        s.update_derived();
        assert_eq!(s.ldap_schema, "rfc2307bis");
        assert_eq!(s.kerberos_realms["EXAMPLE.COM"].kdc, "kdc.example.com");

        s.enable_rfc2307bis = false;
        s.update_derived();
        assert_eq!(s.ldap_schema, "");
    }

    #[test]
    fn test_uses_sssd() {
        let caps = CapabilitySet { sssd: true, ..Default::default() };
        let mut s = AuthSettings::default();
        assert!(!s.uses_sssd(&caps));
        s.enable_ldap = true;
        assert!(s.uses_sssd(&caps));
        s.enable_force_legacy = true;
        assert!(!s.uses_sssd(&caps));
        s.enable_ipav2 = true;
        assert!(s.uses_sssd(&caps));
        assert!(!AuthSettings::default().uses_sssd(&CapabilitySet::default()));
    }

    #[test]
    fn test_every_setting_has_var_name() {
        let mut names = BTreeSet::new();
        for id in SettingId::iter() {
            assert!(!id.var_name().is_empty());
            assert!(names.insert(id.var_name()), "{} duplicated", id.var_name());
        }
    }

    #[test]
    fn test_display_lists_groups() {
        let mut s = AuthSettings::default();
        s.enable_nis = true;
        s.nis_domain = "example".to_string();
        let text = s.to_string();
        assert!(text.contains("NIS:"));
        assert!(text.contains("enable_nis is enabled"));
        assert!(text.contains("nis_domain = \"example\""));
    }
}
