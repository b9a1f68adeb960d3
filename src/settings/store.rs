//! Loading and persisting `AuthSettings` through a `ConfigBackend`.

use strum::IntoEnumIterator;
use tracing::{debug, warn};

use super::artifact::Artifact;
use super::{AuthSettings, RealmHosts, SettingId};
use crate::backend::ConfigBackend;
use crate::error::Result;

/// Read all artifacts into a snapshot.
///
/// An artifact that cannot be read leaves the settings it owns at their
/// defaults; the load itself never fails.
pub fn load(backend: &dyn ConfigBackend) -> AuthSettings {
    let mut settings = AuthSettings::default();
    let mut loc_authorize_stored = false;

    for artifact in Artifact::iter() {
        let vars = match backend.read(artifact) {
            Ok(vars) => vars,
            Err(e) => {
                warn!("Cannot read {}, using defaults for its settings: {}", artifact, e);
                continue;
            }
        };

        for id in SettingId::owned_by(artifact).filter(|id| id.primary_owner() == Some(artifact)) {
            let Some(raw) = vars.get(id.var_name()) else {
                continue;
            };
            if let Err(e) = settings.assign(id, raw) {
                warn!("Ignoring {} in {}: {}", id.var_name(), artifact, e);
                continue;
            }
            if id == SettingId::LocAuthorize {
                loc_authorize_stored = true;
            }
        }

        if artifact == Artifact::Krb5 {
            read_realms(&mut settings, &vars);
        }
    }

    if !loc_authorize_stored {
        debug!("No stored local authorization setting, enabling it");
        settings.enable_loc_authorize = true;
    }

    settings.update_derived();
    settings
}

/// Key/value pairs `artifact` must hold for `settings`.
pub fn artifact_values(settings: &AuthSettings, artifact: Artifact) -> Vec<(String, String)> {
    let mut values: Vec<(String, String)> = SettingId::owned_by(artifact)
        .map(|id| (id.var_name().to_string(), settings.render(id)))
        .collect();

    if artifact == Artifact::Krb5 {
        for (realm, hosts) in &settings.kerberos_realms {
            values.push((format!("KDC[{}]", realm), hosts.kdc.clone()));
            values.push((format!("ADMIN[{}]", realm), hosts.admin_server.clone()));
        }
    }
    values
}

/// Write every setting `artifact` owns.
pub fn persist(backend: &dyn ConfigBackend, settings: &AuthSettings, artifact: Artifact) -> Result<()> {
    backend.write(artifact, &artifact_values(settings, artifact))
}

/// Write only the given settings into their primary artifact.
///
/// Used for markers that tooling outside the engine may have clobbered.
pub fn persist_settings(
    backend: &dyn ConfigBackend,
    settings: &AuthSettings,
    ids: &[SettingId],
) -> Result<()> {
    for id in ids {
        if let Some(artifact) = id.primary_owner() {
            backend.write(
                artifact,
                &[(id.var_name().to_string(), settings.render(*id))],
            )?;
        }
    }
    Ok(())
}

fn read_realms(settings: &mut AuthSettings, vars: &std::collections::BTreeMap<String, String>) {
    for (key, value) in vars {
        let (realm, is_kdc) = if let Some(realm) = bracketed(key, "KDC[") {
            (realm, true)
        } else if let Some(realm) = bracketed(key, "ADMIN[") {
            (realm, false)
        } else {
            continue;
        };
        let hosts: &mut RealmHosts = settings.kerberos_realms.entry(realm.to_string()).or_default();
        if is_kdc {
            hosts.kdc = value.clone();
        } else {
            hosts.admin_server = value.clone();
        }
    }
}

fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?.strip_suffix(']').filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ShellVarsBackend;
    use crate::error::AuthconfError;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_load_empty_root_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load(&ShellVarsBackend::new(dir.path()));
        assert!(settings.enable_loc_authorize, "local authorization defaults on");
        assert!(!settings.enable_ldap);
    }

    #[test]
    fn test_stored_loc_authorize_is_kept() {
        let dir = TempDir::new().unwrap();
        let backend = ShellVarsBackend::new(dir.path());
        backend
            .write(Artifact::Sysconfig, &[("USELOCAUTHORIZE".into(), "no".into())])
            .unwrap();
        assert!(!load(&backend).enable_loc_authorize);
    }

    #[test]
    fn test_persist_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let backend = ShellVarsBackend::new(dir.path());
        let mut settings = AuthSettings::default();
        settings.enable_loc_authorize = true;
        settings.enable_kerberos = true;
        settings.kerberos_realm = "EXAMPLE.COM".into();
        settings.kerberos_kdc = "kdc.example.com:88".into();
        settings.winbind_template_homedir = "/home/%D/%U".into();
        settings.pass_min_len = Some(10);
        settings.enable_rfc2307bis = true;
        settings.update_derived();

        for artifact in Artifact::iter() {
            persist(&backend, &settings, artifact).unwrap();
        }
        let loaded = load(&backend);
        assert!(!settings.differs(&loaded), "{}", loaded);
        assert_eq!(loaded.kerberos_realms["EXAMPLE.COM"].kdc, "kdc.example.com:88");
    }

    #[test]
    fn test_multiline_text_does_not_leak_into_other_keys() {
        let dir = TempDir::new().unwrap();
        let backend = ShellVarsBackend::new(dir.path());
        let mut settings = AuthSettings::default();
        settings.enable_loc_authorize = true;
        settings.enable_shadow = true;
        settings.faillock_args = "deny=4\nUSESHADOW=no".into();

        persist(&backend, &settings, Artifact::Sysconfig).unwrap();
        let loaded = load(&backend);
        assert!(loaded.enable_shadow);
        assert_eq!(loaded.faillock_args, "deny=4\nUSESHADOW=no");
        assert!(loaded.changed_settings(&settings).is_empty());
    }

    struct BrokenKrb5(ShellVarsBackend);

    impl ConfigBackend for BrokenKrb5 {
        fn path(&self, artifact: Artifact) -> PathBuf {
            self.0.path(artifact)
        }
        fn read(&self, artifact: Artifact) -> Result<BTreeMap<String, String>> {
            if artifact == Artifact::Krb5 {
                return Err(AuthconfError::general("unreadable"));
            }
            self.0.read(artifact)
        }
        fn write(&self, artifact: Artifact, values: &[(String, String)]) -> Result<()> {
            self.0.write(artifact, values)
        }
    }

    #[test]
    fn test_unreadable_artifact_degrades_to_defaults() {
        let dir = TempDir::new().unwrap();
        let inner = ShellVarsBackend::new(dir.path());
        inner
            .write(Artifact::Krb5, &[("KRB5REALM".into(), "EXAMPLE.COM".into())])
            .unwrap();
        inner
            .write(Artifact::Sysconfig, &[("USEKERBEROS".into(), "yes".into())])
            .unwrap();

        let settings = load(&BrokenKrb5(inner));
        assert!(settings.enable_kerberos);
        assert_eq!(settings.kerberos_realm, "");
    }

    #[test]
    fn test_persist_settings_touches_only_marker() {
        let dir = TempDir::new().unwrap();
        let backend = ShellVarsBackend::new(dir.path());
        backend
            .write(Artifact::Sysconfig, &[("USENIS".into(), "yes".into())])
            .unwrap();
        let mut settings = AuthSettings::default();
        settings.ipav2_joined = true;
        persist_settings(&backend, &settings, &[SettingId::Ipav2Joined]).unwrap();

        let vars = backend.read(Artifact::Sysconfig).unwrap();
        assert_eq!(vars["IPADOMAINJOINED"], "yes");
        assert_eq!(vars["USENIS"], "yes");
        assert_eq!(vars.len(), 2);
    }
}
