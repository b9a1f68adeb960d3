//! Host capability detection
//!
//! Tests which optional authentication subsystems are installed by checking
//! that their defining binaries and modules are executable. Detection never
//! fails: a missing or unreadable path simply marks the subsystem as
//! unavailable.
//!
//! # Subsystems
//!
//! | Subsystem   | Required paths |
//! |-------------|----------------|
//! | nis         | `ypbind` + `libnss_nis` |
//! | kerberos    | `pam_krb5` |
//! | ldap        | `pam_ldap` + `libnss_ldap` |
//! | sssd        | `pam_sss` + `libnss_sss` |
//! | cache       | `nscd` |
//! | fprintd     | `pam_fprintd` |
//! | winbind     | `libnss_winbind` + `pam_winbind` + `net` |
//! | ipa         | `ipa-client-install` |
//! | oddjob      | `pam_oddjob_mkhomedir` |

use nix::unistd::{access, AccessFlags};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const PATH_YPBIND: &str = "/usr/sbin/ypbind";
pub const PATH_LIBNSS_NIS: &str = "/usr/lib64/libnss_nis.so.2";
pub const PATH_PAM_KRB5: &str = "/usr/lib64/security/pam_krb5.so";
pub const PATH_PAM_LDAP: &str = "/usr/lib64/security/pam_ldap.so";
pub const PATH_LIBNSS_LDAP: &str = "/usr/lib64/libnss_ldap.so.2";
pub const PATH_PAM_SSS: &str = "/usr/lib64/security/pam_sss.so";
pub const PATH_LIBNSS_SSS: &str = "/usr/lib64/libnss_sss.so.2";
pub const PATH_NSCD: &str = "/usr/sbin/nscd";
pub const PATH_PAM_FPRINTD: &str = "/usr/lib64/security/pam_fprintd.so";
pub const PATH_LIBNSS_WINBIND: &str = "/usr/lib64/libnss_winbind.so.2";
pub const PATH_PAM_WINBIND: &str = "/usr/lib64/security/pam_winbind.so";
pub const PATH_WINBIND_NET: &str = "/usr/bin/net";
pub const PATH_IPA_CLIENT_INSTALL: &str = "/usr/sbin/ipa-client-install";
pub const PATH_PAM_ODDJOB_MKHOMEDIR: &str = "/usr/lib64/security/pam_oddjob_mkhomedir.so";

/// Availability of every optional subsystem on this host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub nis: bool,
    pub kerberos: bool,
    pub ldap: bool,
    pub sssd: bool,
    pub cache: bool,
    pub fprintd: bool,
    pub winbind: bool,
    pub ipa: bool,
    pub oddjob: bool,
}

impl CapabilitySet {
    /// Inspect the system rooted at `root`.
    pub fn probe(root: &Path) -> Self {
        let present = |paths: &[&str]| paths.iter().all(|p| is_executable(root, p));

        let caps = Self {
            nis: present(&[PATH_YPBIND, PATH_LIBNSS_NIS]),
            kerberos: present(&[PATH_PAM_KRB5]),
            ldap: present(&[PATH_PAM_LDAP, PATH_LIBNSS_LDAP]),
            sssd: present(&[PATH_PAM_SSS, PATH_LIBNSS_SSS]),
            cache: present(&[PATH_NSCD]),
            fprintd: present(&[PATH_PAM_FPRINTD]),
            winbind: present(&[PATH_LIBNSS_WINBIND, PATH_PAM_WINBIND, PATH_WINBIND_NET]),
            ipa: present(&[PATH_IPA_CLIENT_INSTALL]),
            oddjob: present(&[PATH_PAM_ODDJOB_MKHOMEDIR]),
        };
        debug!("Capabilities under {}: {}", root.display(), caps);
        caps
    }

    /// Every subsystem available.
    pub fn all() -> Self {
        Self {
            nis: true,
            kerberos: true,
            ldap: true,
            sssd: true,
            cache: true,
            fprintd: true,
            winbind: true,
            ipa: true,
            oddjob: true,
        }
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = [
            ("nis", self.nis),
            ("kerberos", self.kerberos),
            ("ldap", self.ldap),
            ("sssd", self.sssd),
            ("cache", self.cache),
            ("fprintd", self.fprintd),
            ("winbind", self.winbind),
            ("ipa", self.ipa),
            ("oddjob", self.oddjob),
        ];
        let names: Vec<&str> = entries.iter().filter(|(_, on)| *on).map(|(n, _)| *n).collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(" "))
        }
    }
}

fn is_executable(root: &Path, system_path: &str) -> bool {
    let path = root.join(system_path.trim_start_matches('/'));
    access(&path, AccessFlags::X_OK).is_ok()
}
