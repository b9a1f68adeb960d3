//! Configuration artifacts: one underlying file per subsystem writer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter, EnumString};

/// One configuration file owned by a subsystem writer.
///
/// Ordering is the write order: the sysconfig summary first, then the files
/// that name services and PAM read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    Sysconfig,
    Network,
    Nsswitch,
    Pam,
    Pwquality,
    LoginDefs,
    Libuser,
    Yp,
    Ldap,
    Nslcd,
    Krb5,
    Samba,
    Hesiod,
    Sssd,
    Dconf,
}

impl Artifact {
    /// Absolute path of the artifact on a live system.
    pub const fn system_path(self) -> &'static str {
        match self {
            Self::Sysconfig => "/etc/sysconfig/authconfig",
            Self::Network => "/etc/sysconfig/network",
            Self::Nsswitch => "/etc/nsswitch.conf",
            Self::Pam => "/etc/pam.d/system-auth-ac",
            Self::Pwquality => "/etc/security/pwquality.conf",
            Self::LoginDefs => "/etc/login.defs",
            Self::Libuser => "/etc/libuser.conf",
            Self::Yp => "/etc/yp.conf",
            Self::Ldap => "/etc/openldap/ldap.conf",
            Self::Nslcd => "/etc/nslcd.conf",
            Self::Krb5 => "/etc/krb5.conf",
            Self::Samba => "/etc/samba/smb.conf",
            Self::Hesiod => "/etc/hesiod.conf",
            Self::Sssd => "/etc/sssd/sssd.conf",
            Self::Dconf => "/etc/dconf/db/distro.d/10-authconfig",
        }
    }

    /// Path of the artifact below `root`.
    pub fn path_under(self, root: &Path) -> PathBuf {
        root.join(self.system_path().trim_start_matches('/'))
    }

    /// File name used for this artifact inside a backup archive.
    pub fn archive_name(self) -> String {
        self.to_string()
    }
}
