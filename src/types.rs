//! Type-safe setting values for authconf
//!
//! Closed sets of values (hash algorithms, samba security modes, smart card
//! removal actions) are Rust enums rather than free strings so that the
//! resolver can reject unknown names at one place.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Hash/crypt algorithm used for new passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    Descrypt,
    Bigcrypt,
    Md5,
    Sha256,
    #[default]
    Sha512,
}

impl PasswordAlgorithm {
    /// Algorithm substituted when an unknown name is requested
    pub const FALLBACK: Self = Self::Sha256;

    /// Names accepted on the command line, in display order
    pub fn names() -> Vec<String> {
        Self::iter().map(|a| a.to_string()).collect()
    }
}

/// Samba/winbind security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SmbSecurity {
    User,
    Server,
    Domain,
    Ads,
}

/// Action taken when the smart card is removed
///
/// The declaration order is the order of the numeric selector: `0` is
/// `Lock`, `1` is `Ignore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum SmartcardAction {
    Lock,
    Ignore,
}

impl SmartcardAction {
    /// Resolve a numeric selector against the ordered action list.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    /// Help string in the `<0=Lock|1=Ignore>` form.
    pub fn selector_help() -> String {
        let items: Vec<String> = Self::iter()
            .enumerate()
            .map(|(i, a)| format!("{}={}", i, a))
            .collect();
        format!("<{}>", items.join("|"))
    }
}

/// Directory service a host can be joined to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum JoinKind {
    /// Active Directory / NT domain through samba's `net` tool
    Winbind,
    /// FreeIPA domain through `ipa-client-install`
    Ipa,
}
