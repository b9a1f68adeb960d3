//! Pre-flight privilege check
//!
//! Modes that modify the system (writes, backups, restores) need root.
//! Validate-only and probe modes run unprivileged.

use tracing::{debug, warn};

use crate::error::{AuthconfError, Result};

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Skip root check (for development/testing)
/// Set AUTHCONF_SKIP_ROOT_CHECK=1 to skip
pub fn should_skip_root_check() -> bool {
    std::env::var("AUTHCONF_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Fail with a privilege error unless the process may modify the system.
///
/// `live_root` is false when operating on an alternate root directory,
/// which needs no privileges beyond write access to that tree.
pub fn require_privileges(live_root: bool) -> Result<()> {
    debug!("Running privilege check (live_root={})", live_root);

    if !live_root {
        debug!("Alternate root, privilege check not required");
        return Ok(());
    }
    if should_skip_root_check() {
        warn!("Root check skipped (AUTHCONF_SKIP_ROOT_CHECK=1)");
        return Ok(());
    }
    if !is_running_as_root() {
        return Err(AuthconfError::privilege("can only be run as root"));
    }
    Ok(())
}
