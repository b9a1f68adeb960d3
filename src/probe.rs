//! Network default discovery for probe mode
//!
//! Guesses LDAP and Kerberos defaults from the host's DNS domain: the domain
//! comes from `resolv.conf` (`domain`, then the first `search` entry) or the
//! host name, and conventional service host names under it are tried with a
//! plain TCP connect.
//!
//! # Failure Mode
//!
//! Nothing here fails. No domain or no reachable host simply yields fewer
//! defaults.

use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const LDAP_PORT: u16 = 389;
pub const KDC_PORT: u16 = 88;
pub const KADMIN_PORT: u16 = 749;

/// Defaults discovered on the network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbedDefaults {
    pub ldap_server: Option<String>,
    pub ldap_base_dn: Option<String>,
    pub kerberos_realm: Option<String>,
    pub kerberos_kdc: Option<String>,
    pub kerberos_admin_server: Option<String>,
}

impl ProbedDefaults {
    /// Report lines in the `ldap <server>/<basedn>` and
    /// `krb5 <realm>/<kdc>/<admin>` forms.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let (Some(server), Some(base)) = (&self.ldap_server, &self.ldap_base_dn) {
            lines.push(format!("ldap {}/{}", server, base));
        }
        if let Some(realm) = &self.kerberos_realm {
            lines.push(format!(
                "krb5 {}/{}/{}",
                realm,
                self.kerberos_kdc.as_deref().unwrap_or(""),
                self.kerberos_admin_server.as_deref().unwrap_or("")
            ));
        }
        lines
    }
}

/// Probe the network around the host rooted at `root`.
pub fn probe_network_defaults(root: &Path, timeout: Duration) -> ProbedDefaults {
    let Some(domain) = local_domain(root) else {
        info!("No DNS domain configured, nothing to probe");
        return ProbedDefaults::default();
    };
    info!("Probing defaults for domain {}", domain);
    probe_domain(&domain, |host, port| tcp_reachable(host, port, timeout))
}

/// Build defaults for `domain`, using `reachable` to test candidate hosts.
pub fn probe_domain(domain: &str, reachable: impl Fn(&str, u16) -> bool) -> ProbedDefaults {
    let mut defaults = ProbedDefaults::default();

    let ldap_host = format!("ldap.{}", domain);
    if reachable(&ldap_host, LDAP_PORT) {
        defaults.ldap_server = Some(format!("ldap://{}", ldap_host));
        defaults.ldap_base_dn = Some(base_dn(domain));
    }

    let kdc_host = format!("kerberos.{}", domain);
    if reachable(&kdc_host, KDC_PORT) {
        defaults.kerberos_realm = Some(domain.to_ascii_uppercase());
        defaults.kerberos_kdc = Some(format!("{}:{}", kdc_host, KDC_PORT));
        if reachable(&kdc_host, KADMIN_PORT) {
            defaults.kerberos_admin_server = Some(format!("{}:{}", kdc_host, KADMIN_PORT));
        }
    }
    defaults
}

/// `example.com` -> `dc=example,dc=com`
pub fn base_dn(domain: &str) -> String {
    domain
        .split('.')
        .filter(|label| !label.is_empty())
        .map(|label| format!("dc={}", label))
        .collect::<Vec<_>>()
        .join(",")
}

/// DNS domain of the host.
pub fn local_domain(root: &Path) -> Option<String> {
    let resolv = root.join("etc/resolv.conf");
    if let Ok(content) = fs::read_to_string(&resolv) {
        if let Some(domain) = domain_from_resolv(&content) {
            return Some(domain);
        }
    }
    let hostname = nix::unistd::gethostname().ok()?;
    let hostname = hostname.to_string_lossy();
    hostname
        .split_once('.')
        .map(|(_, domain)| domain.to_string())
        .filter(|d| !d.is_empty())
}

fn domain_from_resolv(content: &str) -> Option<String> {
    let mut search = None;
    for line in content.lines() {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("domain") => {
                if let Some(domain) = words.next() {
                    return Some(domain.trim_end_matches('.').to_string());
                }
            }
            Some("search") if search.is_none() => {
                search = words.next().map(|d| d.trim_end_matches('.').to_string());
            }
            _ => {}
        }
    }
    search
}

/// Returns true if a TCP connection to `host:port` succeeds within `timeout`.
pub fn tcp_reachable(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("Cannot resolve {}: {}", host, e);
            return false;
        }
    };
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_stream) => {
                debug!("{}:{} reachable at {}", host, port, addr);
                return true;
            }
            Err(e) => debug!("{}:{} not reachable at {}: {}", host, port, addr, e),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_base_dn() {
        assert_eq!(base_dn("example.com"), "dc=example,dc=com");
        assert_eq!(base_dn("corp.example.com."), "dc=corp,dc=example,dc=com");
    }

    #[test]
    fn test_domain_from_resolv() {
        assert_eq!(
            domain_from_resolv("# generated\nsearch lab.example.com example.com\nnameserver 10.0.0.1\n"),
            Some("lab.example.com".to_string())
        );
        assert_eq!(
            domain_from_resolv("search other.org\ndomain example.com.\n"),
            Some("example.com".to_string())
        );
        assert_eq!(domain_from_resolv("nameserver 10.0.0.1\n"), None);
    }

    #[test]
    fn test_local_domain_reads_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(dir.path().join("etc/resolv.conf"), "domain example.com\n").unwrap();
        assert_eq!(local_domain(dir.path()), Some("example.com".to_string()));
    }

    #[test]
    fn test_probe_domain_all_reachable() {
        let defaults = probe_domain("example.com", |_, _| true);
        assert_eq!(
            defaults.lines(),
            vec![
                "ldap ldap://ldap.example.com/dc=example,dc=com",
                "krb5 EXAMPLE.COM/kerberos.example.com:88/kerberos.example.com:749",
            ]
        );
    }

    #[test]
    fn test_probe_domain_kdc_only() {
        let defaults = probe_domain("example.com", |host, port| {
            host == "kerberos.example.com" && port == KDC_PORT
        });
        assert!(defaults.ldap_server.is_none());
        assert_eq!(defaults.lines(), vec!["krb5 EXAMPLE.COM/kerberos.example.com:88/"]);
    }

    #[test]
    fn test_nothing_reachable() {
        assert!(probe_domain("example.com", |_, _| false).lines().is_empty());
    }

    #[test]
    fn test_probed_server_has_no_trailing_slash() {
        let defaults = probe_domain("example.com", |_, port| port == LDAP_PORT);
        assert_eq!(defaults.ldap_server.as_deref(), Some("ldap://ldap.example.com"));
        assert!(!defaults.lines()[0].contains("//dc="));
    }
}
