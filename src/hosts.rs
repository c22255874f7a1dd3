//! `/etc/hosts` suggestions for names the target redirects to.

use crate::types::ScanTarget;
use std::collections::BTreeSet;
use std::net::IpAddr;
use url::{Host, Url};

/// Host name of a redirect URL; `None` for IP literals and unparsable URLs.
pub fn redirect_host(location: &str) -> Option<String> {
    let url = Url::parse(location.trim()).ok()?;
    match url.host()? {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_lowercase();
            if domain.is_empty() || domain.parse::<IpAddr>().is_ok() {
                None
            } else {
                Some(domain)
            }
        }
        Host::Ipv4(_) | Host::Ipv6(_) => None,
    }
}

/// Distinct redirect host names other than the target itself.
pub fn redirect_hosts(target: &ScanTarget, redirects: &BTreeSet<String>) -> BTreeSet<String> {
    let own = target.as_str().to_lowercase();
    redirects
        .iter()
        .filter_map(|r| redirect_host(r))
        .filter(|host| *host != own)
        .collect()
}

/// `board.htb` for `www.board.htb`; single-label names have no base domain.
pub fn base_domain(host: &str) -> Option<String> {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return None;
    }
    Some(labels[labels.len() - 2..].join("."))
}

/// Domains worth fuzzing for virtual hosts.
pub fn base_domains(target: &ScanTarget, redirects: &BTreeSet<String>) -> Vec<String> {
    redirect_hosts(target, redirects)
        .iter()
        .filter_map(|host| base_domain(host))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `<ip> <host>` lines, sorted and deduplicated. Only an IP target can be
/// mapped, so a hostname target yields nothing.
pub fn hosts_entries(target: &ScanTarget, redirects: &BTreeSet<String>, vhosts: &[String]) -> Vec<String> {
    let Some(ip) = target.ip() else {
        return Vec::new();
    };

    let mut names = redirect_hosts(target, redirects);
    names.extend(
        vhosts
            .iter()
            .map(|v| v.trim().trim_end_matches('.').to_lowercase())
            .filter(|v| !v.is_empty() && v.parse::<IpAddr>().is_err()),
    );

    names.into_iter().map(|name| format!("{} {}", ip, name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_redirects_are_not_hosts() {
        assert_eq!(redirect_host("http://10.10.11.20/login"), None);
        assert_eq!(redirect_host("http://[::1]:8080/"), None);
        assert_eq!(redirect_host("http://Board.HTB/"), Some("board.htb".to_string()));
    }

    #[test]
    fn base_domain_keeps_last_two_labels() {
        assert_eq!(base_domain("dev.app.board.htb").as_deref(), Some("board.htb"));
        assert_eq!(base_domain("localhost"), None);
    }
}
