use std::fmt;
use std::net::IpAddr;

use trust_dns_resolver::TokioAsyncResolver;
use url::{Host, Url};

/// Host identifier handed to the ICMP echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedHost {
    Ip(IpAddr),
    /// DNS failed; the echo gets the raw hostname and the `ping` binary tries again.
    Hostname(String),
}

impl fmt::Display for ResolvedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedHost::Ip(ip) => write!(f, "{ip}"),
            ResolvedHost::Hostname(name) => f.write_str(name),
        }
    }
}

/// Resolves a target URL's host for ICMP use. IPv4 addresses are preferred.
#[derive(Clone)]
pub struct TargetResolver {
    resolver: TokioAsyncResolver,
}

impl TargetResolver {
    pub fn new(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }

    /// Never fails: a lookup error is logged and the hostname itself is returned.
    pub async fn resolve(&self, url: &Url) -> ResolvedHost {
        let name = match url.host() {
            Some(Host::Ipv4(ip)) => return ResolvedHost::Ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => return ResolvedHost::Ip(IpAddr::V6(ip)),
            Some(Host::Domain(name)) => name.to_string(),
            None => String::new(),
        };

        match self.resolver.lookup_ip(name.as_str()).await {
            Ok(lookup) => {
                let addrs: Vec<IpAddr> = lookup.iter().collect();
                match addrs.iter().find(|ip| ip.is_ipv4()).or_else(|| addrs.first()) {
                    Some(ip) => ResolvedHost::Ip(*ip),
                    None => {
                        log::warn!(
                            "Unable to parse {name} IP address: empty answer. Using hostname for ICMP (ping) requests."
                        );
                        ResolvedHost::Hostname(name)
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "Unable to parse {name} IP address: {e}. Using hostname for ICMP (ping) requests."
                );
                ResolvedHost::Hostname(name)
            }
        }
    }
}
