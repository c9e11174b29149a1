//! CIDR parsing and usable-host enumeration.

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use netprobe_core::{NetprobeError, Result};

/// A configured IPv4 network.
///
/// Host bits in the configured text are tolerated and truncated, so
/// `10.0.0.5/24` covers the same hosts as `10.0.0.0/24`. The configured text
/// is kept for log file names and messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    cidr: String,
    net: Ipv4Net,
}

impl NetworkSpec {
    pub fn parse(cidr: &str) -> Result<Self> {
        let trimmed = cidr.trim();
        let net: Ipv4Net = trimmed
            .parse()
            .map_err(|e: ipnet::AddrParseError| NetprobeError::InvalidNetwork {
                cidr: cidr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            cidr: trimmed.to_string(),
            net: net.trunc(),
        })
    }

    pub fn cidr(&self) -> &str {
        &self.cidr
    }

    pub fn prefix_len(&self) -> u8 {
        self.net.prefix_len()
    }

    /// Number of usable hosts, computed without enumerating them.
    ///
    /// Prefixes up to /30 exclude the network and broadcast addresses;
    /// /31 and /32 count every address.
    pub fn usable_host_count(&self) -> u64 {
        let size = 1u64 << (32 - u32::from(self.net.prefix_len()));
        if self.net.prefix_len() >= 31 {
            size
        } else {
            size - 2
        }
    }

    /// Usable hosts from first to last.
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        self.net.hosts().collect()
    }
}

impl fmt::Display for NetworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cidr)
    }
}

/// Parse every configured network, failing on the first invalid one.
pub fn parse_networks(cidrs: &[String]) -> Result<Vec<NetworkSpec>> {
    cidrs.iter().map(|c| NetworkSpec::parse(c)).collect()
}
