//! Enumerates local network interfaces and derives the subnet to sweep.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use log::debug;
use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use thiserror::Error;

/// The first three octets of a /24 subnet, e.g. `192.168.1.`.
///
/// Candidate sweep addresses are formed by appending a host suffix in
/// `1..=254`. Derived once per discovery session from the local address,
/// with [`Subnet::DEFAULT`] as the documented fallback when interface
/// enumeration yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Deserialize)]
#[serde(try_from = "String")]
pub struct Subnet([u8; 3]);

impl Subnet {
    /// Fallback prefix used when no local IPv4 address is available.
    pub const DEFAULT: Subnet = Subnet([192, 168, 1]);

    /// Derives the /24 prefix of `addr`.
    #[must_use]
    pub fn of(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Subnet([a, b, c])
    }

    /// Builds the candidate address `prefix + suffix`.
    #[must_use]
    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, suffix)
    }

    /// True if `addr` lies inside this /24.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let [a, b, c, _] = addr.octets();
        self.0 == [a, b, c]
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}.")
    }
}

/// Raised when a subnet prefix override cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid subnet prefix '{0}', expected three octets like 192.168.1.")]
pub struct SubnetParseError(String);

impl FromStr for Subnet {
    type Err = SubnetParseError;

    /// Accepts `192.168.1.` or `192.168.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('.');
        let octets = trimmed
            .split('.')
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| SubnetParseError(s.to_owned()))?;

        match octets.as_slice() {
            &[a, b, c] => Ok(Subnet([a, b, c])),
            _ => Err(SubnetParseError(s.to_owned())),
        }
    }
}

impl TryFrom<String> for Subnet {
    type Error = SubnetParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Returns the first non-loopback IPv4 address of an interface that is up.
///
/// Enumeration failure is swallowed: the caller falls back to
/// [`Subnet::DEFAULT`] and treats the local address as unknown.
#[must_use]
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = datalink::interfaces();
    debug!("enumerated {} network interfaces", interfaces.len());

    interfaces
        .iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .flat_map(|iface| iface.ips.iter())
        .find_map(|net| match net {
            IpNetwork::V4(v4) if !v4.ip().is_loopback() => Some(v4.ip()),
            _ => None,
        })
}
