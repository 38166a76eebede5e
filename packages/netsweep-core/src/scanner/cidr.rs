//! CIDR parsing and usable-host expansion

use crate::error::DiscoveryError;
use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 block in `address/prefix` form.
///
/// The address is kept as written; host expansion always works from the masked network base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    addr: Ipv4Addr,
    prefix: u8,
}

impl CidrRange {
    /// Parse `a.b.c.d` or `a.b.c.d/n`. A bare address is a /32.
    pub fn parse(input: &str) -> Result<Self, DiscoveryError> {
        let input = input.trim();
        let (addr_part, prefix_part) = match input.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (input, None),
        };

        let addr = parse_dotted_quad(addr_part).ok_or_else(|| DiscoveryError::invalid_cidr(input))?;

        let prefix = match prefix_part {
            Some(p) => {
                if p.is_empty() || p.len() > 2 || !p.chars().all(|c| c.is_ascii_digit()) {
                    return Err(DiscoveryError::invalid_cidr(input));
                }
                let prefix: u8 = p.parse().map_err(|_| DiscoveryError::invalid_cidr(input))?;
                if prefix > 32 {
                    return Err(DiscoveryError::invalid_cidr(input));
                }
                prefix
            }
            None => 32,
        };

        Ok(Self { addr, prefix })
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Masked network base address
    pub fn network(&self) -> Ipv4Addr {
        // prefix is range-checked in parse, so this cannot fail
        Ipv4Network::new(self.addr, self.prefix)
            .map(|net| net.network())
            .unwrap_or(self.addr)
    }

    /// Whether both ranges cover the same block, however the address was written.
    pub fn same_block(&self, other: &CidrRange) -> bool {
        self.prefix == other.prefix && self.network() == other.network()
    }

    /// Number of usable host addresses.
    pub fn host_count(&self) -> u64 {
        match self.prefix {
            32 => 1,
            31 => 2,
            p => (1u64 << (32 - p as u32)) - 2,
        }
    }

    /// Usable host addresses in ascending order.
    ///
    /// Each call starts a fresh iterator; nothing is materialized up front.
    pub fn hosts(&self) -> HostAddrs {
        let (start, count) = match self.prefix {
            32 => (u32::from(self.addr) as u64, 1),
            31 => ((u32::from(self.addr) & !1) as u64, 2),
            _ => (u32::from(self.network()) as u64 + 1, self.host_count()),
        };
        HostAddrs {
            next: start,
            remaining: count,
        }
    }
}

impl FromStr for CidrRange {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CidrRange::parse(s)
    }
}

impl fmt::Display for CidrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Iterator over the usable hosts of a [`CidrRange`]
#[derive(Debug, Clone)]
pub struct HostAddrs {
    next: u64,
    remaining: u64,
}

impl Iterator for HostAddrs {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let ip = Ipv4Addr::from(self.next as u32);
        self.next += 1;
        self.remaining -= 1;
        Some(ip)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Strict dotted-quad parse: four 1-3 digit decimal octets, each <= 255.
pub(crate) fn parse_dotted_quad(s: &str) -> Option<Ipv4Addr> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return None;
    }

    let mut octets = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || part.len() > 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: u16 = part.parse().ok()?;
        octets[i] = u8::try_from(value).ok()?;
    }

    Some(Ipv4Addr::from(octets))
}
