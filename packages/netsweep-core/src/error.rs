//! Caller-facing errors.
//!
//! Probe failures never show up here: an unreachable host, a closed port or an ARP miss is
//! absence of data, not an error. These variants cover input validation and job lookups.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// A network token is not `a.b.c.d` or `a.b.c.d/n`, or an octet/prefix is out of range
    #[error("{0}")]
    InvalidFormat(String),

    /// No network tokens were supplied
    #[error("Network IP or CIDR is required (e.g., 10.5.80.1 or 10.5.80.0/24). Supports multiple networks.")]
    EmptyInput,

    /// The aggregate host count of a submission exceeds the scan cap
    #[error("Total hosts ({total}) too large. Maximum {max} hosts allowed.")]
    TooManyHosts { total: u64, max: u64 },

    #[error("Discovery job not found: {0}")]
    JobNotFound(String),

    /// Single-host lookups take a bare IPv4 address only
    #[error("Invalid IP address format: {0}")]
    InvalidIp(String),

    #[error("IP address is required")]
    MissingIp,
}

impl DiscoveryError {
    pub(crate) fn invalid_ip(token: &str) -> Self {
        DiscoveryError::InvalidFormat(format!("Invalid IP address format: {}", token))
    }

    pub(crate) fn invalid_cidr(token: &str) -> Self {
        DiscoveryError::InvalidFormat(format!("Invalid CIDR format: {}", token))
    }

    /// HTTP status a request handler should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            DiscoveryError::JobNotFound(_) => 404,
            _ => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_hosts_message() {
        let err = DiscoveryError::TooManyHosts {
            total: 2049,
            max: 2048,
        };
        assert_eq!(
            err.to_string(),
            "Total hosts (2049) too large. Maximum 2048 hosts allowed."
        );
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        assert_eq!(DiscoveryError::JobNotFound("x".into()).status_code(), 404);
    }
}
