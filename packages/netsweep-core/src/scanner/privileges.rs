//! Probe capability detection
//!
//! The liveness prober shells out to the system `ping`. On most systems that binary is setuid or
//! holds CAP_NET_RAW, but containers and hardened hosts often strip it, which makes every host
//! look dead. This module checks for that up front so callers can switch to TCP liveness.

use super::ping::{LivenessStrategy, ping_host};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// What the current process can do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeCapabilities {
    pub can_ping: bool,
    pub is_elevated: bool,
    pub warning: Option<String>,
}

impl ProbeCapabilities {
    /// Liveness strategy to suggest given these capabilities
    pub fn recommended_liveness(&self, tcp_port: u16) -> LivenessStrategy {
        if self.can_ping {
            LivenessStrategy::Icmp
        } else {
            LivenessStrategy::Tcp { port: tcp_port }
        }
    }
}

/// Check if the current process is running with elevated privileges
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(target_os = "windows")]
    {
        match super::hidden_command_sync("whoami").args(["/groups"]).output() {
            Ok(output) => {
                let out = String::from_utf8_lossy(&output.stdout);
                out.contains("S-1-16-12288") || out.contains("High Mandatory Level")
            }
            Err(_) => false,
        }
    }

    #[cfg(not(any(unix, target_os = "windows")))]
    {
        false
    }
}

/// Ping loopback once to see whether the system ping is usable
pub async fn test_ping_capability() -> bool {
    ping_host(Ipv4Addr::LOCALHOST, Duration::from_secs(1)).await.alive
}

/// Detect probe capabilities based on current privileges
pub async fn detect_capabilities() -> ProbeCapabilities {
    let is_elevated = is_elevated();
    let can_ping = test_ping_capability().await;

    let warning = (!can_ping).then(|| {
        "System ping is unavailable; ICMP liveness will report every host as down. \
         Use TCP liveness (--tcp-fallback <port>) or grant ping the needed privileges."
            .to_string()
    });

    if let Some(ref w) = warning {
        tracing::warn!("{}", w);
    }

    ProbeCapabilities {
        can_ping,
        is_elevated,
        warning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommended_liveness() {
        let caps = ProbeCapabilities {
            can_ping: false,
            is_elevated: false,
            warning: None,
        };
        assert_eq!(caps.recommended_liveness(22), LivenessStrategy::Tcp { port: 22 });

        let caps = ProbeCapabilities {
            can_ping: true,
            ..caps
        };
        assert_eq!(caps.recommended_liveness(22), LivenessStrategy::Icmp);
    }

    #[tokio::test]
    async fn test_detect_capabilities_is_consistent() {
        let caps = detect_capabilities().await;
        assert_eq!(caps.warning.is_some(), !caps.can_ping);
    }
}
