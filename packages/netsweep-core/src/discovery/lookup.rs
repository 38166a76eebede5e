//! Single-host MAC lookup: local ARP first, router second

use crate::error::DiscoveryError;
use crate::router::RouterClient;
use crate::scanner::HostProbe;
use crate::scanner::cidr::parse_dotted_quad;
use crate::scanner::oui::{format_mac, ieee_vendor, normalize_mac};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

/// Ping budget; a reply also primes the local ARP cache
pub const LOOKUP_PING_TIMEOUT: Duration = Duration::from_secs(3);

/// Budget for the router query
pub const LOOKUP_ROUTER_TIMEOUT: Duration = Duration::from_secs(5);

pub const SOURCE_LOCAL: &str = "local";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacLookup {
    pub success: bool,
    pub ip: String,
    /// 12 lowercase hex chars
    pub mac: Option<String>,
    /// `AA:BB:CC:DD:EE:FF`
    pub mac_formatted: Option<String>,
    pub hostname: Option<String>,
    /// IEEE registry manufacturer
    pub vendor: Option<String>,
    /// `local` or the router's name
    pub source: Option<String>,
    pub online: bool,
    pub response_time_ms: Option<f64>,
    pub message: String,
}

pub(crate) async fn lookup_mac(
    prober: &dyn HostProbe,
    router: Option<&dyn RouterClient>,
    ip: &str,
) -> Result<MacLookup, DiscoveryError> {
    let ip = ip.trim();
    if ip.is_empty() {
        return Err(DiscoveryError::MissingIp);
    }
    let addr = parse_dotted_quad(ip).ok_or_else(|| DiscoveryError::InvalidIp(ip.to_string()))?;

    tracing::info!("[MAC Lookup] Looking up MAC for {}", addr);
    let ping = prober.ping(addr, LOOKUP_PING_TIMEOUT).await;

    let mut found: Option<(String, Option<String>, String)> = None;

    if ping.alive {
        if let Some(mac) = prober.local_mac(addr).await {
            found = Some((mac, None, SOURCE_LOCAL.to_string()));
        }
    }

    if found.is_none() {
        if let Some(router) = router {
            match timeout(LOOKUP_ROUTER_TIMEOUT, router.get_device_by_ip(&addr.to_string())).await {
                Ok(Ok(Some(device))) => {
                    if let Some(mac) = device.mac.as_deref().and_then(normalize_mac) {
                        found = Some((mac, device.hostname, router.name().to_string()));
                    }
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => tracing::warn!("[MAC Lookup] {} lookup failed: {:#}", router.name(), e),
                Err(_) => tracing::warn!("[MAC Lookup] {} lookup timed out", router.name()),
            }
        }
    }

    let lookup = match found {
        Some((mac, hostname, source)) => {
            tracing::info!("[MAC Lookup] {} -> {} (source: {})", addr, mac, source);
            MacLookup {
                success: true,
                ip: addr.to_string(),
                mac_formatted: Some(format_mac(&mac).to_uppercase()),
                vendor: ieee_vendor(&mac),
                mac: Some(mac),
                hostname,
                message: format!("MAC address found via {}", source),
                source: Some(source),
                online: ping.alive,
                response_time_ms: ping.response_time_ms,
            }
        }
        None => MacLookup {
            success: false,
            ip: addr.to_string(),
            mac: None,
            mac_formatted: None,
            hostname: None,
            vendor: None,
            source: None,
            online: ping.alive,
            response_time_ms: ping.response_time_ms,
            message: if ping.alive {
                "Device is online but MAC address not found in local or router ARP tables".to_string()
            } else {
                "Device is offline or unreachable".to_string()
            },
        },
    };

    Ok(lookup)
}
