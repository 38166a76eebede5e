//! Router control-plane access.
//!
//! A router sees every host it forwards for, across VLANs the local scan cannot reach. Its ARP
//! table and DHCP leases are used to fill in MACs and hostnames after a scan.

mod mikrotik;

pub use mikrotik::{MikroTikClient, MikroTikConfig};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Interface tag for hosts that hold a lease but have no ARP entry
pub const DHCP_ONLY_INTERFACE: &str = "dhcp-only";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpEntry {
    pub address: String,
    #[serde(rename = "mac-address", default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpLease {
    #[serde(default)]
    pub address: String,
    #[serde(rename = "mac-address", default)]
    pub mac_address: Option<String>,
    #[serde(rename = "host-name", default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
}

/// A host as the router sees it: ARP and DHCP data joined by MAC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterDevice {
    pub ip: String,
    pub mac: Option<String>,
    pub hostname: Option<String>,
    pub interface: String,
    pub dhcp_server: Option<String>,
}

/// Data source for ARP, DHCP and identity.
///
/// Errors are returned, not swallowed; callers that treat the router as optional decide how to
/// degrade.
#[async_trait]
pub trait RouterClient: Send + Sync {
    /// Display name, used as the source attribution for lookups
    fn name(&self) -> &str;

    /// Management address of the router itself
    fn host(&self) -> &str;

    async fn get_arp_table(&self) -> Result<Vec<ArpEntry>>;

    async fn get_dhcp_leases(&self) -> Result<Vec<DhcpLease>>;

    async fn get_identity(&self) -> Result<Option<String>>;

    /// ARP table joined with DHCP leases
    async fn get_network_devices(&self) -> Result<Vec<RouterDevice>> {
        let (arp, leases) = futures::try_join!(self.get_arp_table(), self.get_dhcp_leases())?;
        let devices = merge_arp_and_dhcp(&arp, &leases);
        tracing::debug!(
            "{}: {} ARP entries, {} leases, {} devices",
            self.name(),
            arp.len(),
            leases.len(),
            devices.len()
        );
        Ok(devices)
    }

    async fn get_device_by_ip(&self, ip: &str) -> Result<Option<RouterDevice>> {
        let devices = self.get_network_devices().await?;
        Ok(devices.into_iter().find(|d| d.ip == ip))
    }
}

/// Join ARP entries with DHCP leases on lowercase MAC.
///
/// Every ARP entry yields a device, with the hostname of the lease holding the same MAC. Leases
/// whose address never appeared in ARP are appended under [`DHCP_ONLY_INTERFACE`].
pub fn merge_arp_and_dhcp(arp: &[ArpEntry], leases: &[DhcpLease]) -> Vec<RouterDevice> {
    let by_mac: HashMap<String, &DhcpLease> = leases
        .iter()
        .filter_map(|lease| Some((lease.mac_address.as_deref()?.to_lowercase(), lease)))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut devices: Vec<RouterDevice> = arp
        .iter()
        .map(|entry| {
            seen.insert(entry.address.as_str());
            let lease = entry
                .mac_address
                .as_deref()
                .and_then(|mac| by_mac.get(&mac.to_lowercase()));
            RouterDevice {
                ip: entry.address.clone(),
                mac: entry.mac_address.clone(),
                hostname: lease.and_then(|l| l.host_name.clone()),
                interface: entry.interface.clone(),
                dhcp_server: lease.and_then(|l| l.server.clone()),
            }
        })
        .collect();

    for lease in leases {
        if lease.address.is_empty() || !seen.insert(lease.address.as_str()) {
            continue;
        }
        devices.push(RouterDevice {
            ip: lease.address.clone(),
            mac: lease.mac_address.clone(),
            hostname: lease.host_name.clone(),
            interface: DHCP_ONLY_INTERFACE.to_string(),
            dhcp_server: lease.server.clone(),
        });
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arp(ip: &str, mac: &str, iface: &str) -> ArpEntry {
        ArpEntry {
            address: ip.into(),
            mac_address: Some(mac.into()),
            interface: iface.into(),
        }
    }

    fn lease(ip: &str, mac: &str, host: Option<&str>) -> DhcpLease {
        DhcpLease {
            address: ip.into(),
            mac_address: Some(mac.into()),
            host_name: host.map(Into::into),
            server: Some("dhcp-lan".into()),
        }
    }

    #[test]
    fn test_merge_joins_on_mac_case_insensitive() {
        let devices = merge_arp_and_dhcp(
            &[arp("10.0.0.5", "AA:BB:CC:00:00:05", "bridge")],
            &[lease("10.0.0.99", "aa:bb:cc:00:00:05", Some("laptop"))],
        );
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].ip, "10.0.0.5");
        assert_eq!(devices[0].hostname.as_deref(), Some("laptop"));
        assert_eq!(devices[0].interface, "bridge");
        // lease address differs from the ARP address, so it also shows up on its own
        assert_eq!(devices[1].interface, DHCP_ONLY_INTERFACE);
    }

    #[test]
    fn test_merge_dhcp_only_leases() {
        let devices = merge_arp_and_dhcp(
            &[arp("10.0.0.1", "d4:ca:6d:00:00:01", "ether1")],
            &[
                lease("10.0.0.1", "d4:ca:6d:00:00:01", None),
                lease("10.0.20.7", "3c:22:fb:00:00:07", Some("phone")),
            ],
        );
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].ip, "10.0.20.7");
        assert_eq!(devices[1].interface, DHCP_ONLY_INTERFACE);
        assert_eq!(devices[1].hostname.as_deref(), Some("phone"));
    }

    #[test]
    fn test_merge_arp_without_mac() {
        let entry = ArpEntry {
            address: "10.0.0.8".into(),
            mac_address: None,
            interface: "vlan20".into(),
        };
        let devices = merge_arp_and_dhcp(&[entry], &[]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].mac, None);
        assert_eq!(devices[0].hostname, None);
    }

    #[test]
    fn test_routeros_json_shape() {
        let json = r#"[{".id":"*1","address":"10.0.0.3","mac-address":"00:0C:29:AA:BB:CC",
                        "interface":"bridge","dynamic":"true","complete":"true"}]"#;
        let entries: Vec<ArpEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0].mac_address.as_deref(), Some("00:0C:29:AA:BB:CC"));

        let json = r#"[{".id":"*2","address":"10.0.0.4","mac-address":"00:0C:29:AA:BB:CD",
                        "host-name":"nas","server":"dhcp1","status":"bound"}]"#;
        let leases: Vec<DhcpLease> = serde_json::from_str(json).unwrap();
        assert_eq!(leases[0].host_name.as_deref(), Some("nas"));
    }
}
