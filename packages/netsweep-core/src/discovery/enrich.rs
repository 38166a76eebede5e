//! Router enrichment: fill MACs and hostnames the local scan could not see

use crate::fingerprint::Classification;
use crate::router::{RouterClient, RouterDevice};
use crate::scanner::DiscoveredDevice;
use crate::scanner::oui::{lookup_vendor, normalize_mac};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

/// Fill absent MAC/hostname fields from the router's ARP+DHCP view.
///
/// No router, a router error or a router that does not answer within `wait` all leave the input
/// untouched. Fields are only ever filled, never overwritten, so running this twice is a no-op.
pub async fn enrich(
    mut devices: Vec<DiscoveredDevice>,
    router: Option<&dyn RouterClient>,
    wait: Duration,
) -> Vec<DiscoveredDevice> {
    let Some(router) = router else {
        tracing::debug!("No router configured, skipping enrichment");
        return devices;
    };

    tracing::info!("Fetching ARP/DHCP data from {} for enrichment", router.name());

    let table = match timeout(wait, router.get_network_devices()).await {
        Ok(Ok(table)) => table,
        Ok(Err(e)) => {
            tracing::warn!("Router enrichment skipped, {} failed: {:#}", router.name(), e);
            return devices;
        }
        Err(_) => {
            tracing::warn!(
                "Router enrichment skipped, {} did not answer within {:?}",
                router.name(),
                wait
            );
            return devices;
        }
    };

    let identity = match timeout(wait, router.get_identity()).await {
        Ok(Ok(identity)) => identity,
        Ok(Err(e)) => {
            tracing::debug!("Router identity unavailable: {:#}", e);
            None
        }
        Err(_) => None,
    };

    let filled = apply_router_table(&mut devices, &table, router.host(), identity.as_deref());
    tracing::info!(
        "Router enrichment complete: {} of {} devices updated",
        filled,
        devices.len()
    );
    devices
}

/// Merge a router device table into scan results. Returns the number of devices changed.
pub fn apply_router_table(
    devices: &mut [DiscoveredDevice],
    table: &[RouterDevice],
    router_host: &str,
    identity: Option<&str>,
) -> usize {
    let by_ip: HashMap<&str, &RouterDevice> = table.iter().map(|d| (d.ip.as_str(), d)).collect();
    let mut changed = 0;

    for device in devices.iter_mut() {
        let before = device.clone();
        let ip = device.ip.to_string();

        if ip == router_host && device.hostname.is_none() {
            device.hostname = identity.map(str::to_string);
        }

        let Some(entry) = by_ip.get(ip.as_str()) else {
            changed += usize::from(*device != before);
            continue;
        };

        if device.mac.is_none() {
            device.mac = entry.mac.as_deref().and_then(normalize_mac);
        }
        if device.hostname.is_none() {
            device.hostname = entry.hostname.clone();
        }

        if device.brand.is_none() {
            if let Some(vendor) = device.mac.as_deref().and_then(lookup_vendor) {
                let mut verdict = Classification {
                    device_type: device.device_type,
                    brand: None,
                };
                verdict.apply_vendor(vendor);
                device.device_type = verdict.device_type;
                device.brand = verdict.brand;
            }
        }

        if *device != before {
            tracing::debug!(
                "Enriched {}: mac={:?} hostname={:?}",
                device.ip,
                device.mac,
                device.hostname
            );
            changed += 1;
        }
    }

    changed
}
