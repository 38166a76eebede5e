//! Network scanning module.
//!
//! Active discovery over an IPv4 range:
//! - liveness probe (system ping, or TCP connect when configured)
//! - TCP connect port probe against a fixed candidate list
//! - reverse DNS / NetBIOS hostname resolution
//! - local ARP cache MAC lookup and OUI vendor table
//!
//! [`NetworkProber`] composes these for a single address; [`scan_network`] drives it across a
//! CIDR block in bounded batches.

pub mod arp;
pub mod cidr;
pub mod hostname;
pub mod oui;
pub mod ping;
pub mod ports;
pub mod privileges;

pub use cidr::CidrRange;
pub use ping::{LivenessStrategy, PingResult};
pub use privileges::ProbeCapabilities;

use crate::fingerprint::{DeviceType, classify};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Hosts probed in parallel per batch when the caller does not say otherwise
pub const DEFAULT_CONCURRENCY: usize = 20;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Create a Command that hides the console window on Windows.
#[cfg(target_os = "windows")]
pub(crate) fn hidden_command_sync(program: &str) -> Command {
    use std::os::windows::process::CommandExt;
    let mut cmd = Command::new(program);
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}

#[cfg(not(target_os = "windows"))]
pub(crate) fn hidden_command_sync(program: &str) -> Command {
    Command::new(program)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Alive,
    Unreachable,
}

/// A live host found by the scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
    /// Normalized: 12 lowercase hex chars
    pub mac: Option<String>,
    pub device_type: DeviceType,
    pub brand: Option<String>,
    pub open_ports: BTreeSet<u16>,
    pub response_time_ms: Option<f64>,
    pub status: DeviceStatus,
}

/// Progress after each completed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub scanned: u64,
    pub total: u64,
    pub found: u64,
}

/// Timeouts, port list and liveness strategy for [`NetworkProber`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub ports: Vec<u16>,
    pub ping_timeout: Duration,
    pub port_timeout: Duration,
    pub hostname_timeout: Duration,
    pub liveness: LivenessStrategy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ports: ports::COMMON_PORTS.to_vec(),
            ping_timeout: Duration::from_millis(2000),
            port_timeout: ports::DEFAULT_PORT_TIMEOUT,
            hostname_timeout: hostname::DEFAULT_HOSTNAME_TIMEOUT,
            liveness: LivenessStrategy::Icmp,
        }
    }
}

/// Per-host probing seam used by the scanner and the job service.
///
/// Implementations must not fail outward: a probe that cannot complete degrades to "dead" or an
/// absent field.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Liveness check with an explicit timeout
    async fn ping(&self, ip: Ipv4Addr, wait: Duration) -> PingResult;

    /// MAC from the local ARP cache, normalized
    async fn local_mac(&self, ip: Ipv4Addr) -> Option<String>;

    /// Full discovery of one address; `None` when the host is down
    async fn discover(&self, ip: Ipv4Addr) -> Option<DiscoveredDevice>;
}

/// The real prober, backed by system commands and TCP connects
#[derive(Debug, Clone, Default)]
pub struct NetworkProber {
    settings: ProbeSettings,
}

impl NetworkProber {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }
}

#[async_trait]
impl HostProbe for NetworkProber {
    async fn ping(&self, ip: Ipv4Addr, wait: Duration) -> PingResult {
        ping::probe_liveness(ip, self.settings.liveness, wait).await
    }

    async fn local_mac(&self, ip: Ipv4Addr) -> Option<String> {
        arp::get_local_mac(ip).await
    }

    async fn discover(&self, ip: Ipv4Addr) -> Option<DiscoveredDevice> {
        let liveness = self.ping(ip, self.settings.ping_timeout).await;
        if !liveness.alive {
            return None;
        }

        let (open_ports, hostname, mac) = tokio::join!(
            ports::scan_ports(ip, &self.settings.ports, self.settings.port_timeout),
            hostname::resolve_hostname(ip, self.settings.hostname_timeout),
            arp::get_local_mac(ip),
        );

        let device = assemble_device(ip, liveness, open_ports, hostname, mac);
        tracing::debug!(
            "{} alive: type={} brand={:?} ports={:?}",
            ip,
            device.device_type,
            device.brand,
            device.open_ports
        );
        Some(device)
    }
}

/// Classify the port evidence and apply the MAC vendor override.
pub fn assemble_device(
    ip: Ipv4Addr,
    liveness: PingResult,
    open_ports: BTreeSet<u16>,
    hostname: Option<String>,
    mac: Option<String>,
) -> DiscoveredDevice {
    let mut verdict = classify(&open_ports);
    if let Some(vendor) = mac.as_deref().and_then(oui::lookup_vendor) {
        verdict.apply_vendor(vendor);
    }

    DiscoveredDevice {
        ip,
        hostname,
        mac,
        device_type: verdict.device_type,
        brand: verdict.brand,
        open_ports,
        response_time_ms: liveness.response_time_ms,
        status: if liveness.alive {
            DeviceStatus::Alive
        } else {
            DeviceStatus::Unreachable
        },
    }
}

/// Scan every usable address in `range`.
///
/// Addresses are probed in fixed batches of `concurrency` spawned tasks; a batch must finish
/// before the next starts. `on_progress` runs after every batch. A probe task that panics aborts
/// the scan and the rest of its batch, as does cancellation (checked before each batch).
pub async fn scan_network<F>(
    range: &CidrRange,
    concurrency: usize,
    prober: Arc<dyn HostProbe>,
    cancel: &CancellationToken,
    on_progress: F,
) -> Result<Vec<DiscoveredDevice>>
where
    F: Fn(ScanProgress) + Send + Sync,
{
    let batch_size = concurrency.max(1);
    let total = range.host_count();
    let mut hosts = range.hosts().peekable();
    let mut devices = Vec::new();
    let mut scanned = 0u64;

    tracing::info!("Scanning {} ({} hosts, {} at a time)", range, total, batch_size);

    while hosts.peek().is_some() {
        if cancel.is_cancelled() {
            tracing::info!("Scan of {} cancelled after {} hosts", range, scanned);
            anyhow::bail!("Scan cancelled by user");
        }

        // dropping the set on an early return aborts whatever is still probing
        let mut batch = JoinSet::new();
        for (index, ip) in hosts.by_ref().take(batch_size).enumerate() {
            let prober = Arc::clone(&prober);
            batch.spawn(async move { (index, prober.discover(ip).await) });
        }
        let batch_len = batch.len() as u64;

        let mut found = Vec::new();
        while let Some(joined) = batch.join_next().await {
            let (index, device) =
                joined.with_context(|| format!("host probe task failed while scanning {}", range))?;
            if let Some(device) = device {
                found.push((index, device));
            }
        }
        found.sort_unstable_by_key(|(index, _)| *index);
        devices.extend(found.into_iter().map(|(_, device)| device));

        scanned += batch_len;
        on_progress(ScanProgress {
            scanned,
            total,
            found: devices.len() as u64,
        });
    }

    tracing::info!("Scan of {} complete: {} of {} hosts alive", range, devices.len(), total);
    Ok(devices)
}
