//! Local ARP cache lookup using the system `arp` command

use super::hidden_command_sync;
use super::oui::normalize_mac;
use std::net::Ipv4Addr;

/// Look up the MAC address the local ARP cache holds for `ip`.
///
/// Returns the normalized MAC (12 lowercase hex chars). Missing entries, incomplete entries and
/// command failures all come back as `None`.
pub async fn get_local_mac(ip: Ipv4Addr) -> Option<String> {
    let ip_str = ip.to_string();

    tokio::task::spawn_blocking(move || {
        #[cfg(target_os = "windows")]
        let output = hidden_command_sync("arp").args(["-a", &ip_str]).output();

        #[cfg(not(target_os = "windows"))]
        let output = hidden_command_sync("arp").args(["-n", &ip_str]).output();

        match output {
            Ok(output) => first_mac_token(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                tracing::debug!("arp lookup for {} could not run: {}", ip_str, e);
                None
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// First MAC-shaped token in `arp` output, normalized.
///
/// Handles the Linux column format, the BSD/macOS `? (ip) at mac on ifN` format (which drops
/// leading zeros from octets) and the Windows dash-separated format.
pub(crate) fn first_mac_token(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .filter(|token| token.contains([':', '-']))
        .filter_map(normalize_mac)
        .find(|mac| mac.chars().any(|c| c != '0'))
}
