//! TCP connect port probing

use futures::future::join_all;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const FTP: u16 = 21;
pub const SSH: u16 = 22;
pub const TELNET: u16 = 23;
pub const HTTP: u16 = 80;
pub const NETBIOS: u16 = 139;
pub const SNMP: u16 = 161;
pub const HTTPS: u16 = 443;
pub const SMB: u16 = 445;
pub const PRINTER_LPD: u16 = 515;
pub const RTSP: u16 = 554;
pub const PRINTER_IPP: u16 = 631;
pub const VMWARE_ESXI: u16 = 902;
pub const MIKROTIK_API_SSL: u16 = 1709;
pub const RDP: u16 = 3389;
pub const CISCO_HTTPS: u16 = 4443;
pub const SYNOLOGY_HTTP: u16 = 5000;
pub const SYNOLOGY_HTTPS: u16 = 5001;
pub const VNC: u16 = 5900;
pub const HIKVISION: u16 = 8000;
pub const PROXMOX_WEB: u16 = 8006;
pub const CHROMECAST: u16 = 8008;
pub const ROKU: u16 = 8060;
pub const QNAP_HTTP: u16 = 8080;
pub const MIKROTIK_WINBOX: u16 = 8291;
pub const QNAP_HTTPS: u16 = 8443;
pub const UBIQUITI_HTTPS: u16 = 8443;
pub const MIKROTIK_API: u16 = 8728;
pub const ONVIF: u16 = 8899;
pub const PRINTER_RAW: u16 = 9100;
pub const VMWARE_VCENTER: u16 = 9443;
pub const FORTIGATE_HTTPS: u16 = 10443;
pub const PLEX: u16 = 32400;
pub const DAHUA: u16 = 37777;

/// Candidate ports probed on every live host
pub const COMMON_PORTS: &[u16] = &[
    FTP,
    SSH,
    TELNET,
    HTTP,
    NETBIOS,
    SNMP,
    HTTPS,
    SMB,
    PRINTER_LPD,
    RTSP,
    PRINTER_IPP,
    VMWARE_ESXI,
    MIKROTIK_API_SSL,
    RDP,
    CISCO_HTTPS,
    SYNOLOGY_HTTP,
    SYNOLOGY_HTTPS,
    VNC,
    HIKVISION,
    PROXMOX_WEB,
    CHROMECAST,
    ROKU,
    QNAP_HTTP,
    MIKROTIK_WINBOX,
    QNAP_HTTPS,
    MIKROTIK_API,
    ONVIF,
    PRINTER_RAW,
    VMWARE_VCENTER,
    FORTIGATE_HTTPS,
    PLEX,
    DAHUA,
];

pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Single TCP connect attempt. Anything but a completed handshake within `wait` is closed.
pub async fn check_port(ip: Ipv4Addr, port: u16, wait: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);
    matches!(timeout(wait, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// Probe all `ports` on `ip` concurrently and return the ones that accepted a connection.
pub async fn scan_ports(ip: Ipv4Addr, ports: &[u16], wait: Duration) -> BTreeSet<u16> {
    let candidates: BTreeSet<u16> = ports.iter().copied().collect();

    let results = join_all(candidates.into_iter().map(|port| async move {
        (port, check_port(ip, port, wait).await)
    }))
    .await;

    let open: BTreeSet<u16> = results
        .into_iter()
        .filter_map(|(port, is_open)| is_open.then_some(port))
        .collect();

    if !open.is_empty() {
        tracing::debug!("{}: open ports {:?}", ip, open);
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_check_port_open() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(check_port(LOCALHOST, port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_check_port_closed() {
        let port = closed_port().await;
        assert!(!check_port(LOCALHOST, port, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_scan_ports_returns_only_open() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port().await;

        let found = scan_ports(LOCALHOST, &[open, closed, open], Duration::from_secs(1)).await;
        assert_eq!(found, BTreeSet::from([open]));
    }

    #[test]
    fn test_common_ports_unique() {
        let unique: BTreeSet<u16> = COMMON_PORTS.iter().copied().collect();
        assert_eq!(unique.len(), COMMON_PORTS.len());
    }
}
