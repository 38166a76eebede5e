//! MAC OUI (Organizationally Unique Identifier) vendor lookup
//!
//! Two sources with different jobs:
//! - a small static table of vendors that matter for fingerprinting, some carrying a device
//!   type hint. This is what the classifier override uses.
//! - the IEEE registry (`oui-data`), used only to put a manufacturer name on single-host lookups.

use crate::fingerprint::DeviceType;

/// Vendor entry from the static table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacVendor {
    pub vendor: &'static str,
    pub device_hint: Option<DeviceType>,
}

const fn vendor(name: &'static str) -> MacVendor {
    MacVendor {
        vendor: name,
        device_hint: None,
    }
}

const fn hinted(name: &'static str, hint: DeviceType) -> MacVendor {
    MacVendor {
        vendor: name,
        device_hint: Some(hint),
    }
}

/// Prefix (lowercase hex, no separators, 6 or 7 chars) -> vendor
static MAC_VENDORS: &[(&str, MacVendor)] = &[
    // NAS
    ("0011320", hinted("Synology", DeviceType::Nas)),
    ("001132", hinted("Synology", DeviceType::Nas)),
    ("0090a9", hinted("QNAP", DeviceType::Nas)),
    ("b827eb", hinted("QNAP", DeviceType::Nas)),
    // MikroTik
    ("d4ca6d", hinted("MikroTik", DeviceType::Router)),
    ("4c5e0c", hinted("MikroTik", DeviceType::Router)),
    ("e48d8c", hinted("MikroTik", DeviceType::Router)),
    ("6c3b6b", hinted("MikroTik", DeviceType::Router)),
    ("cc2de0", hinted("MikroTik", DeviceType::Router)),
    ("48a98a", hinted("MikroTik", DeviceType::Router)),
    ("2cc8e0", hinted("MikroTik", DeviceType::Router)),
    ("b8fbaf", hinted("MikroTik", DeviceType::Router)),
    // VMware
    ("000c29", hinted("VMware", DeviceType::ServerLinux)),
    ("005056", hinted("VMware", DeviceType::ServerLinux)),
    // Cisco
    ("0050c2", vendor("Cisco")),
    ("000c85", vendor("Cisco")),
    ("0023eb", vendor("Cisco")),
    ("0025b5", vendor("Cisco")),
    ("002255", vendor("Cisco")),
    // Ubiquiti
    ("802aa8", hinted("Ubiquiti", DeviceType::AccessPoint)),
    ("24a43c", hinted("Ubiquiti", DeviceType::AccessPoint)),
    ("f09fc2", hinted("Ubiquiti", DeviceType::AccessPoint)),
    ("44d9e7", hinted("Ubiquiti", DeviceType::AccessPoint)),
    ("dc9fdb", hinted("Ubiquiti", DeviceType::AccessPoint)),
    ("68d79a", hinted("Ubiquiti", DeviceType::AccessPoint)),
    ("b4fbe4", hinted("Ubiquiti", DeviceType::AccessPoint)),
    // TP-Link
    ("6c5cb1", vendor("TP-Link")),
    ("98ded0", vendor("TP-Link")),
    ("c0e42d", vendor("TP-Link")),
    ("5067f0", vendor("TP-Link")),
    ("6466b3", vendor("TP-Link")),
    // D-Link
    ("1cbdb9", vendor("D-Link")),
    ("b8a386", vendor("D-Link")),
    ("908d78", vendor("D-Link")),
    // Aruba/HPE
    ("000b86", hinted("Aruba", DeviceType::AccessPoint)),
    ("24de9a", hinted("Aruba", DeviceType::AccessPoint)),
    ("94b40f", hinted("Aruba", DeviceType::AccessPoint)),
    // HP
    ("3c4a92", vendor("HP")),
    ("1062eb", vendor("HP")),
    ("308d99", vendor("HP")),
    ("2c44fd", vendor("HP")),
    ("9cebe8", vendor("HP")),
    // Dell
    ("f48e38", vendor("Dell")),
    ("18db94", vendor("Dell")),
    ("246e96", vendor("Dell")),
    ("149d09", vendor("Dell")),
    ("d4bed9", vendor("Dell")),
    // Lenovo
    ("988389", vendor("Lenovo")),
    ("7c7a91", vendor("Lenovo")),
    ("e8b2ac", vendor("Lenovo")),
    ("8cec4b", vendor("Lenovo")),
    // ASUS
    ("2c4d54", vendor("ASUS")),
    ("04d9f5", vendor("ASUS")),
    ("40b076", vendor("ASUS")),
    ("74d02b", vendor("ASUS")),
    // Intel
    ("3c970e", vendor("Intel")),
    ("48a472", vendor("Intel")),
    ("3497f6", vendor("Intel")),
    ("a0369f", vendor("Intel")),
    // Apple
    ("3c22fb", vendor("Apple")),
    ("a8667f", vendor("Apple")),
    ("38c986", vendor("Apple")),
    ("f0d5bf", vendor("Apple")),
    ("70cd60", vendor("Apple")),
    // Samsung
    ("f41b46", vendor("Samsung")),
    ("9852b1", vendor("Samsung")),
    ("f8d0ac", vendor("Samsung")),
    // Cameras
    ("c0568d", hinted("Hikvision", DeviceType::Camera)),
    ("44192c", hinted("Hikvision", DeviceType::Camera)),
    ("a0bd1d", hinted("Hikvision", DeviceType::Camera)),
    ("bc3400", hinted("Hikvision", DeviceType::Camera)),
    ("e0509e", hinted("Dahua", DeviceType::Camera)),
    ("3c8cf8", hinted("Dahua", DeviceType::Camera)),
    ("b0a37f", hinted("Dahua", DeviceType::Camera)),
    ("accc8e", hinted("Axis", DeviceType::Camera)),
    ("0001c5", hinted("Axis", DeviceType::Camera)),
    // Printers
    ("002590", hinted("Epson", DeviceType::Printer)),
    ("440444", hinted("Epson", DeviceType::Printer)),
    ("002515", hinted("Canon", DeviceType::Printer)),
    ("e4e749", hinted("Canon", DeviceType::Printer)),
    ("001599", hinted("Brother", DeviceType::Printer)),
    ("3c2af4", hinted("Brother", DeviceType::Printer)),
    // Virtualization
    ("080027", hinted("VirtualBox", DeviceType::Other)),
    ("525400", hinted("QEMU/KVM", DeviceType::ServerLinux)),
    ("00163e", hinted("Xen", DeviceType::ServerLinux)),
    // Smart TV
    ("8c79f5", hinted("Samsung TV", DeviceType::SmartTv)),
    ("74e5f9", hinted("LG TV", DeviceType::SmartTv)),
    ("38f889", hinted("Sony TV", DeviceType::SmartTv)),
];

/// Lookup the vendor for a MAC address in the static table.
///
/// Tries the 6-char OUI prefix first, then a 7-char extended prefix.
pub fn lookup_vendor(mac: &str) -> Option<&'static MacVendor> {
    let compact = compact_mac(mac);

    let found = [6, 7].iter().find_map(|&len| {
        let prefix = compact.get(..len)?;
        MAC_VENDORS
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, v)| v)
    });

    match found {
        Some(v) => tracing::debug!("OUI lookup for {}: {}", mac, v.vendor),
        None => tracing::debug!("OUI lookup for {}: not in vendor table", mac),
    }
    found
}

/// Manufacturer name from the IEEE registry, for display.
pub fn ieee_vendor(mac: &str) -> Option<String> {
    let normalized = normalize_mac(mac)?;
    oui_data::lookup(&format_mac(&normalized).to_uppercase())
        .map(|record| record.organization().to_string())
}

/// Normalize a MAC address to 12 lowercase hex chars without separators.
///
/// Accepts `:`/`-` separated octets (including abbreviated ones like `0:1b:...`),
/// dotted Cisco form and bare hex.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let mac = mac.trim();

    let hex = if mac.contains([':', '-']) {
        let parts: Vec<&str> = mac.split([':', '-']).collect();
        if parts.len() != 6 {
            return None;
        }
        let mut out = String::with_capacity(12);
        for part in parts {
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            if part.len() == 1 {
                out.push('0');
            }
            out.push_str(part);
        }
        out
    } else {
        mac.replace('.', "")
    };

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    Some(hex.to_lowercase())
}

/// Format a normalized MAC as `aa:bb:cc:dd:ee:ff`
pub fn format_mac(normalized: &str) -> String {
    normalized
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

fn compact_mac(mac: &str) -> String {
    mac.trim().replace([':', '-', '.'], "").to_lowercase()
}
