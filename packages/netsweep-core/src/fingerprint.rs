//! Port-based device fingerprinting
//!
//! Rules are checked from the highest priority down; the first one that matches wins.
//! A rule matches when
//! 1. every required port is open, or, when it has no required ports, at least one of its
//!    optional ports is open; and
//! 2. none of its exclude ports is open.
//!
//! Optional ports on a rule that has required ports are informational only.

use crate::scanner::oui::MacVendor;
use crate::scanner::ports::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    Router,
    Switch,
    AccessPoint,
    Nas,
    ServerLinux,
    PcWindows,
    PcLinux,
    Printer,
    Camera,
    SmartTv,
    MediaServer,
    Other,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Router => "ROUTER",
            DeviceType::Switch => "SWITCH",
            DeviceType::AccessPoint => "ACCESS_POINT",
            DeviceType::Nas => "NAS",
            DeviceType::ServerLinux => "SERVER_LINUX",
            DeviceType::PcWindows => "PC_WINDOWS",
            DeviceType::PcLinux => "PC_LINUX",
            DeviceType::Printer => "PRINTER",
            DeviceType::Camera => "CAMERA",
            DeviceType::SmartTv => "SMART_TV",
            DeviceType::MediaServer => "MEDIA_SERVER",
            DeviceType::Other => "OTHER",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FingerprintRule {
    pub device_type: DeviceType,
    pub brand: Option<&'static str>,
    pub required_ports: &'static [u16],
    pub optional_ports: &'static [u16],
    pub exclude_ports: &'static [u16],
    pub priority: i32,
}

impl FingerprintRule {
    pub fn matches(&self, open: &BTreeSet<u16>) -> bool {
        let required_ok = if self.required_ports.is_empty() {
            self.optional_ports.iter().any(|p| open.contains(p))
        } else {
            self.required_ports.iter().all(|p| open.contains(p))
        };

        required_ok && !self.exclude_ports.iter().any(|p| open.contains(p))
    }
}

const NONE: &[u16] = &[];

static FINGERPRINT_RULES: &[FingerprintRule] = &[
    // Network equipment
    FingerprintRule {
        device_type: DeviceType::Router,
        brand: Some("MikroTik"),
        required_ports: NONE,
        optional_ports: &[MIKROTIK_API, MIKROTIK_WINBOX, MIKROTIK_API_SSL],
        exclude_ports: NONE,
        priority: 100,
    },
    FingerprintRule {
        device_type: DeviceType::AccessPoint,
        brand: Some("Ubiquiti"),
        required_ports: &[UBIQUITI_HTTPS],
        optional_ports: &[SSH],
        exclude_ports: NONE,
        priority: 95,
    },
    FingerprintRule {
        device_type: DeviceType::Router,
        brand: Some("Fortinet"),
        required_ports: &[FORTIGATE_HTTPS],
        optional_ports: NONE,
        exclude_ports: NONE,
        priority: 95,
    },
    // NAS
    FingerprintRule {
        device_type: DeviceType::Nas,
        brand: Some("Synology"),
        required_ports: &[SYNOLOGY_HTTP],
        optional_ports: &[SYNOLOGY_HTTPS, SSH, SMB],
        exclude_ports: NONE,
        priority: 90,
    },
    FingerprintRule {
        device_type: DeviceType::Nas,
        brand: Some("Synology"),
        required_ports: &[SYNOLOGY_HTTPS],
        optional_ports: &[SSH, SMB],
        exclude_ports: NONE,
        priority: 90,
    },
    FingerprintRule {
        device_type: DeviceType::Nas,
        brand: Some("QNAP"),
        required_ports: &[QNAP_HTTP],
        optional_ports: &[QNAP_HTTPS, SSH, SMB],
        exclude_ports: NONE,
        priority: 90,
    },
    // Virtualization
    FingerprintRule {
        device_type: DeviceType::ServerLinux,
        brand: Some("Proxmox"),
        required_ports: &[PROXMOX_WEB],
        optional_ports: &[SSH],
        exclude_ports: NONE,
        priority: 85,
    },
    FingerprintRule {
        device_type: DeviceType::ServerLinux,
        brand: Some("VMware ESXi"),
        required_ports: &[VMWARE_ESXI],
        optional_ports: &[HTTPS],
        exclude_ports: NONE,
        priority: 85,
    },
    // Cameras
    FingerprintRule {
        device_type: DeviceType::Camera,
        brand: Some("Hikvision"),
        required_ports: &[HIKVISION],
        optional_ports: &[RTSP, ONVIF, HTTP],
        exclude_ports: NONE,
        priority: 80,
    },
    FingerprintRule {
        device_type: DeviceType::Camera,
        brand: Some("Dahua"),
        required_ports: &[DAHUA],
        optional_ports: &[RTSP, HTTP],
        exclude_ports: NONE,
        priority: 80,
    },
    FingerprintRule {
        device_type: DeviceType::Camera,
        brand: Some("Generic IP Camera"),
        required_ports: &[RTSP],
        optional_ports: &[ONVIF, HTTP],
        // a Windows PC that happens to stream
        exclude_ports: &[RDP, SMB],
        priority: 75,
    },
    // Smart TV / media
    FingerprintRule {
        device_type: DeviceType::SmartTv,
        brand: Some("Chromecast"),
        required_ports: &[CHROMECAST],
        optional_ports: NONE,
        exclude_ports: NONE,
        priority: 72,
    },
    FingerprintRule {
        device_type: DeviceType::SmartTv,
        brand: Some("Roku"),
        required_ports: &[ROKU],
        optional_ports: NONE,
        exclude_ports: NONE,
        priority: 72,
    },
    FingerprintRule {
        device_type: DeviceType::MediaServer,
        brand: Some("Plex"),
        required_ports: &[PLEX],
        optional_ports: &[HTTP],
        exclude_ports: NONE,
        priority: 72,
    },
    // Printers
    FingerprintRule {
        device_type: DeviceType::Printer,
        brand: None,
        required_ports: &[PRINTER_RAW],
        optional_ports: &[PRINTER_IPP, HTTP, PRINTER_LPD],
        exclude_ports: NONE,
        priority: 70,
    },
    FingerprintRule {
        device_type: DeviceType::Printer,
        brand: None,
        required_ports: &[PRINTER_IPP],
        optional_ports: &[HTTP],
        exclude_ports: NONE,
        priority: 65,
    },
    // Computers
    FingerprintRule {
        device_type: DeviceType::PcWindows,
        brand: None,
        required_ports: &[RDP],
        optional_ports: &[SMB, NETBIOS],
        exclude_ports: NONE,
        priority: 60,
    },
    FingerprintRule {
        device_type: DeviceType::PcWindows,
        brand: None,
        required_ports: &[SMB, NETBIOS],
        optional_ports: NONE,
        // NAS boxes also serve SMB
        exclude_ports: &[SYNOLOGY_HTTP, SYNOLOGY_HTTPS, QNAP_HTTP],
        priority: 55,
    },
    // SSH only means a workstation; SSH plus a web port means a server. PC_LINUX has to rank
    // first, its exclude list is what separates the two.
    FingerprintRule {
        device_type: DeviceType::PcLinux,
        brand: None,
        required_ports: &[SSH],
        optional_ports: NONE,
        exclude_ports: &[RDP, HTTP, HTTPS],
        priority: 50,
    },
    FingerprintRule {
        device_type: DeviceType::ServerLinux,
        brand: None,
        required_ports: &[SSH],
        optional_ports: &[HTTP, HTTPS],
        exclude_ports: &[RDP],
        priority: 45,
    },
    // Network equipment fallback
    FingerprintRule {
        device_type: DeviceType::Switch,
        brand: None,
        required_ports: &[SNMP],
        optional_ports: NONE,
        exclude_ports: &[RDP, SSH],
        priority: 40,
    },
    FingerprintRule {
        device_type: DeviceType::Router,
        brand: None,
        required_ports: &[SNMP, TELNET],
        optional_ports: NONE,
        exclude_ports: NONE,
        priority: 40,
    },
];

/// Rules ordered by priority, highest first. Equal priorities keep table order.
pub fn ranked_rules() -> &'static [FingerprintRule] {
    static RANKED: OnceLock<Vec<FingerprintRule>> = OnceLock::new();
    RANKED.get_or_init(|| {
        let mut rules = FINGERPRINT_RULES.to_vec();
        // sort_by is stable
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    })
}

/// Classifier verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub device_type: DeviceType,
    pub brand: Option<String>,
}

impl Classification {
    pub fn other() -> Self {
        Self {
            device_type: DeviceType::Other,
            brand: None,
        }
    }

    /// Merge MAC vendor evidence: vendor becomes the brand when none was detected, and a
    /// vendor device hint replaces an OTHER verdict.
    pub fn apply_vendor(&mut self, vendor: &MacVendor) {
        if self.brand.is_none() {
            self.brand = Some(vendor.vendor.to_string());
        }

        if self.device_type == DeviceType::Other {
            if let Some(hint) = vendor.device_hint {
                self.device_type = hint;
            }
        }
    }
}

/// Best-guess device type and brand from a set of open ports
pub fn classify(open_ports: &BTreeSet<u16>) -> Classification {
    match ranked_rules().iter().find(|rule| rule.matches(open_ports)) {
        Some(rule) => {
            tracing::debug!(
                "Matched fingerprint {} {} from ports {:?}",
                rule.device_type,
                rule.brand.unwrap_or(""),
                open_ports
            );
            Classification {
                device_type: rule.device_type,
                brand: rule.brand.map(String::from),
            }
        }
        None => {
            tracing::debug!("No fingerprint match for ports {:?}", open_ports);
            Classification::other()
        }
    }
}
