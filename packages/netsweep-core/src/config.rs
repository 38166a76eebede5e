//! Configuration loading
//!
//! Each setting is taken from the first layer that sets it: environment variables, then
//! `config.toml` in the user config directory, then built-in defaults.

use crate::router::MikroTikConfig;
use crate::scanner::{LivenessStrategy, ProbeSettings, ports};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:3000";

const ENV_MIKROTIK_HOST: &str = "MIKROTIK_HOST";
const ENV_MIKROTIK_USER: &str = "MIKROTIK_USER";
const ENV_MIKROTIK_PASS: &str = "MIKROTIK_PASS";
const ENV_MIKROTIK_PORT: &str = "MIKROTIK_PORT";
const ENV_MIKROTIK_SECURE: &str = "MIKROTIK_SECURE";
const ENV_BIND: &str = "NETSWEEP_BIND";
const ENV_CONCURRENCY: &str = "NETSWEEP_CONCURRENCY";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    scan: Option<ScanSection>,
    router: Option<RouterSection>,
    server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ScanSection {
    concurrency: Option<usize>,
    ping_timeout_ms: Option<u64>,
    port_timeout_ms: Option<u64>,
    hostname_timeout_ms: Option<u64>,
    max_hosts: Option<u64>,
    /// "icmp" or "tcp"
    liveness: Option<String>,
    tcp_port: Option<u16>,
    ports: Option<Vec<u16>>,
}

#[derive(Debug, Deserialize, Default)]
struct RouterSection {
    host: Option<String>,
    username: Option<String>,
    password: Option<String>,
    port: Option<u16>,
    secure: Option<bool>,
    name: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerSection {
    bind: Option<String>,
}

/// Scanner and job limits
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub ping_timeout: Duration,
    pub port_timeout: Duration,
    pub hostname_timeout: Duration,
    pub max_hosts: u64,
    pub liveness: LivenessStrategy,
    pub ports: Vec<u16>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let probe = ProbeSettings::default();
        Self {
            concurrency: crate::scanner::DEFAULT_CONCURRENCY,
            ping_timeout: probe.ping_timeout,
            port_timeout: probe.port_timeout,
            hostname_timeout: probe.hostname_timeout,
            max_hosts: crate::discovery::MAX_SCAN_HOSTS,
            liveness: probe.liveness,
            ports: probe.ports,
        }
    }
}

impl ScanConfig {
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            ports: self.ports.clone(),
            ping_timeout: self.ping_timeout,
            port_timeout: self.port_timeout,
            hostname_timeout: self.hostname_timeout,
            liveness: self.liveness,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct NetsweepConfig {
    pub scan: ScanConfig,
    /// Present only when host, username and password are all known
    pub router: Option<MikroTikConfig>,
    /// Timeout applied to router calls during enrichment
    pub router_timeout: Duration,
    pub bind: SocketAddr,
    /// Highest-priority layer that set anything (for logging)
    pub source: ConfigSource,
}

impl Default for NetsweepConfig {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            router: None,
            router_timeout: Duration::from_secs(10),
            bind: default_bind(),
            source: ConfigSource::Default,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("netsweep").join("config.toml"))
}

/// Load configuration from the config file
fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

/// Load configuration with priority:
/// 1. Environment variables (MIKROTIK_*, NETSWEEP_*)
/// 2. Config file (~/.config/netsweep/config.toml)
/// 3. Default values
pub fn load_config() -> NetsweepConfig {
    let path = get_config_file_path();
    load_config_with(|key| std::env::var(key).ok(), path.as_deref())
}

/// [`load_config`] with the environment lookup and file path supplied by the caller
pub fn load_config_with<E>(env: E, path: Option<&Path>) -> NetsweepConfig
where
    E: Fn(&str) -> Option<String>,
{
    let mut config = NetsweepConfig::default();
    let mut router = RouterSection::default();

    // Config file layer
    if let Some(file) = path.and_then(load_config_file) {
        config.source = ConfigSource::ConfigFile;
        if let Some(scan) = file.scan {
            apply_scan_section(&mut config.scan, scan);
        }
        if let Some(section) = file.router {
            router = section;
        }
        if let Some(bind) = file.server.and_then(|s| s.bind) {
            match bind.trim().parse() {
                Ok(addr) => config.bind = addr,
                Err(_) => tracing::warn!("Ignoring invalid server.bind {:?}", bind),
            }
        }
    }

    // Environment layer
    let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut from_env = false;

    if let Some(host) = env(ENV_MIKROTIK_HOST) {
        router.host = Some(host);
        from_env = true;
    }
    if let Some(user) = env(ENV_MIKROTIK_USER) {
        router.username = Some(user);
        from_env = true;
    }
    if let Some(pass) = env(ENV_MIKROTIK_PASS) {
        router.password = Some(pass);
        from_env = true;
    }
    if let Some(port) = env(ENV_MIKROTIK_PORT) {
        match port.parse() {
            Ok(port) => {
                router.port = Some(port);
                from_env = true;
            }
            Err(_) => tracing::warn!("Ignoring invalid {}={:?}", ENV_MIKROTIK_PORT, port),
        }
    }
    if let Some(secure) = env(ENV_MIKROTIK_SECURE) {
        // anything but "false" keeps HTTPS
        router.secure = Some(secure != "false");
        from_env = true;
    }
    if let Some(bind) = env(ENV_BIND) {
        match bind.parse() {
            Ok(addr) => {
                config.bind = addr;
                from_env = true;
            }
            Err(_) => tracing::warn!("Ignoring invalid {}={:?}", ENV_BIND, bind),
        }
    }
    if let Some(concurrency) = env(ENV_CONCURRENCY) {
        match concurrency.parse::<usize>() {
            Ok(n) if n > 0 => {
                config.scan.concurrency = n;
                from_env = true;
            }
            _ => tracing::warn!("Ignoring invalid {}={:?}", ENV_CONCURRENCY, concurrency),
        }
    }

    if from_env {
        config.source = ConfigSource::Environment;
    }

    if let Some(secs) = router.timeout_secs {
        config.router_timeout = Duration::from_secs(secs.max(1));
    }
    config.router = build_router_config(router, config.router_timeout);

    tracing::debug!(
        "Configuration loaded from {} (router {})",
        config.source,
        if config.router.is_some() { "configured" } else { "not configured" }
    );
    config
}

fn apply_scan_section(scan: &mut ScanConfig, section: ScanSection) {
    if let Some(n) = section.concurrency.filter(|n| *n > 0) {
        scan.concurrency = n;
    }
    if let Some(ms) = section.ping_timeout_ms {
        scan.ping_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = section.port_timeout_ms {
        scan.port_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = section.hostname_timeout_ms {
        scan.hostname_timeout = Duration::from_millis(ms);
    }
    if let Some(max) = section.max_hosts {
        scan.max_hosts = max;
    }
    if let Some(ports) = section.ports.filter(|p| !p.is_empty()) {
        scan.ports = ports;
    }
    match section.liveness.as_deref().map(str::trim) {
        Some("tcp") => {
            scan.liveness = LivenessStrategy::Tcp {
                port: section.tcp_port.unwrap_or(ports::HTTP),
            }
        }
        Some("icmp") | None => {}
        Some(other) => tracing::warn!("Ignoring unknown scan.liveness {:?}", other),
    }
}

fn build_router_config(section: RouterSection, timeout: Duration) -> Option<MikroTikConfig> {
    let host = section.host.filter(|h| !h.trim().is_empty())?;
    let username = section.username?;
    let password = section.password?;

    let mut config = MikroTikConfig::new(host, username, password);
    config.secure = section.secure.unwrap_or(true);
    config.port = section.port.unwrap_or(if config.secure { 443 } else { 80 });
    config.name = section.name;
    config.timeout = timeout;
    Some(config)
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/netsweep/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    format!(
        r#"# netsweep configuration
# Place this file at: ~/.config/netsweep/config.toml
# Environment variables (MIKROTIK_HOST, MIKROTIK_USER, MIKROTIK_PASS, MIKROTIK_PORT,
# MIKROTIK_SECURE, NETSWEEP_BIND, NETSWEEP_CONCURRENCY) take precedence.

[scan]
# Hosts probed in parallel per batch
# concurrency = 20
# ping_timeout_ms = 2000
# port_timeout_ms = 1000
# hostname_timeout_ms = 2000
# Largest total host count accepted per job
# max_hosts = 2048
# "icmp" uses the system ping; "tcp" connects to tcp_port instead
# liveness = "icmp"
# tcp_port = 80
# ports = [22, 80, 443, 3389]

[router]
# MikroTik RouterOS 7 REST API, used to fill MACs and hostnames across VLANs
# host = "192.168.88.1"
# username = "api"
# password = "secret"
# port = 443
# secure = true
# name = "core-router"
# timeout_secs = 10

[server]
# bind = "{}"
"#,
        DEFAULT_BIND
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = load_config_with(env_from(&[]), None);
        assert_eq!(config.source, ConfigSource::Default);
        assert_eq!(config.scan.concurrency, 20);
        assert_eq!(config.scan.max_hosts, 2048);
        assert_eq!(config.scan.port_timeout, Duration::from_millis(1000));
        assert_eq!(config.scan.liveness, LivenessStrategy::Icmp);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
        assert!(config.router.is_none());
    }

    #[test]
    fn test_config_file_layer() {
        let file = write_config(
            r#"
[scan]
concurrency = 50
liveness = "tcp"
tcp_port = 22
ports = [22, 443]

[router]
host = "10.0.0.1"
username = "api"
password = "pw"
secure = false
timeout_secs = 4

[server]
bind = "0.0.0.0:8080"
"#,
        );

        let config = load_config_with(env_from(&[]), Some(file.path()));
        assert_eq!(config.source, ConfigSource::ConfigFile);
        assert_eq!(config.scan.concurrency, 50);
        assert_eq!(config.scan.liveness, LivenessStrategy::Tcp { port: 22 });
        assert_eq!(config.scan.ports, vec![22, 443]);
        assert_eq!(config.bind.to_string(), "0.0.0.0:8080");
        assert_eq!(config.router_timeout, Duration::from_secs(4));

        let router = config.router.unwrap();
        assert_eq!(router.base_url(), "http://10.0.0.1:80/rest");
        assert_eq!(router.timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[router]\nhost = \"10.0.0.1\"\nusername = \"a\"\npassword = \"b\"\n");
        let env = env_from(&[
            ("MIKROTIK_HOST", "10.9.9.9"),
            ("MIKROTIK_PORT", "8443"),
            ("NETSWEEP_CONCURRENCY", "5"),
        ]);

        let config = load_config_with(env, Some(file.path()));
        assert_eq!(config.source, ConfigSource::Environment);
        assert_eq!(config.scan.concurrency, 5);
        let router = config.router.unwrap();
        assert_eq!(router.host, "10.9.9.9");
        assert_eq!(router.username, "a");
        assert_eq!(router.base_url(), "https://10.9.9.9:8443/rest");
    }

    #[test]
    fn test_router_needs_credentials() {
        let config = load_config_with(env_from(&[("MIKROTIK_HOST", "10.0.0.1")]), None);
        assert!(config.router.is_none());

        let config = load_config_with(
            env_from(&[
                ("MIKROTIK_HOST", "10.0.0.1"),
                ("MIKROTIK_USER", "api"),
                ("MIKROTIK_PASS", "pw"),
                ("MIKROTIK_SECURE", "false"),
            ]),
            None,
        );
        let router = config.router.unwrap();
        assert!(!router.secure);
        assert_eq!(router.port, 80);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let file = write_config("this is = = not toml");
        let env = env_from(&[("NETSWEEP_CONCURRENCY", "0"), ("NETSWEEP_BIND", "nowhere")]);
        let config = load_config_with(env, Some(file.path()));
        assert_eq!(config, NetsweepConfig::default());
    }

    #[test]
    fn test_example_config_parses() {
        let parsed: ConfigFile = toml::from_str(&generate_example_config()).unwrap();
        assert!(parsed.scan.is_some());
        assert!(parsed.router.is_some());
    }
}
