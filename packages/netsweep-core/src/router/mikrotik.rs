//! MikroTik RouterOS 7 REST client

use super::{ArpEntry, DhcpLease, RouterClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Connection settings for a RouterOS REST endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MikroTikConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// HTTPS when true; RouterOS ships a self-signed certificate, which is accepted
    pub secure: bool,
    pub name: Option<String>,
    pub timeout: Duration,
}

impl MikroTikConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 443,
            username: username.into(),
            password: password.into(),
            secure: true,
            name: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/rest", scheme, self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct Identity {
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MikroTikClient {
    config: MikroTikConfig,
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl MikroTikClient {
    pub fn new(config: MikroTikConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to build HTTP client")?;

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("MikroTik {}", config.host));
        let base_url = config.base_url();

        tracing::info!("MikroTik client initialized for {}", config.host);
        Ok(Self {
            config,
            name,
            base_url,
            http,
        })
    }

    async fn request<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);

        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .with_context(|| format!("MikroTik request to {} failed", endpoint))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(anyhow::anyhow!("MikroTik API error: {} on {}", status, endpoint));
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Failed to parse MikroTik response from {}", endpoint))
    }

    /// Credentials and reachability check against `/system/resource`
    pub async fn test_connection(&self) -> Result<()> {
        self.request::<serde_json::Value>("/system/resource").await?;
        Ok(())
    }
}

#[async_trait]
impl RouterClient for MikroTikClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn host(&self) -> &str {
        &self.config.host
    }

    async fn get_arp_table(&self) -> Result<Vec<ArpEntry>> {
        let entries: Vec<ArpEntry> = self.request("/ip/arp").await?;
        tracing::debug!("[MikroTik] Fetched {} ARP entries", entries.len());
        Ok(entries)
    }

    async fn get_dhcp_leases(&self) -> Result<Vec<DhcpLease>> {
        let leases: Vec<DhcpLease> = self.request("/ip/dhcp-server/lease").await?;
        tracing::debug!(
            "[MikroTik] Fetched {} DHCP leases ({} with hostname)",
            leases.len(),
            leases.iter().filter(|l| l.host_name.is_some()).count()
        );
        Ok(leases)
    }

    async fn get_identity(&self) -> Result<Option<String>> {
        let identity: Identity = self.request("/system/identity").await?;
        Ok(identity.name.filter(|n| !n.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let mut config = MikroTikConfig::new("10.0.0.1", "admin", "secret");
        assert_eq!(config.base_url(), "https://10.0.0.1:443/rest");

        config.secure = false;
        config.port = 8080;
        assert_eq!(config.base_url(), "http://10.0.0.1:8080/rest");
    }

    #[test]
    fn test_default_name_uses_host() {
        let client = MikroTikClient::new(MikroTikConfig::new("gw.lan", "admin", "x")).unwrap();
        assert_eq!(client.name(), "MikroTik gw.lan");
        assert_eq!(client.host(), "gw.lan");

        let mut config = MikroTikConfig::new("gw.lan", "admin", "x");
        config.name = Some("core-router".into());
        let client = MikroTikClient::new(config).unwrap();
        assert_eq!(client.name(), "core-router");
    }

    #[tokio::test]
    async fn test_unreachable_router_errors() {
        let mut config = MikroTikConfig::new("127.0.0.1", "admin", "x");
        config.secure = false;
        config.port = 1;
        config.timeout = Duration::from_millis(500);
        let client = MikroTikClient::new(config).unwrap();

        assert!(client.get_arp_table().await.is_err());
        assert!(client.get_network_devices().await.is_err());
        assert!(client.test_connection().await.is_err());
    }
}
