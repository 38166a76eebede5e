//! netsweep CLI - network discovery and device fingerprinting
//!
//! This binary can:
//! - Sweep one or more subnets and classify what answers
//! - Look up the MAC address of a single host (local ARP, then the router)
//! - Query a MikroTik router's ARP and DHCP tables
//! - Serve the discovery job API over HTTP

mod server;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use netsweep_core::config::{generate_example_config, get_config_file_path_string};
use netsweep_core::discovery::ServiceSettings;
use netsweep_core::scanner::privileges::detect_capabilities;
use netsweep_core::scanner::{LivenessStrategy, NetworkProber};
use netsweep_core::{
    DiscoveredDevice, DiscoveryService, JobStatus, MikroTikClient, NetsweepConfig, RouterClient,
    SubmitOptions, load_config,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "netsweep")]
#[command(author = "netsweep contributors")]
#[command(version)]
#[command(about = "Subnet discovery and device fingerprinting")]
#[command(long_about = "
netsweep finds live hosts on one or more IPv4 subnets, probes a fixed set
of TCP ports, and guesses what each device is from the open ports and its
MAC vendor. With a MikroTik router configured, MACs and hostnames for hosts
on other VLANs are filled in from the router's ARP and DHCP tables.

Quick start:
  1. Scan a subnet:     netsweep scan 192.168.1.0/24
  2. Several at once:   netsweep scan 10.0.1.0/24,10.0.2.0/24
  3. Find a MAC:        netsweep lookup-mac 192.168.1.20
  4. Run the API:       netsweep serve --bind 0.0.0.0:3000

Router credentials: MIKROTIK_HOST, MIKROTIK_USER, MIKROTIK_PASS (see: netsweep config)
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover devices on one or more networks
    Scan {
        /// Networks as CIDR or single IPs (comma separated or repeated)
        #[arg(required = true)]
        networks: Vec<String>,

        /// Hosts probed in parallel
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Use a TCP connect to PORT for liveness instead of ICMP
        #[arg(long, value_name = "PORT")]
        tcp_fallback: Option<u16>,

        /// Skip router enrichment even if a router is configured
        #[arg(long)]
        no_router: bool,
    },

    /// Find the MAC address of a single host
    LookupMac {
        /// IPv4 address
        ip: String,
    },

    /// Query the configured router
    Router {
        #[command(subcommand)]
        action: RouterAction,
    },

    /// Serve the discovery job API
    Serve {
        /// Address to listen on (overrides config)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Show configuration paths and settings
    Config,
}

#[derive(Subcommand)]
pub enum RouterAction {
    /// Check that the router API answers with the configured credentials
    Test,
    /// List devices known to the router (ARP merged with DHCP leases)
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("netsweep={},netsweep_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .init();

    let config = load_config();
    tracing::debug!("Configuration loaded from {}", config.source);

    match &cli.command {
        Commands::Scan {
            networks,
            concurrency,
            tcp_fallback,
            no_router,
        } => cmd_scan(&cli, &config, networks, *concurrency, *tcp_fallback, *no_router).await,
        Commands::LookupMac { ip } => cmd_lookup_mac(&cli, &config, ip).await,
        Commands::Router { action } => cmd_router(&cli, &config, action).await,
        Commands::Serve { bind } => {
            let service = build_service(&config, config.scan.liveness, true)?;
            server::serve(service, bind.unwrap_or(config.bind)).await
        }
        Commands::Config => cmd_config(&cli, &config),
    }
}

fn build_router(config: &NetsweepConfig) -> Result<Option<Arc<dyn RouterClient>>> {
    match &config.router {
        Some(router) => {
            let client = MikroTikClient::new(router.clone())?;
            Ok(Some(Arc::new(client)))
        }
        None => Ok(None),
    }
}

fn build_service(config: &NetsweepConfig, liveness: LivenessStrategy, use_router: bool) -> Result<DiscoveryService> {
    let mut settings = config.scan.probe_settings();
    settings.liveness = liveness;

    let mut service = DiscoveryService::new(Arc::new(NetworkProber::new(settings))).with_settings(ServiceSettings {
        concurrency: config.scan.concurrency,
        max_hosts: config.scan.max_hosts,
        router_timeout: config.router_timeout,
        ..ServiceSettings::default()
    });

    if use_router {
        if let Some(router) = build_router(config)? {
            service = service.with_router(router);
        }
    }
    Ok(service)
}

async fn cmd_scan(
    cli: &Cli,
    config: &NetsweepConfig,
    networks: &[String],
    concurrency: Option<usize>,
    tcp_fallback: Option<u16>,
    no_router: bool,
) -> Result<()> {
    let liveness = match tcp_fallback {
        Some(port) => LivenessStrategy::Tcp { port },
        None => config.scan.liveness,
    };

    if liveness == LivenessStrategy::Icmp {
        // warns on its own when ping is unusable
        let caps = detect_capabilities().await;
        tracing::debug!("Probe capabilities: ping={}, elevated={}", caps.can_ping, caps.is_elevated);
    }

    let service = build_service(config, liveness, !no_router)?;
    let handle = service.submit(networks, SubmitOptions { concurrency })?;
    let job_id = handle.job_id().to_string();

    match cli.format {
        OutputFormat::Text => {
            println!(
                "Scanning {} ({} hosts)...",
                handle.info.networks.join(", "),
                handle.info.total_hosts
            );
        }
        OutputFormat::Json => {}
    }

    // Poll the job the way an API client would; Ctrl+C cancels it
    let mut last_percent = None;
    let snapshot = loop {
        let snapshot = service.get_job(&job_id)?;
        if snapshot.job.status.is_terminal() {
            break snapshot;
        }

        if matches!(cli.format, OutputFormat::Text) && last_percent != Some(snapshot.progress) {
            println!(
                "  [{:>3}%] {}/{} hosts scanned, {} found",
                snapshot.progress,
                snapshot.job.scanned_hosts,
                snapshot.job.total_hosts,
                snapshot.job.found_hosts
            );
            last_percent = Some(snapshot.progress);
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Cancelling scan...");
                service.cancel_job(&job_id)?;
            }
        }
    };

    match cli.format {
        OutputFormat::Text => {
            if snapshot.job.status == JobStatus::Failed {
                bail!(
                    "Scan failed: {}",
                    snapshot.job.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!();
            println!("Found {} devices:", snapshot.job.results.len());
            println!();
            for device in &snapshot.job.results {
                print_device(device);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!(snapshot));
            if snapshot.job.status == JobStatus::Failed {
                bail!("Scan failed");
            }
        }
    }

    Ok(())
}

fn print_device(device: &DiscoveredDevice) {
    let hostname = device.hostname.as_deref().unwrap_or("-");
    let mac = device.mac.as_deref().unwrap_or("-");
    let time_str = device
        .response_time_ms
        .map(|t| format!("{:.1}ms", t))
        .unwrap_or_else(|| "-".to_string());
    let ports = device
        .open_ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let kind = match &device.brand {
        Some(brand) => format!("{} ({})", device.device_type, brand),
        None => device.device_type.to_string(),
    };

    println!(
        "  {:15} {:>8}  {:12}  {:24} {}  [{}]",
        device.ip.to_string(),
        time_str,
        mac,
        kind,
        hostname,
        ports
    );
}

async fn cmd_lookup_mac(cli: &Cli, config: &NetsweepConfig, ip: &str) -> Result<()> {
    let service = build_service(config, config.scan.liveness, true)?;
    let lookup = service.lookup_mac(ip).await?;

    match cli.format {
        OutputFormat::Text => {
            println!("{}", lookup.message);
            if let Some(mac) = &lookup.mac_formatted {
                println!();
                println!("IP:       {}", lookup.ip);
                println!("MAC:      {}", mac);
                println!("Vendor:   {}", lookup.vendor.as_deref().unwrap_or("-"));
                println!("Hostname: {}", lookup.hostname.as_deref().unwrap_or("-"));
                println!("Source:   {}", lookup.source.as_deref().unwrap_or("-"));
            }
            if let Some(ms) = lookup.response_time_ms {
                println!("Ping:     {:.1}ms", ms);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::json!(lookup)),
    }

    Ok(())
}

async fn cmd_router(cli: &Cli, config: &NetsweepConfig, action: &RouterAction) -> Result<()> {
    let router_config = config
        .router
        .clone()
        .context("No router configured. Set MIKROTIK_HOST, MIKROTIK_USER and MIKROTIK_PASS or add a [router] section to the config file.")?;
    let client = MikroTikClient::new(router_config)?;

    match action {
        RouterAction::Test => {
            client.test_connection().await?;
            let identity = client.get_identity().await.unwrap_or(None);
            match cli.format {
                OutputFormat::Text => {
                    println!("Connected to {} ({})", client.name(), client.host());
                    if let Some(identity) = &identity {
                        println!("Identity: {}", identity);
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({
                        "status": "connected",
                        "name": client.name(),
                        "host": client.host(),
                        "identity": identity,
                    }));
                }
            }
        }
        RouterAction::Devices => {
            let devices = client.get_network_devices().await?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{} devices known to {}:", devices.len(), client.name());
                    println!();
                    for device in &devices {
                        println!(
                            "  {:15} {:17}  {:12} {}",
                            device.ip,
                            device.mac.as_deref().unwrap_or("-"),
                            device.interface,
                            device.hostname.as_deref().unwrap_or("-")
                        );
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::json!({ "devices": devices })),
            }
        }
    }

    Ok(())
}

fn cmd_config(cli: &Cli, config: &NetsweepConfig) -> Result<()> {
    let config_path = get_config_file_path_string();
    let router = config.router.as_ref().map(|r| format!("{} ({})", r.host, r.base_url()));

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config_path);
            println!("Loaded from:      {}", config.source);
            println!("Router:           {}", router.as_deref().unwrap_or("not configured"));
            println!("API bind address: {}", config.bind);
            println!("Concurrency:      {}", config.scan.concurrency);
            println!("Host limit:       {}", config.scan.max_hosts);
            println!();
            println!("Environment variables:");
            println!("  MIKROTIK_HOST, MIKROTIK_USER, MIKROTIK_PASS - Router credentials");
            println!("  MIKROTIK_PORT, MIKROTIK_SECURE              - Router API port and HTTPS toggle");
            println!("  NETSWEEP_BIND                               - API bind address");
            println!("  NETSWEEP_CONCURRENCY                        - Hosts probed in parallel");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", generate_example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "config_file": config_path,
                "source": config.source.to_string(),
                "router": router,
                "bind": config.bind.to_string(),
                "concurrency": config.scan.concurrency,
                "max_hosts": config.scan.max_hosts,
            }));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_args() {
        let cli = Cli::parse_from([
            "netsweep",
            "--format",
            "json",
            "scan",
            "10.0.1.0/24",
            "10.0.2.5",
            "--tcp-fallback",
            "443",
            "--no-router",
        ]);
        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Scan {
                networks,
                concurrency,
                tcp_fallback,
                no_router,
            } => {
                assert_eq!(networks, vec!["10.0.1.0/24", "10.0.2.5"]);
                assert_eq!(concurrency, None);
                assert_eq!(tcp_fallback, Some(443));
                assert!(no_router);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_scan_requires_network() {
        assert!(Cli::try_parse_from(["netsweep", "scan"]).is_err());
    }

    #[test]
    fn test_service_without_router() {
        let service = build_service(&NetsweepConfig::default(), LivenessStrategy::Icmp, true).unwrap();
        assert!(service.router().is_none());
    }
}
