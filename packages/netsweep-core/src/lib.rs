//! netsweep Core Library
//!
//! Active network discovery and device fingerprinting:
//! - Network scanning (ping/TCP liveness, port probes, reverse DNS, local ARP)
//! - Device classification from open ports and MAC vendor
//! - Router enrichment (MikroTik ARP + DHCP) for hosts on other VLANs
//! - Background discovery jobs with per-subnet progress
//!
//! # Example
//!
//! ```no_run
//! use netsweep_core::discovery::{DiscoveryService, SubmitOptions};
//! use netsweep_core::scanner::NetworkProber;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = DiscoveryService::new(Arc::new(NetworkProber::default()));
//!
//!     let handle = service.submit(&["192.168.1.0/24"], SubmitOptions::default())?;
//!     let job_id = handle.job_id().to_string();
//!     handle.wait().await;
//!
//!     let job = service.get_job(&job_id)?;
//!     println!("Found {} devices", job.job.results.len());
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fingerprint;
pub mod router;
pub mod scanner;

// Re-export commonly used types
pub use config::{ConfigSource, NetsweepConfig, load_config};
pub use discovery::{DiscoveryService, JobSnapshot, JobStatus, JobSummary, MacLookup, SubmitOptions};
pub use error::DiscoveryError;
pub use fingerprint::{Classification, DeviceType, classify};
pub use router::{MikroTikClient, RouterClient};
pub use scanner::{CidrRange, DiscoveredDevice, HostProbe, NetworkProber, ScanProgress};
