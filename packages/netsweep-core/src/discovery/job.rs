//! Discovery job state

use crate::scanner::{DiscoveredDevice, ScanProgress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetProgress {
    pub scanned: u64,
    pub total: u64,
    pub found: u64,
}

impl From<ScanProgress> for SubnetProgress {
    fn from(p: ScanProgress) -> Self {
        Self {
            scanned: p.scanned,
            total: p.total,
            found: p.found,
        }
    }
}

/// One discovery job.
///
/// Status only moves forward: Pending -> Running -> Completed | Failed. The transition methods
/// return `false` and leave the job untouched when asked to do anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryJob {
    pub id: String,
    pub networks: Vec<String>,
    pub status: JobStatus,
    pub total_hosts: u64,
    pub scanned_hosts: u64,
    pub found_hosts: u64,
    pub subnet_progress: BTreeMap<String, SubnetProgress>,
    pub results: Vec<DiscoveredDevice>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl DiscoveryJob {
    /// New pending job over `(network, usable hosts)` pairs
    pub fn new(id: impl Into<String>, subnets: &[(String, u64)]) -> Self {
        let subnet_progress = subnets
            .iter()
            .map(|(net, total)| {
                (
                    net.clone(),
                    SubnetProgress {
                        total: *total,
                        ..Default::default()
                    },
                )
            })
            .collect();

        Self {
            id: id.into(),
            networks: subnets.iter().map(|(net, _)| net.clone()).collect(),
            status: JobStatus::Pending,
            total_hosts: subnets.iter().map(|(_, total)| total).sum(),
            scanned_hosts: 0,
            found_hosts: 0,
            subnet_progress,
            results: Vec::new(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Replace one subnet's counters and recompute the job-wide sums
    pub fn record_progress(&mut self, network: &str, progress: ScanProgress) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        let Some(entry) = self.subnet_progress.get_mut(network) else {
            return false;
        };
        *entry = progress.into();

        self.scanned_hosts = self.subnet_progress.values().map(|p| p.scanned).sum();
        self.found_hosts = self.subnet_progress.values().map(|p| p.found).sum();
        true
    }

    pub fn complete(&mut self, results: Vec<DiscoveredDevice>) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.found_hosts = results.len() as u64;
        self.scanned_hosts = self.total_hosts;
        self.results = results;
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        true
    }

    /// Percent complete, `round(scanned / total * 100)`; 0 when there is nothing to scan
    pub fn progress_percent(&self) -> u32 {
        if self.total_hosts == 0 {
            return 0;
        }
        (self.scanned_hosts as f64 / self.total_hosts as f64 * 100.0).round() as u32
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            network: self.networks.join(", "),
            progress: self.progress_percent(),
            job: self.clone(),
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            networks: self.networks.clone(),
            network: self.networks.join(", "),
            status: self.status,
            total_hosts: self.total_hosts,
            scanned_hosts: self.scanned_hosts,
            found_hosts: self.found_hosts,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Point-in-time copy of a job, as returned by polling
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    #[serde(flatten)]
    pub job: DiscoveryJob,
    /// Networks joined with ", "
    pub network: String,
    pub progress: u32,
}

/// Job without its result payload, for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub networks: Vec<String>,
    pub network: String,
    pub status: JobStatus,
    pub total_hosts: u64,
    pub scanned_hosts: u64,
    pub found_hosts: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
