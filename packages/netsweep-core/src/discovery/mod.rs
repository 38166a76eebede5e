//! Discovery jobs.
//!
//! A job takes one or more networks, scans them one after another in a background task,
//! enriches the combined results from the router, and is polled by id. Submission validates
//! everything up front; after that, failures only show up in the job's status.

mod enrich;
mod input;
mod job;
mod lookup;
mod store;

pub use enrich::{apply_router_table, enrich};
pub use input::{MAX_SCAN_HOSTS, normalize_network, plan_networks, split_networks};
pub use job::{DiscoveryJob, JobSnapshot, JobStatus, JobSummary, SubnetProgress};
pub use lookup::{LOOKUP_PING_TIMEOUT, LOOKUP_ROUTER_TIMEOUT, MacLookup, SOURCE_LOCAL};
pub use store::{InMemoryJobStore, JobStore};

use crate::audit::{AuditAction, AuditRecord, AuditResult, AuditSink, TracingAuditSink};
use crate::error::DiscoveryError;
use crate::router::RouterClient;
use crate::scanner::{CidrRange, DEFAULT_CONCURRENCY, DiscoveredDevice, HostProbe, scan_network};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Number of jobs returned by [`DiscoveryService::list_jobs`]
pub const RECENT_JOBS: usize = 10;

const AUDIT_ACTOR: &str = "system";
const CANCELLED_MESSAGE: &str = "Scan cancelled by user";

/// Ceiling on hosts probed in parallel, whatever a submission asks for
pub const MAX_CONCURRENCY: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub concurrency: usize,
    /// Upper bound applied to `concurrency` and to per-submission overrides
    pub max_concurrency: usize,
    pub max_hosts: u64,
    /// Applied to each router call during enrichment
    pub router_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_concurrency: MAX_CONCURRENCY,
            max_hosts: MAX_SCAN_HOSTS,
            router_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-submission overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub concurrency: Option<usize>,
}

/// What submission hands back immediately
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub job_id: String,
    pub status: &'static str,
    pub networks: Vec<String>,
    pub total_hosts: u64,
    pub subnet_progress: BTreeMap<String, SubnetProgress>,
}

/// A submitted job: its id and skeleton, plus the background task driving it
#[derive(Debug)]
pub struct JobHandle {
    pub info: SubmittedJob,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.info.job_id
    }

    /// Wait for the background task to finish. The outcome is read from the job store.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!("Discovery task for job {} ended abnormally: {}", self.info.job_id, e);
        }
    }
}

/// Owns job lifecycle: submission, background execution, queries and cancellation
#[derive(Clone)]
pub struct DiscoveryService {
    store: Arc<dyn JobStore>,
    prober: Arc<dyn HostProbe>,
    router: Option<Arc<dyn RouterClient>>,
    audit: Arc<dyn AuditSink>,
    settings: ServiceSettings,
    cancels: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl DiscoveryService {
    pub fn new(prober: Arc<dyn HostProbe>) -> Self {
        Self {
            store: Arc::new(InMemoryJobStore::new()),
            prober,
            router: None,
            audit: Arc::new(TracingAuditSink),
            settings: ServiceSettings::default(),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_router(mut self, router: Arc<dyn RouterClient>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn router(&self) -> Option<&dyn RouterClient> {
        self.router.as_deref()
    }

    /// Validate `networks` and start a job in the background.
    ///
    /// Each entry may itself hold several comma- or newline-separated tokens. Must be called
    /// from within a tokio runtime.
    pub fn submit<S: AsRef<str>>(
        &self,
        networks: &[S],
        options: SubmitOptions,
    ) -> Result<JobHandle, DiscoveryError> {
        let ranges = plan_networks(networks, self.settings.max_hosts)?;
        let subnets: Vec<(String, u64)> = ranges
            .iter()
            .map(|r| (r.to_string(), r.host_count()))
            .collect();

        let job_id = uuid::Uuid::new_v4().to_string();
        let job = DiscoveryJob::new(job_id.clone(), &subnets);
        let info = SubmittedJob {
            job_id: job_id.clone(),
            status: "started",
            networks: job.networks.clone(),
            total_hosts: job.total_hosts,
            subnet_progress: job.subnet_progress.clone(),
        };
        self.store.insert(job);

        tracing::info!(
            "[Discovery] Job {} queued: {} network(s), {} hosts",
            job_id,
            info.networks.len(),
            info.total_hosts
        );
        self.audit(
            AuditAction::StartDiscovery,
            &info.networks,
            serde_json::json!({
                "jobId": job_id,
                "networks": info.networks,
                "totalHosts": info.total_hosts,
            }),
            AuditResult::Started,
        );

        let cancel = CancellationToken::new();
        self.cancels.lock().insert(job_id.clone(), cancel.clone());

        let concurrency = self.effective_concurrency(options.concurrency);
        let service = self.clone();
        let task = tokio::spawn(async move {
            service.run_job(job_id, ranges, concurrency, cancel).await;
        });

        Ok(JobHandle { info, task })
    }

    /// Requested (or configured) batch size, clamped to `1..=max_concurrency`
    fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.concurrency)
            .clamp(1, self.settings.max_concurrency.max(1))
    }

    pub fn get_job(&self, id: &str) -> Result<JobSnapshot, DiscoveryError> {
        self.store
            .get(id)
            .map(|job| job.snapshot())
            .ok_or_else(|| DiscoveryError::JobNotFound(id.to_string()))
    }

    /// Most recent jobs first; jobs that never started sort last
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        let mut jobs = self.store.all();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs.iter().take(RECENT_JOBS).map(DiscoveryJob::summary).collect()
    }

    /// Request cancellation. A pending job fails immediately; a running one fails before its
    /// next batch. Finished jobs are left as they are.
    pub fn cancel_job(&self, id: &str) -> Result<JobSnapshot, DiscoveryError> {
        if let Some(token) = self.cancels.lock().get(id) {
            token.cancel();
        }

        let mut failed_now = false;
        let found = self.store.update(id, &mut |job| {
            if job.status == JobStatus::Pending {
                failed_now = job.fail(CANCELLED_MESSAGE);
            }
        });
        if !found {
            return Err(DiscoveryError::JobNotFound(id.to_string()));
        }

        tracing::info!("[Discovery] Cancellation requested for job {}", id);
        if failed_now {
            self.audit_failure(id, CANCELLED_MESSAGE);
        }
        self.get_job(id)
    }

    /// Resolve the MAC for one address: local ARP after a ping, then the router
    pub async fn lookup_mac(&self, ip: &str) -> Result<MacLookup, DiscoveryError> {
        lookup::lookup_mac(self.prober.as_ref(), self.router.as_deref(), ip).await
    }

    async fn run_job(&self, job_id: String, ranges: Vec<CidrRange>, concurrency: usize, cancel: CancellationToken) {
        let mut started = false;
        self.store.update(&job_id, &mut |job| started = job.start());
        if !started {
            tracing::debug!("[Discovery] Job {} no longer pending, not starting", job_id);
            self.cancels.lock().remove(&job_id);
            return;
        }

        let outcome = self.scan_all(&job_id, &ranges, concurrency, &cancel).await;
        self.cancels.lock().remove(&job_id);

        match outcome {
            Ok(devices) => {
                let found = devices.len();
                let mut devices = Some(devices);
                self.store.update(&job_id, &mut |job| {
                    if let Some(devices) = devices.take() {
                        job.complete(devices);
                    }
                });
                tracing::info!("[Discovery] Job {} completed: {} devices", job_id, found);

                let networks = self.job_networks(&job_id);
                self.audit(
                    AuditAction::CompleteDiscovery,
                    &networks,
                    serde_json::json!({ "jobId": job_id, "foundHosts": found }),
                    AuditResult::Success,
                );
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::error!("[Discovery] Job {} failed: {}", job_id, message);
                self.store.update(&job_id, &mut |job| {
                    job.fail(message.clone());
                });
                self.audit_failure(&job_id, &message);
            }
        }
    }

    async fn scan_all(
        &self,
        job_id: &str,
        ranges: &[CidrRange],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<DiscoveredDevice>> {
        let mut all = Vec::new();

        // Subnets run one after another
        for range in ranges {
            let network = range.to_string();
            let store = Arc::clone(&self.store);
            let id = job_id.to_string();
            let key = network.clone();

            let devices = scan_network(range, concurrency, Arc::clone(&self.prober), cancel, move |p| {
                store.update(&id, &mut |job| {
                    job.record_progress(&key, p);
                });
            })
            .await?;

            tracing::info!("[Discovery] Subnet {} complete: {} devices", network, devices.len());
            all.extend(devices);
        }

        Ok(enrich(all, self.router.as_deref(), self.settings.router_timeout).await)
    }

    fn job_networks(&self, job_id: &str) -> Vec<String> {
        self.store.get(job_id).map(|job| job.networks).unwrap_or_default()
    }

    fn audit_failure(&self, job_id: &str, message: &str) {
        let networks = self.job_networks(job_id);
        self.audit(
            AuditAction::FailDiscovery,
            &networks,
            serde_json::json!({ "jobId": job_id, "error": message }),
            AuditResult::Failed,
        );
    }

    fn audit(&self, action: AuditAction, networks: &[String], details: serde_json::Value, result: AuditResult) {
        self.audit.record(AuditRecord {
            actor: AUDIT_ACTOR.to_string(),
            action,
            target: networks.join(", "),
            details,
            result,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{PingResult, assemble_device};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;

    /// Hosts whose last octet is odd are alive; `.7` has a cached MAC
    struct OddHosts {
        delay: Duration,
    }

    #[async_trait]
    impl HostProbe for OddHosts {
        async fn ping(&self, ip: Ipv4Addr, _wait: Duration) -> PingResult {
            if ip.octets()[3] % 2 == 1 {
                PingResult::alive(1.5)
            } else {
                PingResult::dead()
            }
        }

        async fn local_mac(&self, ip: Ipv4Addr) -> Option<String> {
            (ip.octets()[3] == 7).then(|| "d4ca6d000007".to_string())
        }

        async fn discover(&self, ip: Ipv4Addr) -> Option<DiscoveredDevice> {
            tokio::time::sleep(self.delay).await;
            let ping = self.ping(ip, Duration::ZERO).await;
            let mac = self.local_mac(ip).await;
            ping.alive
                .then(|| assemble_device(ip, ping, BTreeSet::from([80, 443]), None, mac))
        }
    }

    #[derive(Default)]
    struct RecordingAudit {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl AuditSink for RecordingAudit {
        fn record(&self, record: AuditRecord) {
            self.records.lock().push(record);
        }
    }

    fn service(delay: Duration) -> (DiscoveryService, Arc<RecordingAudit>) {
        let audit = Arc::new(RecordingAudit::default());
        let service = DiscoveryService::new(Arc::new(OddHosts { delay }))
            .with_audit(Arc::clone(&audit) as Arc<dyn AuditSink>);
        (service, audit)
    }

    #[tokio::test]
    async fn test_submit_runs_to_completion() {
        let (service, audit) = service(Duration::ZERO);
        let handle = service
            .submit(&["10.0.0.0/29, 10.0.1.5"], SubmitOptions::default())
            .unwrap();
        assert_eq!(handle.info.networks, vec!["10.0.0.0/29", "10.0.1.5/32"]);
        assert_eq!(handle.info.total_hosts, 7);
        assert_eq!(handle.info.subnet_progress["10.0.1.5/32"].total, 1);

        let id = handle.job_id().to_string();
        handle.wait().await;

        let snap = service.get_job(&id).unwrap();
        assert_eq!(snap.job.status, JobStatus::Completed);
        // .1 .3 .5 and 10.0.1.5; .7 is the broadcast address
        assert_eq!(snap.job.results.len(), 4);
        assert_eq!(snap.job.found_hosts, 4);
        assert_eq!(snap.job.scanned_hosts, 7);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.job.subnet_progress["10.0.0.0/29"].found, 3);
        assert!(snap.job.started_at.is_some() && snap.job.completed_at.is_some());

        let actions: Vec<AuditAction> = audit.records.lock().iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![AuditAction::StartDiscovery, AuditAction::CompleteDiscovery]);
        assert_eq!(audit.records.lock()[0].target, "10.0.0.0/29, 10.0.1.5/32");
        assert_eq!(audit.records.lock()[0].details["jobId"], id);
    }

    /// Counts how many probes run at the same time
    #[derive(Default)]
    struct InFlight {
        current: std::sync::atomic::AtomicUsize,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl HostProbe for InFlight {
        async fn ping(&self, _ip: Ipv4Addr, _wait: Duration) -> PingResult {
            PingResult::dead()
        }

        async fn local_mac(&self, _ip: Ipv4Addr) -> Option<String> {
            None
        }

        async fn discover(&self, _ip: Ipv4Addr) -> Option<DiscoveredDevice> {
            use std::sync::atomic::Ordering;
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            None
        }
    }

    #[tokio::test]
    async fn test_requested_concurrency_is_capped() {
        let prober = Arc::new(InFlight::default());
        let service = DiscoveryService::new(Arc::clone(&prober) as Arc<dyn HostProbe>).with_settings(
            ServiceSettings {
                max_concurrency: 4,
                ..ServiceSettings::default()
            },
        );

        assert_eq!(service.effective_concurrency(Some(2048)), 4);
        assert_eq!(service.effective_concurrency(Some(0)), 1);
        assert_eq!(service.effective_concurrency(None), 4);

        let handle = service
            .submit(&["10.0.0.0/28"], SubmitOptions { concurrency: Some(2048) })
            .unwrap();
        handle.wait().await;

        let peak = prober.peak.load(std::sync::atomic::Ordering::SeqCst);
        assert!(peak <= 4, "peak {}", peak);
        assert!(peak > 1, "peak {}", peak);
    }

    #[test]
    fn test_default_concurrency_within_cap() {
        let settings = ServiceSettings::default();
        assert!(settings.concurrency <= settings.max_concurrency);
    }

    #[tokio::test]
    async fn test_validation_errors_create_no_job() {
        let (service, audit) = service(Duration::ZERO);
        let err = service.submit(&["10.0.0.0/20"], SubmitOptions::default()).unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::TooManyHosts {
                total: 4094,
                max: 2048
            }
        );
        assert!(service.submit(&[""], SubmitOptions::default()).is_err());
        assert!(service.list_jobs().is_empty());
        assert!(audit.records.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (service, _) = service(Duration::ZERO);
        assert_eq!(
            service.get_job("nope").unwrap_err(),
            DiscoveryError::JobNotFound("nope".into())
        );
        assert!(service.cancel_job("nope").is_err());
    }

    #[tokio::test]
    async fn test_cancel_running_job_fails_it() {
        let (service, audit) = service(Duration::from_millis(20));
        let handle = service
            .submit(&["10.0.0.0/24"], SubmitOptions { concurrency: Some(2) })
            .unwrap();
        let id = handle.job_id().to_string();

        tokio::time::sleep(Duration::from_millis(50)).await;
        service.cancel_job(&id).unwrap();
        handle.wait().await;

        let snap = service.get_job(&id).unwrap();
        assert_eq!(snap.job.status, JobStatus::Failed);
        assert_eq!(snap.job.error.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(snap.job.scanned_hosts < 254);
        assert_eq!(
            audit.records.lock().last().map(|r| r.action),
            Some(AuditAction::FailDiscovery)
        );
    }

    #[tokio::test]
    async fn test_cancel_finished_job_is_noop() {
        let (service, _) = service(Duration::ZERO);
        let handle = service.submit(&["10.0.0.1"], SubmitOptions::default()).unwrap();
        let id = handle.job_id().to_string();
        handle.wait().await;

        let snap = service.cancel_job(&id).unwrap();
        assert_eq!(snap.job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_jobs_most_recent_first_capped() {
        let (service, _) = service(Duration::ZERO);
        let mut ids = Vec::new();
        for i in 0..12 {
            let handle = service
                .submit(&[format!("10.0.{}.1", i)], SubmitOptions::default())
                .unwrap();
            ids.push(handle.job_id().to_string());
            handle.wait().await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let jobs = service.list_jobs();
        assert_eq!(jobs.len(), RECENT_JOBS);
        assert_eq!(jobs[0].id, ids[11]);
        assert!(jobs.windows(2).all(|w| w[0].started_at >= w[1].started_at));
    }

    #[tokio::test]
    async fn test_lookup_mac_local() {
        let (service, _) = service(Duration::ZERO);
        let found = service.lookup_mac("10.0.0.7").await.unwrap();
        assert!(found.success);
        assert_eq!(found.source.as_deref(), Some(SOURCE_LOCAL));
        assert_eq!(found.mac.as_deref(), Some("d4ca6d000007"));
        assert_eq!(found.mac_formatted.as_deref(), Some("D4:CA:6D:00:00:07"));
        assert!(found.online);

        let missing = service.lookup_mac("10.0.0.9").await.unwrap();
        assert!(!missing.success && missing.online);

        let offline = service.lookup_mac("10.0.0.8").await.unwrap();
        assert!(!offline.online);
        assert_eq!(offline.message, "Device is offline or unreachable");
    }

    #[tokio::test]
    async fn test_lookup_mac_rejects_bad_input() {
        let (service, _) = service(Duration::ZERO);
        assert_eq!(service.lookup_mac(" ").await.unwrap_err(), DiscoveryError::MissingIp);
        assert_eq!(
            service.lookup_mac("10.0.0.0/24").await.unwrap_err(),
            DiscoveryError::InvalidIp("10.0.0.0/24".into())
        );
    }
}
