//! Job registry

use super::job::DiscoveryJob;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Id -> job state. Reads hand out clones so callers never see a half-applied update.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: DiscoveryJob);

    fn get(&self, id: &str) -> Option<DiscoveryJob>;

    /// Apply `f` to the job under the store's write lock. Returns false if the id is unknown.
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut DiscoveryJob)) -> bool;

    /// Every job, in no particular order
    fn all(&self) -> Vec<DiscoveryJob>;
}

/// Process-lifetime store; a restart loses all jobs
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, DiscoveryJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, job: DiscoveryJob) {
        self.jobs.write().insert(job.id.clone(), job);
    }

    fn get(&self, id: &str) -> Option<DiscoveryJob> {
        self.jobs.read().get(id).cloned()
    }

    fn update(&self, id: &str, f: &mut dyn FnMut(&mut DiscoveryJob)) -> bool {
        match self.jobs.write().get_mut(id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    fn all(&self) -> Vec<DiscoveryJob> {
        self.jobs.read().values().cloned().collect()
    }
}
