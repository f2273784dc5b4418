//! # Job Registry
//!
//! Cross-job state store: one aggregate and one mutation lock per job.
//! Writes to a single job's tree are serialized by its `tokio::sync::Mutex`
//! (single writer per job); concurrency across jobs is unbounded.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::core::ids::JobId;
use crate::models::core::job::Job;

/// Shared handle to one job's aggregate
pub type JobHandle = Arc<Mutex<Job>>;

/// In-memory registry of running jobs.
///
/// The aggregate itself serializes as a single document, so callers that need
/// durability snapshot the tree under the job lock and persist it atomically
/// per recalculation round.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, JobHandle>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    /// Register a job and return its handle
    pub fn insert(&self, job: Job) -> JobHandle {
        let id = job.id;
        let handle = Arc::new(Mutex::new(job));
        self.jobs.insert(id, Arc::clone(&handle));
        handle
    }

    /// Handle for a registered job
    pub fn get(&self, id: &JobId) -> Option<JobHandle> {
        self.jobs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a job from the registry, returning its handle if present
    pub fn remove(&self, id: &JobId) -> Option<JobHandle> {
        self.jobs.remove(id).map(|(_, handle)| handle)
    }

    /// Ids of every registered job
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::step::Step;

    #[test]
    fn test_insert_and_lookup() {
        let registry = JobRegistry::new();
        let job = Job::new("onboarding", vec![Step::atomic("collect_details")]);
        let id = job.id;

        registry.insert(job);
        assert_eq!(registry.len(), 1);

        let handle = registry.get(&id).unwrap();
        tokio_test::block_on(async {
            assert_eq!(handle.lock().await.name, "onboarding");
        });
    }

    #[test]
    fn test_remove() {
        let registry = JobRegistry::new();
        let job = Job::new("onboarding", vec![Step::atomic("collect_details")]);
        let id = job.id;
        registry.insert(job);

        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }
}
