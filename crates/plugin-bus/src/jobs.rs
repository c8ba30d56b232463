//! In-flight handshake jobs.
//!
//! Jobs are not persisted: a restart between ack and completion orphans the
//! job and the caller never sees a completion for it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Maps job id to the tenant that started it, from ack until completion.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, String>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh job id for `tenant`.
    ///
    /// The entry lives until the returned [`PendingJob`] is completed or
    /// dropped, so a handler that panics does not leak it.
    pub fn begin(self: &Arc<Self>, tenant: &str) -> PendingJob {
        let job_id = Uuid::new_v4().to_string();
        self.jobs.lock().insert(job_id.clone(), tenant.to_string());
        PendingJob {
            jobs: Arc::clone(self),
            job_id,
        }
    }

    /// Tenant of a pending job.
    pub fn tenant_for(&self, job_id: &str) -> Option<String> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Consume a job. Returns `None` if it was already completed or never existed.
    pub fn complete(&self, job_id: &str) -> Option<String> {
        self.jobs.lock().remove(job_id)
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }
}

/// Registry entry of one running job.
#[derive(Debug)]
pub struct PendingJob {
    jobs: Arc<JobRegistry>,
    job_id: String,
}

impl PendingJob {
    pub fn id(&self) -> &str {
        &self.job_id
    }

    /// Remove the entry, returning the tenant that started the job.
    pub fn complete(self) -> Option<String> {
        self.jobs.complete(&self.job_id)
    }
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        self.jobs.complete(&self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_consumed_once() {
        let jobs = Arc::new(JobRegistry::new());
        let job = jobs.begin("S1");
        let job_id = job.id().to_string();

        assert!(Uuid::parse_str(&job_id).is_ok());
        assert_eq!(jobs.tenant_for(&job_id).as_deref(), Some("S1"));
        assert_eq!(jobs.pending(), 1);

        assert_eq!(job.complete().as_deref(), Some("S1"));
        assert_eq!(jobs.complete(&job_id), None);
        assert_eq!(jobs.pending(), 0);
    }

    #[test]
    fn test_job_ids_unique() {
        let jobs = Arc::new(JobRegistry::new());
        let a = jobs.begin("S1");
        let b = jobs.begin("S1");
        assert_ne!(a.id(), b.id());
        assert_eq!(jobs.pending(), 2);
    }

    #[test]
    fn test_dropped_job_is_removed() {
        let jobs = Arc::new(JobRegistry::new());
        let job = jobs.begin("S1");
        let job_id = job.id().to_string();

        drop(job);

        assert_eq!(jobs.tenant_for(&job_id), None);
        assert_eq!(jobs.pending(), 0);
    }

    #[test]
    fn test_job_removed_when_holder_panics() {
        let jobs = Arc::new(JobRegistry::new());
        let held = Arc::clone(&jobs);

        let result = std::thread::spawn(move || {
            let _job = held.begin("S1");
            panic!("handler failed");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(jobs.pending(), 0);
    }
}
