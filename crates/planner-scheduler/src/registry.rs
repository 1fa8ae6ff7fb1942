use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::{JobError, Result};
use crate::types::JobKey;

/// Outcome of [`JobRegistry::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// A timer was registered and will fire later.
    Pending,
    /// The fire time had already passed; the action ran before `schedule` returned.
    RanImmediately,
}

struct ActiveJob {
    /// Distinguishes this timer from any later one registered under the same key.
    generation: u64,
    fire_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

struct Inner {
    jobs: Mutex<HashMap<JobKey, ActiveJob>>,
    next_generation: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, ActiveJob>> {
        // Every critical section leaves the map consistent, so a poisoned lock
        // is still safe to use.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the entry for `key` if it still belongs to `generation`.
    ///
    /// Returns false when the job was cancelled or replaced while its timer
    /// was sleeping; the caller must then drop the action.
    fn claim(&self, key: &JobKey, generation: u64) -> bool {
        let mut jobs = self.lock();
        match jobs.get(key) {
            Some(job) if job.generation == generation => {
                jobs.remove(key);
                true
            }
            _ => false,
        }
    }
}

/// Keyed registry of one-shot timers.
///
/// Cheap to clone; clones share the same map. Timers run on the Tokio
/// runtime, so `schedule` must be called from within one.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Register `action` to run at `fire_at` under `key`.
    ///
    /// Any job already registered under `key` is cancelled first, under the
    /// same lock that registers the new one. If `fire_at` is not strictly in
    /// the future the action runs right away instead of being deferred.
    /// Action errors and panics are logged and swallowed.
    pub fn schedule<F>(&self, key: JobKey, fire_at: DateTime<Utc>, action: F) -> Scheduled
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let now = Utc::now();
        let mut jobs = self.inner.lock();

        if let Some(previous) = jobs.remove(&key) {
            previous.handle.abort();
            debug!(job = %key, previous_fire_at = %previous.fire_at, "replaced pending job");
        }

        let delay = match (fire_at - now).to_std() {
            Ok(delay) if fire_at > now => delay,
            _ => {
                drop(jobs);
                info!(job = %key, %fire_at, "fire time already passed, running job now");
                run_action(&key, action);
                return Scheduled::RanImmediately;
            }
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        // Fix the deadline before spawning: the task may not be polled until later.
        let deadline = Instant::now() + delay;
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();

        // The task cannot claim its entry before we insert it below, because
        // claiming needs the lock we are holding.
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if inner.claim(&task_key, generation) {
                debug!(job = %task_key, "job fired");
                run_action(&task_key, action);
            }
        });

        debug!(job = %key, %fire_at, delay_secs = delay.as_secs(), "job scheduled");
        jobs.insert(
            key,
            ActiveJob {
                generation,
                fire_at,
                handle,
            },
        );
        Scheduled::Pending
    }

    /// Stop and forget the job under `key`. Returns whether one was pending.
    ///
    /// Cancelling a key that never existed, or whose job already fired, is a
    /// no-op.
    pub fn cancel(&self, key: &JobKey) -> bool {
        let removed = self.inner.lock().remove(key);
        match removed {
            Some(job) => {
                job.handle.abort();
                debug!(job = %key, "job cancelled");
                true
            }
            None => false,
        }
    }

    pub fn exists(&self, key: &JobKey) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// When the pending job under `key` will fire.
    pub fn fire_time(&self, key: &JobKey) -> Option<DateTime<Utc>> {
        self.inner.lock().get(key).map(|job| job.fire_at)
    }

    /// Keys of all pending jobs, sorted.
    pub fn keys(&self) -> Vec<JobKey> {
        let mut keys: Vec<JobKey> = self.inner.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every pending timer. Used on process shutdown.
    pub fn clear(&self) {
        let drained: Vec<(JobKey, ActiveJob)> = self.inner.lock().drain().collect();
        if !drained.is_empty() {
            info!(count = drained.len(), "cancelling all pending jobs");
        }
        for (_, job) in drained {
            job.handle.abort();
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn run_action<F>(key: &JobKey, action: F)
where
    F: FnOnce() -> Result<()>,
{
    let outcome = catch_unwind(AssertUnwindSafe(action)).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(JobError::Panicked(msg))
    });
    if let Err(e) = outcome {
        error!(job = %key, error = %e, "job action failed");
    }
}
