// ── Job manager ──
//
// Holds the enabled jobs and runs them against an operation. Each job
// call sits behind its own failure boundary: errors and panics are
// logged and never reach the caller or the other jobs.
//
// The active list is an `ArcSwap` snapshot. Executions load it once and
// keep reading a consistent list while `reconfigure` swaps in a new one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, info, warn};

use super::Job;
use crate::error::{CoreError, panic_message};
use crate::model::{JobContext, Operation};
use crate::registry::Services;

/// Worker threads of the job pool that may run asynchronous jobs at once.
const MAX_ASYNC_JOBS: usize = 16;

#[derive(Clone)]
struct ActiveJob {
    alias: String,
    job: Arc<dyn Job>,
}

/// Executes the enabled jobs, synchronously or on the job pool.
pub struct JobManager {
    services: Services,
    jobs: ArcSwap<Vec<ActiveJob>>,
    /// Serializes `reconfigure` and `dispose`.
    reconfigure_lock: Mutex<()>,
    pool: Mutex<Option<Runtime>>,
}

impl JobManager {
    /// Load every job enabled in `services.config.jobs`.
    ///
    /// A job that fails to load is logged and left out; only a failure to
    /// build the job pool is an error.
    pub fn initialize(services: &Services) -> Result<Self, CoreError> {
        let pool = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(MAX_ASYNC_JOBS)
            .thread_name("alarmflow-job")
            .build()
            .map_err(|e| CoreError::Internal(format!("could not build job pool: {e}")))?;

        let jobs: Vec<ActiveJob> = enabled_in_registration_order(services, &services.config.jobs)
            .iter()
            .filter_map(|alias| load_job(services, alias))
            .collect();
        info!(jobs = ?aliases(&jobs), "job manager initialized");

        Ok(Self {
            services: services.clone(),
            jobs: ArcSwap::from_pointee(jobs),
            reconfigure_lock: Mutex::new(()),
            pool: Mutex::new(Some(pool)),
        })
    }

    /// Aliases of the active jobs, in execution order.
    pub fn active_jobs(&self) -> Vec<String> {
        aliases(&self.jobs.load())
    }

    /// Run every active job against `operation`.
    ///
    /// Synchronous jobs run inline and work on a copy that replaces
    /// `operation` only if the job succeeds. Asynchronous jobs get their
    /// own copy and run on the job pool; this call does not wait for them.
    pub fn execute_jobs(&self, context: &JobContext, operation: &mut Operation) {
        let jobs = self.jobs.load_full();
        for active in jobs.iter() {
            if active.job.is_async() {
                self.spawn_async(active, context, operation);
                continue;
            }

            let mut working = operation.clone();
            if run_guarded(&active.alias, context, || {
                active.job.execute(context, &mut working)
            }) {
                *operation = working;
            }
        }
    }

    fn spawn_async(&self, active: &ActiveJob, context: &JobContext, operation: &Operation) {
        let pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(pool) = pool.as_ref() else {
            warn!(job = %active.alias, "job pool is shut down, skipping asynchronous job");
            return;
        };

        let active = active.clone();
        let context = context.clone();
        let mut operation = operation.clone();
        pool.spawn_blocking(move || {
            run_guarded(&active.alias, &context, || {
                active.job.execute(&context, &mut operation)
            });
        });
    }

    /// Switch to a new set of enabled jobs.
    ///
    /// Jobs that stay enabled keep running untouched. Dropped jobs are
    /// disposed; new ones are loaded with the same failure policy as at
    /// start-up.
    pub fn reconfigure(&self, enabled: &[String]) {
        let _guard = self
            .reconfigure_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.jobs.load_full();

        let next: Vec<ActiveJob> = enabled_in_registration_order(&self.services, enabled)
            .iter()
            .filter_map(|alias| {
                current
                    .iter()
                    .find(|active| active.alias == *alias)
                    .cloned()
                    .or_else(|| load_job(&self.services, alias))
            })
            .collect();

        for removed in current
            .iter()
            .filter(|active| !next.iter().any(|n| n.alias == active.alias))
        {
            dispose_job(removed);
        }

        info!(jobs = ?aliases(&next), "job set reconfigured");
        self.jobs.store(Arc::new(next));
    }

    /// Dispose every job and shut the job pool down without waiting.
    pub fn dispose(&self) {
        self.dispose_jobs();
        if let Some(pool) = self.take_pool() {
            pool.shutdown_background();
        }
    }

    /// Like [`dispose`](Self::dispose), but give running asynchronous jobs
    /// up to `grace` to finish.
    pub fn dispose_graceful(&self, grace: Duration) {
        if let Some(pool) = self.take_pool() {
            pool.shutdown_timeout(grace);
        }
        self.dispose_jobs();
    }

    fn dispose_jobs(&self) {
        let _guard = self
            .reconfigure_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let jobs = self.jobs.swap(Arc::new(Vec::new()));
        for active in jobs.iter() {
            dispose_job(active);
        }
    }

    fn take_pool(&self) -> Option<Runtime> {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        if let Some(pool) = self.take_pool() {
            pool.shutdown_background();
        }
    }
}

fn aliases(jobs: &[ActiveJob]) -> Vec<String> {
    jobs.iter().map(|active| active.alias.clone()).collect()
}

/// The registered job aliases that appear in `enabled`, in the order
/// they were registered. Enabled aliases nobody registered are logged.
fn enabled_in_registration_order(services: &Services, enabled: &[String]) -> Vec<String> {
    let registry = &services.registry.jobs;
    for alias in enabled.iter().filter(|alias| !registry.contains(alias)) {
        error!(job = %alias, "no job registered under this alias, ignoring");
    }
    registry
        .aliases()
        .filter(|alias| enabled.iter().any(|e| e == alias))
        .map(str::to_owned)
        .collect()
}

/// Construct and initialize one job. `None` if it cannot be used.
fn load_job(services: &Services, alias: &str) -> Option<ActiveJob> {
    let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut job = services.registry.jobs.create(alias, &services.config)?;
        let ready = job.initialize(services)?;
        Ok::<_, CoreError>((job, ready))
    }));

    match loaded {
        Ok(Ok((job, true))) => {
            debug!(job = alias, name = job.name(), asynchronous = job.is_async(), "job loaded");
            Some(ActiveJob {
                alias: alias.to_owned(),
                job: Arc::from(job),
            })
        }
        Ok(Ok((_, false))) => {
            warn!(job = alias, "job initialization returned false, job disabled");
            None
        }
        Ok(Err(e)) => {
            error!(job = alias, error = %e, "could not load job, job disabled");
            None
        }
        Err(payload) => {
            error!(
                job = alias,
                panic = %panic_message(payload.as_ref()),
                "job panicked while loading, job disabled"
            );
            None
        }
    }
}

fn dispose_job(active: &ActiveJob) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| active.job.dispose())) {
        warn!(
            job = %active.alias,
            panic = %panic_message(payload.as_ref()),
            "job panicked while disposing"
        );
    }
}

/// Run one job call behind a failure boundary. Returns `true` on success.
fn run_guarded(
    alias: &str,
    context: &JobContext,
    call: impl FnOnce() -> Result<(), CoreError>,
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(job = alias, phase = %context.phase, error = %e, "job failed");
            false
        }
        Err(payload) => {
            warn!(
                job = alias,
                phase = %context.phase,
                panic = %panic_message(payload.as_ref()),
                "job panicked"
            );
            false
        }
    }
}
