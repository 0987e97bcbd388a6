//! Concurrent execution engine - applies each phase through a bounded worker pool
//!
//! Operations inside a phase are independent, so they run on a rayon pool with
//! at most `jobs` calls in flight. Phases still run in order: creates, then
//! updates, then deletes. On the first failure the executor stops admitting
//! work, lets in-flight calls finish, and deletes the roles it created earlier
//! in the run.

use crate::client::RoleClient;
use crate::context::{CancelFlag, ProgressSink};
use crate::error::{Error, Result};
use crate::executor::{Job, phases};
use crate::types::{ExecutionResult, Operation, SyncPlan};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Executor that runs each phase on a fixed-size worker pool
#[derive(Debug, Clone)]
pub struct ConcurrentExecutor {
    jobs: usize,
    cancel: Option<CancelFlag>,
}

impl ConcurrentExecutor {
    /// Create an executor with at most `jobs` concurrent remote calls.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParallelism` when `jobs` is zero.
    pub fn new(jobs: usize) -> Result<Self> {
        if jobs == 0 {
            return Err(Error::InvalidParallelism(jobs));
        }
        Ok(Self { jobs, cancel: None })
    }

    /// Stop admitting work once `cancel` is tripped
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Execute a plan.
    ///
    /// Counts reflect operations that committed; a rollback after failure
    /// changes remote state but not the counts.
    pub fn execute<C: RoleClient + ?Sized>(
        &self,
        plan: &SyncPlan,
        client: &C,
        progress: &dyn ProgressSink,
    ) -> ExecutionResult {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("rolesync-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                return ExecutionResult {
                    error: Some(Error::Pool(e.to_string())),
                    ..Default::default()
                };
            }
        };

        let run = RunState::default();

        for (operation, jobs) in phases(plan) {
            if jobs.is_empty() {
                continue;
            }
            progress.on_phase_start(operation, jobs.len());
            log::debug!(
                "{} phase: {} roles on {} workers",
                operation,
                jobs.len(),
                self.jobs
            );

            pool.install(|| {
                jobs.par_iter()
                    .for_each(|job| self.dispatch(job, client, progress, &run));
            });

            progress.on_phase_complete(operation);
            if run.is_stopped() {
                break;
            }
        }

        let error = run.take_error();
        if error.is_some() {
            rollback(client, &run.created_roles(), progress);
        }

        let result = ExecutionResult {
            created: run.created.load(Ordering::SeqCst),
            updated: run.updated.load(Ordering::SeqCst),
            deleted: run.deleted.load(Ordering::SeqCst),
            error,
            ..Default::default()
        };
        log::info!(
            "applied plan: {} created, {} updated, {} deleted",
            result.created,
            result.updated,
            result.deleted
        );
        result
    }

    /// Run one job unless the run has been stopped or cancelled
    fn dispatch<C: RoleClient + ?Sized>(
        &self,
        job: &Job<'_>,
        client: &C,
        progress: &dyn ProgressSink,
        run: &RunState,
    ) {
        let operation = job.operation();
        if run.is_stopped() {
            return;
        }
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            run.fail(Error::Cancelled(operation));
            return;
        }

        log::debug!("{} role {}", operation, job.role_name());
        progress.on_operation_start(operation, job.role_name());
        let outcome = job.run(client);
        progress.on_operation_complete(operation, job.role_name(), outcome.is_ok());

        match outcome {
            Ok(()) => run.commit(operation, job.role_name()),
            Err(e) => run.fail(e),
        }
    }
}

/// State shared by the workers of one run
#[derive(Default)]
struct RunState {
    created: AtomicUsize,
    updated: AtomicUsize,
    deleted: AtomicUsize,
    stopped: AtomicBool,
    first_error: Mutex<Option<Error>>,
    /// Compensating actions: roles to delete again if the run fails
    created_roles: Mutex<Vec<String>>,
}

impl RunState {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn commit(&self, operation: Operation, role: &str) {
        match operation {
            Operation::Create => {
                self.created.fetch_add(1, Ordering::SeqCst);
                lock(&self.created_roles).push(role.to_string());
            }
            Operation::Update => {
                self.updated.fetch_add(1, Ordering::SeqCst);
            }
            Operation::Delete => {
                self.deleted.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Record a failure; only the first one is kept
    fn fail(&self, error: Error) {
        let mut first = lock(&self.first_error);
        if first.is_none() {
            log::debug!("stopping after failure: {error}");
            *first = Some(error);
            self.stopped.store(true, Ordering::SeqCst);
        } else {
            log::debug!("additional failure after stop: {error}");
        }
    }

    fn take_error(&self) -> Option<Error> {
        lock(&self.first_error).take()
    }

    fn created_roles(&self) -> Vec<String> {
        lock(&self.created_roles).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Best-effort delete of roles created by a failed run, newest first.
///
/// Failures are logged and reported to the progress sink, never returned.
fn rollback<C: RoleClient + ?Sized>(client: &C, created: &[String], progress: &dyn ProgressSink) {
    if created.is_empty() {
        return;
    }
    progress.message(&format!("rolling back {} created roles", created.len()));

    for name in created.iter().rev() {
        match client.delete_role(name) {
            Ok(()) => {
                log::info!("rolled back role {name}");
                progress.message(&format!("rolled back role {name}"));
            }
            Err(e) => {
                log::warn!("rollback of role {name} failed: {e}");
                progress.message(&format!("rollback of role {name} failed: {e}"));
            }
        }
    }
}
