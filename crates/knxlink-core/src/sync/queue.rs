// ── Rate-limited transmit queue ──
//
// Plain FIFO of deferred bus operations. The engine pops one job per
// timer tick; a job runs once and is dropped whatever its outcome.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::CoreError;

type Action = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), CoreError>> + Send>;

/// A deferred bus operation plus a description for the logs.
pub struct TxJob {
    description: String,
    action: Action,
}

impl TxJob {
    pub fn new<F, Fut>(description: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), CoreError>> + Send + 'static,
    {
        Self {
            description: description.into(),
            action: Box::new(move || Box::pin(action())),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the action, wrapping a failure as [`CoreError::TxFailure`].
    pub async fn execute(self) -> Result<(), CoreError> {
        let Self {
            description,
            action,
        } = self;
        action().await.map_err(|e| CoreError::TxFailure {
            description,
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for TxJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxJob")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Unbounded FIFO of [`TxJob`]s.
#[derive(Debug, Default)]
pub struct TxQueue {
    jobs: VecDeque<TxJob>,
}

impl TxQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job, returning the new depth.
    pub fn push(&mut self, job: TxJob) -> usize {
        debug!(job = job.description(), "job queued");
        self.jobs.push_back(job);
        self.jobs.len()
    }

    /// Execute the oldest job. Returns `false` when the queue was empty.
    ///
    /// Failures are logged and swallowed; the job is never retried.
    pub async fn run_next(&mut self) -> bool {
        let Some(job) = self.jobs.pop_front() else {
            return false;
        };
        let description = job.description().to_owned();
        match job.execute().await {
            Ok(()) => debug!(job = %description, "job done"),
            Err(e) => warn!(error = %e, "job failed"),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Descriptions of the waiting jobs, oldest first.
    pub fn descriptions(&self) -> Vec<String> {
        self.jobs.iter().map(|j| j.description.clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str, fail: bool) -> TxJob {
        let log = Arc::clone(log);
        TxJob::new(name, move || async move {
            log.lock().unwrap().push(name);
            if fail {
                Err(CoreError::NotConnected)
            } else {
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn runs_in_fifo_order_one_at_a_time() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TxQueue::new();
        queue.push(recording(&log, "a", false));
        queue.push(recording(&log, "b", false));
        assert_eq!(queue.descriptions(), vec!["a", "b"]);

        assert!(queue.run_next().await);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert!(queue.run_next().await);
        assert!(!queue.run_next().await);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failing_job_does_not_stop_the_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TxQueue::new();
        queue.push(recording(&log, "boom", true));
        queue.push(recording(&log, "after", false));

        assert!(queue.run_next().await);
        assert!(queue.run_next().await);
        assert_eq!(*log.lock().unwrap(), vec!["boom", "after"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn failure_is_wrapped_with_description() {
        let job = TxJob::new("write 1/0/1", || async { Err(CoreError::NotConnected) });
        match job.execute().await.unwrap_err() {
            CoreError::TxFailure { description, .. } => assert_eq!(description, "write 1/0/1"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
