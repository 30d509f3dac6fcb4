//! Batch-by-batch execution of per-project work
//!
//! Batches run strictly one after another. Units inside a batch run as
//! tokio tasks, bounded by the policy's concurrency limit. A failing unit
//! never cancels its in-flight siblings: the batch settles, queued units
//! that had not started yet are dropped, and no later batch starts.

use crate::error::{WavestrapError, WavestrapResult};
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// How many units of one batch may run at the same time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// One unit at a time, in batch order
    Sequential,
    /// Up to `limit` units at a time; unbounded when `None`
    Parallel { limit: Option<usize> },
}

impl SchedulePolicy {
    fn limit(&self) -> Option<usize> {
        match self {
            Self::Sequential => Some(1),
            Self::Parallel { limit } => limit.map(|l| l.max(1)),
        }
    }
}

/// Runs a unit of work over every item of every batch
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    policy: SchedulePolicy,
}

impl BatchScheduler {
    pub fn new(policy: SchedulePolicy) -> Self {
        Self { policy }
    }

    /// Run `work` over all batches, returning every unit's output in batch order
    ///
    /// Stops after the first batch with a failure. A single failure is
    /// returned as is, several as [`WavestrapError::BatchFailed`]. A panicking
    /// unit counts as a failure of the item it was given.
    pub async fn run<T, O, F, Fut>(&self, batches: Vec<Vec<T>>, work: F) -> WavestrapResult<Vec<O>>
    where
        T: fmt::Display + Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WavestrapResult<O>> + Send + 'static,
    {
        let work = Arc::new(work);
        let total = batches.len();
        let mut outputs = Vec::new();

        for (index, batch) in batches.into_iter().enumerate() {
            info!("Batch {}/{}: {} units", index + 1, total, batch.len());

            let mut failures = self.run_batch(batch, &work, &mut outputs).await;
            match failures.len() {
                0 => continue,
                1 => return Err(failures.remove(0)),
                _ => return Err(WavestrapError::BatchFailed { errors: failures }),
            }
        }

        Ok(outputs)
    }

    async fn run_batch<T, O, F, Fut>(
        &self,
        batch: Vec<T>,
        work: &Arc<F>,
        outputs: &mut Vec<O>,
    ) -> Vec<WavestrapError>
    where
        T: fmt::Display + Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WavestrapResult<O>> + Send + 'static,
    {
        let slots = self.policy.limit().map(|l| Arc::new(Semaphore::new(l)));
        let failed = Arc::new(AtomicBool::new(false));
        let mut failures = Vec::new();
        let mut handles = Vec::with_capacity(batch.len());
        let size = batch.len();

        for item in batch {
            // Wait for a free slot before spawning, so queued units start
            // in order as running ones finish.
            let permit = match &slots {
                Some(slots) => match Arc::clone(slots).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        failures.push(WavestrapError::Internal(format!(
                            "scheduler slots closed: {}",
                            e
                        )));
                        break;
                    }
                },
                None => None,
            };

            if failed.load(Ordering::SeqCst) {
                break;
            }

            let work = Arc::clone(work);
            let failed = Arc::clone(&failed);
            let unit = item.to_string();
            handles.push(tokio::spawn(async move {
                let result = match AssertUnwindSafe(async move { work(item).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(payload) => {
                        warn!("Unit {} panicked", unit);
                        Err(WavestrapError::UnitPanicked {
                            unit,
                            message: panic_message(payload.as_ref()),
                        })
                    }
                };
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                // Release the slot only after the failure flag is visible
                drop(permit);
                result
            }));
        }

        if handles.len() < size {
            debug!("Dropped {} queued units after a failure", size - handles.len());
        }

        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(output)) => outputs.push(output),
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(WavestrapError::Internal(format!("unit task failed: {}", e))),
            }
        }

        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
