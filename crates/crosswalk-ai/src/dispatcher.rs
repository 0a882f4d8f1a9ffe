//! Bounded-concurrency fan-out of verification tasks.
//!
//! Every task yields exactly one mapping. A task that panics, or that never
//! reports back, is replaced by a fallback for its pair; the other tasks are
//! unaffected. The call returns only after all tasks have settled.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crosswalk_core::Mapping;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::verifier::{PairwiseVerifier, RunContext, VerificationTask};

/// Completed-task interval between progress log lines.
const PROGRESS_EVERY: usize = 50;

pub struct Dispatcher {
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Verify all tasks, at most `max_workers` at a time.
    ///
    /// Returns one mapping per task, in no particular order.
    pub async fn run(
        &self,
        verifier: Arc<PairwiseVerifier>,
        run: Arc<RunContext>,
        tasks: Vec<VerificationTask>,
    ) -> Vec<Mapping> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }
        info!(tasks = total, workers = self.max_workers, "dispatching verifications");

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut set = JoinSet::new();
        for (index, task) in tasks.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let verifier = Arc::clone(&verifier);
            let run = Arc::clone(&run);
            set.spawn(async move {
                // The semaphore is never closed, so a permit always arrives.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = AssertUnwindSafe(verifier.verify(&task, &run))
                    .catch_unwind()
                    .await;
                let mapping = outcome.unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    error!(
                        source = task.source.id(),
                        target = task.target.id(),
                        panic = %message,
                        "verification task panicked"
                    );
                    task.fallback(&run, format!("LLM verification failed: task panicked: {message}"))
                });
                (index, mapping)
            });
        }

        let mut slots: Vec<Option<Mapping>> = vec![None; total];
        let mut completed = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, mapping)) => {
                    slots[index] = Some(mapping);
                    completed += 1;
                    if completed % PROGRESS_EVERY == 0 || completed == total {
                        info!(completed, total, "verification progress");
                    }
                }
                Err(e) => error!(error = %e, "verification task did not complete"),
            }
        }

        slots
            .into_iter()
            .zip(&tasks)
            .map(|(slot, task)| {
                slot.unwrap_or_else(|| {
                    task.fallback(&run, "LLM verification failed: task did not complete")
                })
            })
            .collect()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
