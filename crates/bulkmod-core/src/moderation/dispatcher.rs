use std::{future::Future, time::Duration};

use futures::future::join_all;
use tokio::{sync::Semaphore, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{Member, UserId},
    moderation::types::OperationResult,
    Result,
};

/// Runs one action per target with at most `concurrency` in flight.
///
/// Every target is scheduled exactly once and always settles: a failure is
/// attributed to its own target and never stops siblings. The pacing delay is
/// charged to the slot after each action, so throughput is roughly
/// `concurrency / (delay + latency)`.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    concurrency: usize,
    delay: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(concurrency: usize, delay: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Targets that have not acquired a slot when `token` fires settle as failures.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn run<F, Fut>(&self, targets: &[Member], action: F) -> OperationResult
    where
        F: Fn(Member) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let permits = Semaphore::new(self.concurrency);
        let permits = &permits;
        let action = &action;

        let tasks = targets.iter().map(|target| async move {
            let user_id = target.user_id;
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return (user_id, Err("cancelled".to_string()));
                }
                p = permits.acquire() => match p {
                    Ok(p) => p,
                    Err(e) => return (user_id, Err(e.to_string())),
                },
            };

            let outcome = action(target.clone()).await.map_err(|e| e.to_string());
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            drop(permit);
            (user_id, outcome)
        });

        let settled: Vec<(UserId, std::result::Result<(), String>)> = join_all(tasks).await;

        let mut result = OperationResult {
            total: targets.len(),
            ..OperationResult::default()
        };
        for (user_id, outcome) in settled {
            match outcome {
                Ok(()) => result.record_success(),
                Err(reason) => {
                    tracing::debug!(user = %user_id, %reason, "target action failed");
                    result.record_failure(user_id, reason);
                }
            }
        }
        result
    }
}
