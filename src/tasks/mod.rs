//! Background work for the application.
//!
//! Jobs are produced by `TaskClient` (request handlers) and consumed by
//! `TaskWorker`. Call `spawn_all` once during startup to launch the loops.

pub mod email;
pub mod queue;
pub mod retry;
pub mod worker;

pub use email::{SEND_LOGIN_EMAIL, SendLoginEmail};
pub use queue::{DbTaskStore, QueuedTask, TaskClient, TaskStatus, TaskStore};
pub use retry::RetryPolicy;
pub use worker::{TaskOutcome, TaskWorker};

use chrono::Utc;
use std::time::Duration;

/// Spawn all background loops.
///
/// This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(worker: TaskWorker, poll_interval: Duration) {
    // due jobs, every poll interval
    {
        let worker = worker.clone();
        tokio::spawn(async move {
            loop {
                match worker.run_due(Utc::now()).await {
                    Ok(outcomes) if !outcomes.is_empty() => {
                        log::debug!("Processed {} task(s)", outcomes.len())
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to claim due tasks: {e:?}"),
                }
                tokio::time::sleep(poll_interval).await;
            }
        });
    }

    // expired results, every minute
    {
        tokio::spawn(async move {
            loop {
                match worker.purge_expired(Utc::now()).await {
                    Ok(n) if n > 0 => log::info!("Expired task results purged: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to purge task results: {e:?}"),
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }
}
