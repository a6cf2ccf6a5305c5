use crate::entities::TaskState;
use crate::error::{AppError, AppResult};
use crate::external::{DeliveryReceipt, LoginMailer};
use crate::tasks::email::{SEND_LOGIN_EMAIL, SendLoginEmail};
use crate::tasks::queue::{QueuedTask, TaskStore};
use crate::tasks::retry::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Delivered { message_id: String },
    Retrying { retry: u32, run_at: DateTime<Utc> },
    Exhausted { attempts: u32 },
    Rejected,
}

const DEFAULT_VISIBILITY_TIMEOUT_SECS: i64 = 300;

/// Consumer side of the queue. Attempts run one at a time; a failed attempt
/// is re-queued with a future `run_at` instead of sleeping in place.
///
/// Every claim is leased for the visibility timeout. A job whose lease runs
/// out before an outcome is recorded is claimed again and counts as a
/// failed attempt.
#[derive(Clone)]
pub struct TaskWorker {
    store: Arc<dyn TaskStore>,
    mailer: Arc<dyn LoginMailer>,
    policy: RetryPolicy,
    default_login_url: String,
    batch_size: u64,
    visibility_timeout: Duration,
}

impl TaskWorker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        mailer: Arc<dyn LoginMailer>,
        policy: RetryPolicy,
        default_login_url: String,
        batch_size: u64,
    ) -> Self {
        Self {
            store,
            mailer,
            policy,
            default_login_url,
            batch_size: batch_size.max(1),
            visibility_timeout: Duration::seconds(DEFAULT_VISIBILITY_TIMEOUT_SECS),
        }
    }

    pub fn with_visibility_timeout(mut self, secs: i64) -> Self {
        self.visibility_timeout = Duration::seconds(secs.max(1));
        self
    }

    /// Claims and runs every job due at `now`, up to the batch size.
    pub async fn run_due(&self, now: DateTime<Utc>) -> AppResult<Vec<(String, TaskOutcome)>> {
        let lease_until = now + self.visibility_timeout;
        let tasks = self
            .store
            .claim_due(now, lease_until, self.batch_size)
            .await?;
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = task.id.clone();
            match self.process(task, now).await {
                Ok(outcome) => outcomes.push((id, outcome)),
                Err(e) => log::error!("Task {id} could not be recorded: {e}"),
            }
        }
        Ok(outcomes)
    }

    async fn process(&self, task: QueuedTask, now: DateTime<Utc>) -> AppResult<TaskOutcome> {
        let attempt = task.attempt();
        let err = if task.recovered {
            log::warn!(
                "Task {} attempt {attempt} was abandoned before recording an outcome",
                task.id
            );
            format!("Attempt {attempt} did not finish before its lease expired")
        } else {
            log::info!(
                "Running task {} ({}), attempt {}/{}",
                task.id,
                task.task_name,
                attempt,
                self.policy.max_attempts()
            );
            match self.execute(&task).await {
                Ok(receipt) => {
                    log::info!(
                        "Task {} succeeded: login email sent to {}. MessageID: {}",
                        task.id,
                        receipt.to,
                        receipt.message_id
                    );
                    self.store
                        .finish(&task, TaskState::Succeeded, &receipt.message_id, now)
                        .await?;
                    return Ok(TaskOutcome::Delivered {
                        message_id: receipt.message_id,
                    });
                }
                Err(e) if !e.is_retryable() => {
                    log::error!("Task {} rejected without retry: {e}", task.id);
                    self.store
                        .finish(&task, TaskState::Rejected, &e.to_string(), now)
                        .await?;
                    return Ok(TaskOutcome::Rejected);
                }
                Err(e) => e.to_string(),
            }
        };

        match self.policy.next_delay(task.retries) {
            Some(delay) => {
                let run_at = now + delay;
                let retry = task.retries + 1;
                log::warn!(
                    "Task {} attempt {attempt} failed: {err}. Retry {retry} in {}s",
                    task.id,
                    delay.num_seconds()
                );
                self.store.schedule_retry(&task, run_at, &err).await?;
                Ok(TaskOutcome::Retrying { retry, run_at })
            }
            None => {
                let message = format!(
                    "Failed to send login email to {} after {attempt} attempts: {err}",
                    recipient(&task)
                );
                log::error!("Task {} exhausted: {message}", task.id);
                self.store
                    .finish(&task, TaskState::Exhausted, &message, now)
                    .await?;
                Ok(TaskOutcome::Exhausted { attempts: attempt })
            }
        }
    }

    async fn execute(&self, task: &QueuedTask) -> AppResult<DeliveryReceipt> {
        match task.task_name.as_str() {
            SEND_LOGIN_EMAIL => {
                let payload: SendLoginEmail = serde_json::from_value(task.payload.clone())?;
                let email = payload.into_login_email(&self.default_login_url);
                self.mailer.send_login_email(&email).await
            }
            other => Err(AppError::ValidationError(format!("Unknown task: {other}"))),
        }
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.store.purge_expired_results(now).await
    }
}

fn recipient(task: &QueuedTask) -> &str {
    task.payload
        .get("to_email")
        .and_then(|v| v.as_str())
        .unwrap_or("<unknown>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::queue::memory::MemoryTaskStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyMailer {
        failures: usize,
        calls: AtomicUsize,
        links: Mutex<Vec<String>>,
    }

    impl FlakyMailer {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
                links: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoginMailer for FlakyMailer {
        async fn send_login_email(
            &self,
            email: &crate::external::LoginEmail,
        ) -> AppResult<DeliveryReceipt> {
            email.validate()?;
            self.links.lock().unwrap().push(email.login_link.clone());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(AppError::EmailDelivery {
                    code: None,
                    message: "connection timed out".into(),
                });
            }
            Ok(DeliveryReceipt {
                message_id: format!("msg-{n}"),
                to: email.to_email.clone(),
                submitted_at: None,
            })
        }
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({
            "to_email": "guru@sekolah.sch.id",
            "name": "Budi",
            "username": "budi12",
            "password": "Abcdef1234",
            "login_link": "https://absen.test/api/v1/auth/login"
        })
    }

    fn worker(store: Arc<MemoryTaskStore>, mailer: Arc<FlakyMailer>) -> TaskWorker {
        TaskWorker::new(
            store,
            mailer,
            RetryPolicy::default(),
            "https://default.test/login".into(),
            10,
        )
    }

    #[tokio::test]
    async fn test_succeeds_after_two_retries() {
        let store = Arc::new(MemoryTaskStore::default());
        let mailer = FlakyMailer::new(2);
        let worker = worker(store.clone(), mailer.clone());
        let t0 = Utc::now();
        let id = store.push(SEND_LOGIN_EMAIL, payload(), t0).await.unwrap();

        let first = worker.run_due(t0).await.unwrap();
        assert_eq!(
            first,
            vec![(
                id.clone(),
                TaskOutcome::Retrying {
                    retry: 1,
                    run_at: t0 + Duration::seconds(60)
                }
            )]
        );

        // not due yet
        assert!(worker.run_due(t0 + Duration::seconds(59)).await.unwrap().is_empty());

        let t1 = t0 + Duration::seconds(60);
        let second = worker.run_due(t1).await.unwrap();
        assert_eq!(
            second[0].1,
            TaskOutcome::Retrying {
                retry: 2,
                run_at: t1 + Duration::seconds(120)
            }
        );
        assert_eq!(store.job(&id).unwrap().state, TaskState::Retry);

        let t2 = t1 + Duration::seconds(120);
        let third = worker.run_due(t2).await.unwrap();
        assert_eq!(
            third[0].1,
            TaskOutcome::Delivered {
                message_id: "msg-2".into()
            }
        );

        assert_eq!(mailer.calls(), 3);
        assert!(store.job(&id).is_none());
        let result = store.result(&id).unwrap();
        assert_eq!(result.state, TaskState::Succeeded);
        assert_eq!(result.result, "msg-2");
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_always_failing_is_exhausted_after_four_attempts() {
        let store = Arc::new(MemoryTaskStore::default());
        let mailer = FlakyMailer::new(usize::MAX);
        let worker = worker(store.clone(), mailer.clone());
        let mut now = Utc::now();
        let id = store.push(SEND_LOGIN_EMAIL, payload(), now).await.unwrap();

        let mut last = None;
        for _ in 0..4 {
            let outcomes = worker.run_due(now).await.unwrap();
            assert_eq!(outcomes.len(), 1);
            last = Some(outcomes[0].1.clone());
            now += Duration::seconds(180);
        }

        assert_eq!(last, Some(TaskOutcome::Exhausted { attempts: 4 }));
        assert_eq!(mailer.calls(), 4);
        assert!(worker.run_due(now).await.unwrap().is_empty());

        let result = store.result(&id).unwrap();
        assert_eq!(result.state, TaskState::Exhausted);
        assert!(result.result.starts_with(
            "Failed to send login email to guru@sekolah.sch.id after 4 attempts:"
        ));
        assert!(result.result.contains("connection timed out"));
    }

    /// Delegates to the in-memory store but loses the first retry write.
    struct LossyStore {
        inner: Arc<MemoryTaskStore>,
        retry_failures: AtomicUsize,
    }

    #[async_trait]
    impl TaskStore for LossyStore {
        async fn push(
            &self,
            task_name: &str,
            payload: serde_json::Value,
            run_at: DateTime<Utc>,
        ) -> AppResult<String> {
            self.inner.push(task_name, payload, run_at).await
        }

        async fn claim_due(
            &self,
            now: DateTime<Utc>,
            lease_until: DateTime<Utc>,
            limit: u64,
        ) -> AppResult<Vec<QueuedTask>> {
            self.inner.claim_due(now, lease_until, limit).await
        }

        async fn schedule_retry(
            &self,
            task: &QueuedTask,
            run_at: DateTime<Utc>,
            error: &str,
        ) -> AppResult<()> {
            let left = self.retry_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.retry_failures.store(left - 1, Ordering::SeqCst);
                return Err(AppError::DatabaseError(sea_orm::DbErr::Custom(
                    "broker unavailable".into(),
                )));
            }
            self.inner.schedule_retry(task, run_at, error).await
        }

        async fn finish(
            &self,
            task: &QueuedTask,
            state: TaskState,
            result: &str,
            now: DateTime<Utc>,
        ) -> AppResult<()> {
            self.inner.finish(task, state, result, now).await
        }

        async fn status(
            &self,
            task_id: &str,
            now: DateTime<Utc>,
        ) -> AppResult<Option<crate::tasks::queue::TaskStatus>> {
            self.inner.status(task_id, now).await
        }

        async fn purge_expired_results(&self, now: DateTime<Utc>) -> AppResult<u64> {
            self.inner.purge_expired_results(now).await
        }
    }

    #[tokio::test]
    async fn test_job_is_retried_after_lost_retry_write() {
        let inner = Arc::new(MemoryTaskStore::default());
        let store = Arc::new(LossyStore {
            inner: inner.clone(),
            retry_failures: AtomicUsize::new(1),
        });
        let mailer = FlakyMailer::new(usize::MAX);
        let worker = TaskWorker::new(
            store.clone(),
            mailer.clone(),
            RetryPolicy::default(),
            "https://default.test/login".into(),
            10,
        )
        .with_visibility_timeout(300);
        let t0 = Utc::now();
        let id = store.push(SEND_LOGIN_EMAIL, payload(), t0).await.unwrap();

        // the failed attempt cannot be recorded
        assert!(worker.run_due(t0).await.unwrap().is_empty());
        assert_eq!(inner.job(&id).unwrap().state, TaskState::Started);
        assert!(worker.run_due(t0 + Duration::seconds(299)).await.unwrap().is_empty());

        // lease runs out: the lost attempt counts as the first failure
        let t1 = t0 + Duration::seconds(300);
        let outcomes = worker.run_due(t1).await.unwrap();
        assert_eq!(
            outcomes,
            vec![(
                id.clone(),
                TaskOutcome::Retrying {
                    retry: 1,
                    run_at: t1 + Duration::seconds(60)
                }
            )]
        );
        assert_eq!(mailer.calls(), 1);
        assert!(
            inner
                .job(&id)
                .unwrap()
                .last_error
                .unwrap()
                .contains("lease expired")
        );

        let mut now = t1 + Duration::seconds(60);
        let mut last = None;
        for _ in 0..3 {
            let outcomes = worker.run_due(now).await.unwrap();
            assert_eq!(outcomes.len(), 1);
            last = Some(outcomes[0].1.clone());
            now += Duration::seconds(180);
        }

        assert_eq!(last, Some(TaskOutcome::Exhausted { attempts: 4 }));
        assert_eq!(mailer.calls(), 4);
        assert!(inner.job(&id).is_none());
        assert_eq!(inner.result(&id).unwrap().state, TaskState::Exhausted);
    }

    #[tokio::test]
    async fn test_validation_failure_is_rejected_without_retry() {
        let store = Arc::new(MemoryTaskStore::default());
        let mailer = FlakyMailer::new(0);
        let worker = worker(store.clone(), mailer.clone());
        let now = Utc::now();
        let mut bad = payload();
        bad["name"] = serde_json::json!("   ");
        let id = store.push(SEND_LOGIN_EMAIL, bad, now).await.unwrap();

        let outcomes = worker.run_due(now).await.unwrap();
        assert_eq!(outcomes[0].1, TaskOutcome::Rejected);
        assert_eq!(mailer.calls(), 0);
        assert_eq!(store.result(&id).unwrap().state, TaskState::Rejected);
        assert!(store.job(&id).is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_and_unknown_task_are_rejected() {
        let store = Arc::new(MemoryTaskStore::default());
        let mailer = FlakyMailer::new(0);
        let worker = worker(store.clone(), mailer.clone());
        let now = Utc::now();
        store
            .push(SEND_LOGIN_EMAIL, serde_json::json!({"to_email": 5}), now)
            .await
            .unwrap();
        store
            .push("resize_avatar", serde_json::json!({}), now)
            .await
            .unwrap();

        let outcomes = worker.run_due(now).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| *o == TaskOutcome::Rejected));
        assert_eq!(mailer.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_login_link_uses_configured_default() {
        let store = Arc::new(MemoryTaskStore::default());
        let mailer = FlakyMailer::new(0);
        let worker = worker(store.clone(), mailer.clone());
        let now = Utc::now();
        let mut p = payload();
        p.as_object_mut().unwrap().remove("login_link");
        store.push(SEND_LOGIN_EMAIL, p, now).await.unwrap();

        worker.run_due(now).await.unwrap();
        assert_eq!(
            mailer.links.lock().unwrap().as_slice(),
            ["https://default.test/login".to_string()]
        );
    }

    #[tokio::test]
    async fn test_purge_drops_expired_results() {
        let store = Arc::new(MemoryTaskStore::default());
        let worker = worker(store.clone(), FlakyMailer::new(0));
        let now = Utc::now();
        let id = store.push(SEND_LOGIN_EMAIL, payload(), now).await.unwrap();
        worker.run_due(now).await.unwrap();

        assert_eq!(worker.purge_expired(now).await.unwrap(), 0);
        assert_eq!(
            worker
                .purge_expired(now + Duration::seconds(3600))
                .await
                .unwrap(),
            1
        );
        assert!(store.result(&id).is_none());
    }
}
