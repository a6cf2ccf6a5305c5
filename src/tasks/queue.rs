use crate::database::DbPool;
use crate::entities::{TaskState, task_job_entity as jobs, task_result_entity as results};
use crate::error::AppResult;
use crate::tasks::email::{SEND_LOGIN_EMAIL, SendLoginEmail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// A job claimed by a worker for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTask {
    pub id: String,
    pub task_name: String,
    pub payload: serde_json::Value,
    /// Retries already scheduled before this attempt.
    pub retries: u32,
    /// Taken back after an earlier claim's lease ran out without an outcome.
    pub recovered: bool,
}

impl QueuedTask {
    pub fn attempt(&self) -> u32 {
        self.retries + 1
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct TaskStatus {
    pub task_id: String,
    pub task_name: String,
    pub state: TaskState,
    pub attempts: i32,
    /// Terminal result payload: the message id or the failure message.
    pub result: Option<String>,
    pub last_error: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Broker plus result backend.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn push(
        &self,
        task_name: &str,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> AppResult<String>;

    /// Atomically moves up to `limit` due jobs to `started`, leased until
    /// `lease_until`. A `started` job whose lease has run out is due again.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<QueuedTask>>;

    async fn schedule_retry(
        &self,
        task: &QueuedTask,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()>;

    /// Records a terminal outcome and removes the job from the broker.
    async fn finish(
        &self,
        task: &QueuedTask,
        state: TaskState,
        result: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn status(&self, task_id: &str, now: DateTime<Utc>) -> AppResult<Option<TaskStatus>>;

    async fn purge_expired_results(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// `task_jobs` on the broker connection, `task_results` on the result backend.
#[derive(Clone)]
pub struct DbTaskStore {
    broker: DbPool,
    results: DbPool,
    result_ttl: Duration,
}

impl DbTaskStore {
    pub fn new(broker: DbPool, results: DbPool, result_ttl_secs: i64) -> Self {
        Self {
            broker,
            results,
            result_ttl: Duration::seconds(result_ttl_secs),
        }
    }

    fn claimable() -> [TaskState; 3] {
        [TaskState::Pending, TaskState::Retry, TaskState::Started]
    }
}

#[async_trait]
impl TaskStore for DbTaskStore {
    async fn push(
        &self,
        task_name: &str,
        payload: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let job = jobs::ActiveModel {
            id: Set(id.clone()),
            task_name: Set(task_name.to_string()),
            payload: Set(payload),
            state: Set(TaskState::Pending),
            retries: Set(0),
            run_at: Set(run_at),
            last_error: Set(None),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
        };
        jobs::Entity::insert(job)
            .exec_without_returning(&*self.broker)
            .await?;
        Ok(id)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<QueuedTask>> {
        // for a started job `run_at` is the lease expiry
        let candidates = jobs::Entity::find()
            .filter(jobs::Column::State.is_in(Self::claimable()))
            .filter(jobs::Column::RunAt.lte(now))
            .order_by_asc(jobs::Column::RunAt)
            .limit(limit)
            .all(&*self.broker)
            .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for job in candidates {
            let res = jobs::Entity::update_many()
                .set(jobs::ActiveModel {
                    state: Set(TaskState::Started),
                    run_at: Set(lease_until),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                })
                .filter(jobs::Column::Id.eq(job.id.clone()))
                .filter(jobs::Column::State.is_in(Self::claimable()))
                .filter(jobs::Column::RunAt.lte(now))
                .exec(&*self.broker)
                .await?;

            // another worker got there first
            if res.rows_affected != 1 {
                continue;
            }
            claimed.push(QueuedTask {
                id: job.id,
                task_name: job.task_name,
                payload: job.payload,
                retries: u32::try_from(job.retries).unwrap_or(0),
                recovered: job.state == TaskState::Started,
            });
        }
        Ok(claimed)
    }

    async fn schedule_retry(
        &self,
        task: &QueuedTask,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        jobs::Entity::update_many()
            .set(jobs::ActiveModel {
                state: Set(TaskState::Retry),
                retries: Set(i32::try_from(task.retries + 1).unwrap_or(i32::MAX)),
                run_at: Set(run_at),
                last_error: Set(Some(error.to_string())),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(jobs::Column::Id.eq(task.id.clone()))
            .exec(&*self.broker)
            .await?;
        Ok(())
    }

    async fn finish(
        &self,
        task: &QueuedTask,
        state: TaskState,
        result: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let row = results::ActiveModel {
            task_id: Set(task.id.clone()),
            task_name: Set(task.task_name.clone()),
            state: Set(state),
            result: Set(result.to_string()),
            attempts: Set(i32::try_from(task.attempt()).unwrap_or(i32::MAX)),
            finished_at: Set(now),
            expires_at: Set(now + self.result_ttl),
        };
        results::Entity::insert(row)
            .on_conflict(
                OnConflict::column(results::Column::TaskId)
                    .update_columns([
                        results::Column::State,
                        results::Column::Result,
                        results::Column::Attempts,
                        results::Column::FinishedAt,
                        results::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.results)
            .await?;

        jobs::Entity::delete_by_id(task.id.clone())
            .exec(&*self.broker)
            .await?;
        Ok(())
    }

    async fn status(&self, task_id: &str, now: DateTime<Utc>) -> AppResult<Option<TaskStatus>> {
        let finished = results::Entity::find_by_id(task_id.to_string())
            .filter(results::Column::ExpiresAt.gt(now))
            .one(&*self.results)
            .await?;
        if let Some(r) = finished {
            return Ok(Some(TaskStatus {
                task_id: r.task_id,
                task_name: r.task_name,
                state: r.state,
                attempts: r.attempts,
                result: Some(r.result),
                last_error: None,
                next_run_at: None,
                finished_at: Some(r.finished_at),
            }));
        }

        let job = jobs::Entity::find_by_id(task_id.to_string())
            .one(&*self.broker)
            .await?;
        Ok(job.map(|j| {
            let in_flight = i32::from(j.state == TaskState::Started);
            TaskStatus {
                task_id: j.id,
                task_name: j.task_name,
                state: j.state,
                attempts: j.retries + in_flight,
                result: None,
                last_error: j.last_error,
                next_run_at: Some(j.run_at),
                finished_at: None,
            }
        }))
    }

    async fn purge_expired_results(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let res = results::Entity::delete_many()
            .filter(results::Column::ExpiresAt.lte(now))
            .exec(&*self.results)
            .await?;
        Ok(res.rows_affected)
    }
}

/// Producer side of the queue, shared by the HTTP handlers.
#[derive(Clone)]
pub struct TaskClient {
    store: Arc<dyn TaskStore>,
}

impl TaskClient {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub async fn send_login_email(&self, payload: &SendLoginEmail) -> AppResult<String> {
        let value = serde_json::to_value(payload)?;
        let task_id = self.store.push(SEND_LOGIN_EMAIL, value, Utc::now()).await?;
        log::info!(
            "Queued {SEND_LOGIN_EMAIL} task {task_id} for {}",
            payload.to_email
        );
        Ok(task_id)
    }

    pub async fn status(&self, task_id: &str) -> AppResult<Option<TaskStatus>> {
        self.store.status(task_id, Utc::now()).await
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryTaskStore;
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn job(id: &str, state: TaskState, retries: i32) -> jobs::Model {
        jobs::Model {
            id: id.to_string(),
            task_name: SEND_LOGIN_EMAIL.to_string(),
            payload: serde_json::json!({"to_email": "a@b.id"}),
            state,
            retries,
            run_at: Utc::now() - Duration::seconds(1),
            last_error: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_claim_skips_jobs_taken_by_another_worker() {
        let broker = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                job("t1", TaskState::Pending, 0),
                job("t2", TaskState::Retry, 2),
            ]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let results = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = DbTaskStore::new(Arc::new(broker), Arc::new(results), 3600);

        let now = Utc::now();
        let claimed = store
            .claim_due(now, now + Duration::seconds(300), 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, "t2");
        assert_eq!(claimed[0].retries, 2);
        assert_eq!(claimed[0].attempt(), 3);
        assert!(!claimed[0].recovered);
    }

    #[tokio::test]
    async fn test_claim_takes_back_started_job_with_expired_lease() {
        let broker = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![job("t4", TaskState::Started, 1)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let results = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = DbTaskStore::new(Arc::new(broker), Arc::new(results), 3600);

        let now = Utc::now();
        let claimed = store
            .claim_due(now, now + Duration::seconds(300), 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert!(claimed[0].recovered);
        assert_eq!(claimed[0].retries, 1);
    }

    #[tokio::test]
    async fn test_memory_claim_leases_jobs() {
        let store = MemoryTaskStore::default();
        let now = Utc::now();
        let lease = now + Duration::seconds(300);
        let id = store
            .push(SEND_LOGIN_EMAIL, serde_json::json!({}), now)
            .await
            .unwrap();

        assert_eq!(store.claim_due(now, lease, 10).await.unwrap().len(), 1);
        assert_eq!(store.job(&id).unwrap().run_at, lease);
        // still leased
        let early = now + Duration::seconds(299);
        assert!(store.claim_due(early, lease, 10).await.unwrap().is_empty());

        let again = store
            .claim_due(lease, lease + Duration::seconds(300), 10)
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert!(again[0].recovered);
    }

    #[tokio::test]
    async fn test_status_falls_back_to_broker() {
        let results = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<results::Model>::new()])
            .into_connection();
        let mut retrying = job("t9", TaskState::Retry, 1);
        retrying.last_error = Some("Email delivery failed (transport): timeout".into());
        let broker = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![retrying]])
            .into_connection();
        let store = DbTaskStore::new(Arc::new(broker), Arc::new(results), 3600);

        let status = store.status("t9", Utc::now()).await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Retry);
        assert_eq!(status.attempts, 1);
        assert!(status.last_error.unwrap().contains("timeout"));
        assert!(status.result.is_none());
    }

    #[tokio::test]
    async fn test_status_prefers_terminal_result() {
        let now = Utc::now();
        let results = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![results::Model {
                task_id: "t3".into(),
                task_name: SEND_LOGIN_EMAIL.into(),
                state: TaskState::Succeeded,
                result: "abc".into(),
                attempts: 1,
                finished_at: now,
                expires_at: now + Duration::seconds(3600),
            }]])
            .into_connection();
        let broker = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = DbTaskStore::new(Arc::new(broker), Arc::new(results), 3600);

        let status = store.status("t3", now).await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Succeeded);
        assert_eq!(status.result.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_client_enqueues_payload() {
        let store = Arc::new(MemoryTaskStore::default());
        let client = TaskClient::new(store.clone());
        let payload = SendLoginEmail {
            to_email: "guru@sekolah.sch.id".into(),
            name: "Guru".into(),
            username: "guru77".into(),
            password: "Abcdef1234".into(),
            login_link: Some("https://absen.test/login".into()),
        };

        let id = client.send_login_email(&payload).await.unwrap();
        let queued = store.job(&id).unwrap();
        assert_eq!(queued.task_name, SEND_LOGIN_EMAIL);
        assert_eq!(queued.state, TaskState::Pending);
        assert_eq!(queued.payload["username"], "guru77");

        let status = client.status(&id).await.unwrap().unwrap();
        assert_eq!(status.state, TaskState::Pending);
        assert!(client.status("unknown").await.unwrap().is_none());
    }
}
