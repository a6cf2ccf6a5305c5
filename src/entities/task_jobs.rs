use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a background task, pending through terminal.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "started")]
    Started,
    #[sea_orm(string_value = "retry")]
    Retry,
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    /// Gave up after the retry bound.
    #[sea_orm(string_value = "exhausted")]
    Exhausted,
    /// Failed with an error that retrying cannot fix.
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Exhausted | TaskState::Rejected
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Started => "started",
            TaskState::Retry => "retry",
            TaskState::Succeeded => "succeeded",
            TaskState::Exhausted => "exhausted",
            TaskState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Broker row: work that has not reached a terminal state.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "task_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub task_name: String,
    pub payload: Json,
    pub state: TaskState,
    /// Retries already scheduled; attempt number is `retries + 1`.
    pub retries: i32,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
