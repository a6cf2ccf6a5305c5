use super::TaskState;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Result backend row, kept until `expires_at`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "task_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub task_id: String,
    pub task_name: String,
    pub state: TaskState,
    pub result: String,
    pub attempts: i32,
    pub finished_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
