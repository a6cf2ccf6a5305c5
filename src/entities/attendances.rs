use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema, DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// Present
    #[sea_orm(string_value = "hadir")]
    Hadir,
    /// Excused
    #[sea_orm(string_value = "izin")]
    Izin,
    /// Sick
    #[sea_orm(string_value = "sakit")]
    Sakit,
    /// Absent without notice
    #[sea_orm(string_value = "alpha")]
    Alpha,
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceStatus::Hadir => write!(f, "hadir"),
            AttendanceStatus::Izin => write!(f, "izin"),
            AttendanceStatus::Sakit => write!(f, "sakit"),
            AttendanceStatus::Alpha => write!(f, "alpha"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "attendances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub school_id: i64,
    pub student_id: i64,
    pub classroom_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Teacher id
    pub recorded_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
