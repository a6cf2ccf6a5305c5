use crate::entities::{
    EventType, classroom_entity, school_event_entity, school_qr_code_entity, student_entity,
    teacher_entity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassroomResponse {
    pub id: i64,
    pub name: String,
    pub grade_level: Option<String>,
    pub homeroom_teacher_id: Option<i64>,
}

impl From<classroom_entity::Model> for ClassroomResponse {
    fn from(c: classroom_entity::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            grade_level: c.grade_level,
            homeroom_teacher_id: c.homeroom_teacher_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateClassroomRequest {
    #[schema(example = "X IPA 1")]
    pub name: String,
    #[schema(example = "10")]
    pub grade_level: Option<String>,
    pub homeroom_teacher_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherResponse {
    pub id: i64,
    pub user_id: i64,
    pub nip: Option<String>,
    pub full_name: String,
    pub is_homeroom: bool,
}

impl From<teacher_entity::Model> for TeacherResponse {
    fn from(t: teacher_entity::Model) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            nip: t.nip,
            full_name: t.full_name,
            is_homeroom: t.is_homeroom,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentResponse {
    pub id: i64,
    pub user_id: i64,
    pub nis: String,
    pub nisn: Option<String>,
    pub full_name: String,
    pub classroom_id: Option<i64>,
    pub qr_code: Option<String>,
}

impl From<student_entity::Model> for StudentResponse {
    fn from(s: student_entity::Model) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            nis: s.nis,
            nisn: s.nisn,
            full_name: s.full_name,
            classroom_id: s.classroom_id,
            qr_code: s.qr_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub event_type: EventType,
    pub is_holiday: bool,
}

impl From<school_event_entity::Model> for EventResponse {
    fn from(e: school_event_entity::Model) -> Self {
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            start_date: e.start_date,
            end_date: e.end_date,
            event_type: e.event_type,
            is_holiday: e.is_holiday,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "Ujian Tengah Semester")]
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub event_type: EventType,
    /// Defaults to true for `LIBUR`.
    pub is_holiday: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QrCodeResponse {
    pub qr_code: String,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl QrCodeResponse {
    pub fn from_model(qr: school_qr_code_entity::Model) -> Self {
        Self {
            qr_code: qr.qr_code.unwrap_or_default(),
            is_active: qr.is_active,
            updated_at: qr.updated_at,
        }
    }
}
