use crate::entities::{AttendanceStatus, teacher_attendance_entity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordAttendanceRequest {
    pub classroom_id: i64,
    /// Defaults to today in the school timezone.
    pub date: Option<NaiveDate>,
    pub entries: Vec<AttendanceEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordAttendanceResponse {
    pub classroom_id: i64,
    pub date: NaiveDate,
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecordResponse {
    pub id: i64,
    pub student_id: i64,
    pub student_name: Option<String>,
    pub classroom_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub hadir: u64,
    pub izin: u64,
    pub sakit: u64,
    pub alpha: u64,
    pub total: u64,
}

impl AttendanceSummary {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Hadir => self.hadir += 1,
            AttendanceStatus::Izin => self.izin += 1,
            AttendanceStatus::Sakit => self.sakit += 1,
            AttendanceStatus::Alpha => self.alpha += 1,
        }
        self.total += 1;
    }
}

impl FromIterator<AttendanceStatus> for AttendanceSummary {
    fn from_iter<I: IntoIterator<Item = AttendanceStatus>>(iter: I) -> Self {
        let mut summary = Self::default();
        for status in iter {
            summary.add(status);
        }
        summary
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckInRequest {
    /// Content of the school QR code.
    pub qr_code: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckInAction {
    CheckIn,
    CheckOut,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckInResponse {
    pub action: CheckInAction,
    pub attendance: TeacherAttendanceResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TeacherAttendanceResponse {
    pub date: NaiveDate,
    pub time_in: Option<DateTime<Utc>>,
    pub time_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
}

impl From<teacher_attendance_entity::Model> for TeacherAttendanceResponse {
    fn from(a: teacher_attendance_entity::Model) -> Self {
        Self {
            date: a.date,
            time_in: a.time_in,
            time_out: a.time_out,
            status: a.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentAttendanceResponse {
    pub month: String,
    pub summary: AttendanceSummary,
    pub records: Vec<AttendanceRecordResponse>,
}
