use super::{
    AttendanceSummary, BrandingResponse, ClassroomResponse, EventResponse, SchoolResponse,
    StudentResponse, SubscriptionResponse, TeacherAttendanceResponse, TeacherResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminDashboardResponse {
    pub school: SchoolResponse,
    pub branding: BrandingResponse,
    pub subscription: Option<SubscriptionResponse>,
    pub total_teachers: u64,
    pub total_students: u64,
    pub total_classrooms: u64,
    pub today: NaiveDate,
    pub today_attendance: AttendanceSummary,
    pub upcoming_events: Vec<EventResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeacherDashboardResponse {
    pub teacher: TeacherResponse,
    pub branding: BrandingResponse,
    pub homeroom: Option<ClassroomResponse>,
    pub today: NaiveDate,
    pub today_check_in: Option<TeacherAttendanceResponse>,
    pub upcoming_events: Vec<EventResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StudentDashboardResponse {
    pub student: StudentResponse,
    pub branding: BrandingResponse,
    pub classroom: Option<ClassroomResponse>,
    pub month: String,
    pub month_summary: AttendanceSummary,
    pub upcoming_events: Vec<EventResponse>,
}
