use crate::entities::UserRole;
use crate::middlewares::require_role;
use crate::models::*;
use crate::services::{AttendanceService, DashboardService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use chrono::Utc;

const TEACHER: &[UserRole] = &[UserRole::Teacher];

#[utoipa::path(
    get,
    path = "/api/v1/teacher/dashboard",
    tag = "teacher",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Profile, homeroom and today's check-in", body = TeacherDashboardResponse))
)]
pub async fn dashboard(
    dashboard_service: web::Data<DashboardService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = require_role(&req, TEACHER)?;
    match dashboard_service.teacher(user.user_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/teacher/attendance",
    tag = "teacher",
    request_body = RecordAttendanceRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attendance saved", body = RecordAttendanceResponse),
        (status = 400, description = "Unknown students or future date")
    )
)]
pub async fn record_attendance(
    attendance_service: web::Data<AttendanceService>,
    req: HttpRequest,
    request: web::Json<RecordAttendanceRequest>,
) -> Result<HttpResponse> {
    let user = require_role(&req, TEACHER)?;
    let school_id = user.school()?;
    match attendance_service
        .record_class_attendance(user.user_id, school_id, request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/teacher/check-in",
    tag = "teacher",
    request_body = CheckInRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checked in or out", body = CheckInResponse),
        (status = 400, description = "Invalid QR code or already checked out")
    )
)]
pub async fn check_in(
    attendance_service: web::Data<AttendanceService>,
    req: HttpRequest,
    request: web::Json<CheckInRequest>,
) -> Result<HttpResponse> {
    let user = require_role(&req, TEACHER)?;
    let school_id = user.school()?;
    match attendance_service
        .check_in(user.user_id, school_id, request.into_inner(), Utc::now())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn teacher_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/teacher")
            .route("/dashboard", web::get().to(dashboard))
            .route("/attendance", web::post().to(record_attendance))
            .route("/check-in", web::post().to(check_in)),
    );
}
