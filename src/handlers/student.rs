use crate::entities::UserRole;
use crate::middlewares::require_role;
use crate::models::*;
use crate::services::{AttendanceService, DashboardService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

const STUDENT: &[UserRole] = &[UserRole::Student];

#[utoipa::path(
    get,
    path = "/api/v1/student/dashboard",
    tag = "student",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Profile, classroom and month summary", body = StudentDashboardResponse))
)]
pub async fn dashboard(
    dashboard_service: web::Data<DashboardService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user = require_role(&req, STUDENT)?;
    match dashboard_service.student(user.user_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/student/attendance",
    tag = "student",
    params(MonthQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own attendance for a month", body = StudentAttendanceResponse),
        (status = 400, description = "Malformed month")
    )
)]
pub async fn attendance(
    attendance_service: web::Data<AttendanceService>,
    req: HttpRequest,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse> {
    let user = require_role(&req, STUDENT)?;
    match attendance_service
        .student_attendance(user.user_id, query.month.as_deref())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn student_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/student")
            .route("/dashboard", web::get().to(dashboard))
            .route("/attendance", web::get().to(attendance)),
    );
}
