use crate::entities::UserRole;
use crate::middlewares::require_role;
use crate::models::*;
use crate::services::{
    AccountService, AttendanceService, ClassroomService, DashboardService, SubscriptionService,
};
use crate::utils::clock;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

const ADMIN: &[UserRole] = &[UserRole::Admin];

#[utoipa::path(
    get,
    path = "/api/v1/admin/dashboard",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "School overview", body = AdminDashboardResponse))
)]
pub async fn dashboard(
    dashboard_service: web::Data<DashboardService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match dashboard_service.admin(school_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/subscription",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Plan, validity and limits", body = SubscriptionResponse),
        (status = 404, description = "No subscription on record")
    )
)]
pub async fn subscription(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match subscription_service.get_for_school(school_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/teachers",
    tag = "admin",
    request_body = CreateTeacherRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Teacher created, credentials queued", body = AccountCreatedResponse),
        (status = 400, description = "Invalid input or plan limit reached")
    )
)]
pub async fn create_teacher(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
    request: web::Json<CreateTeacherRequest>,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match account_service
        .create_teacher(school_id, request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/students",
    tag = "admin",
    request_body = CreateStudentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Student created, credentials queued", body = AccountCreatedResponse),
        (status = 400, description = "Invalid input or plan limit reached")
    )
)]
pub async fn create_student(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
    request: web::Json<CreateStudentRequest>,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match account_service
        .create_student(school_id, request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/classrooms",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Classrooms of the school", body = [ClassroomResponse]))
)]
pub async fn list_classrooms(
    classroom_service: web::Data<ClassroomService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match classroom_service.list_classrooms(school_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/classrooms",
    tag = "admin",
    request_body = CreateClassroomRequest,
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Classroom created", body = ClassroomResponse))
)]
pub async fn create_classroom(
    classroom_service: web::Data<ClassroomService>,
    req: HttpRequest,
    request: web::Json<CreateClassroomRequest>,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match classroom_service
        .create_classroom(school_id, request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/events",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "School calendar", body = [EventResponse]))
)]
pub async fn list_events(
    classroom_service: web::Data<ClassroomService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match classroom_service.list_events(school_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/events",
    tag = "admin",
    request_body = CreateEventRequest,
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Event created", body = EventResponse))
)]
pub async fn create_event(
    classroom_service: web::Data<ClassroomService>,
    req: HttpRequest,
    request: web::Json<CreateEventRequest>,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match classroom_service
        .create_event(school_id, request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/qr-code",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "New check-in QR code", body = QrCodeResponse))
)]
pub async fn regenerate_qr_code(
    classroom_service: web::Data<ClassroomService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    match classroom_service.regenerate_qr_code(school_id).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/attendance",
    tag = "admin",
    params(DateQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Attendance of the day", body = [AttendanceRecordResponse]))
)]
pub async fn attendance(
    attendance_service: web::Data<AttendanceService>,
    req: HttpRequest,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse> {
    let school_id = require_role(&req, ADMIN)?.school()?;
    let date = query.date.unwrap_or_else(clock::today);
    match attendance_service.school_attendance(school_id, date).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/dashboard", web::get().to(dashboard))
            .route("/subscription", web::get().to(subscription))
            .route("/teachers", web::post().to(create_teacher))
            .route("/students", web::post().to(create_student))
            .route("/classrooms", web::get().to(list_classrooms))
            .route("/classrooms", web::post().to(create_classroom))
            .route("/events", web::get().to(list_events))
            .route("/events", web::post().to(create_event))
            .route("/qr-code", web::post().to(regenerate_qr_code))
            .route("/attendance", web::get().to(attendance)),
    );
}
