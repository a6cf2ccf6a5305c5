use crate::entities::UserRole;
use crate::error::AppError;
use crate::middlewares::require_role;
use crate::models::*;
use crate::services::{AccountService, SchoolService, SubscriptionService};
use crate::tasks::{TaskClient, TaskStatus};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

const SUPERADMIN: &[UserRole] = &[UserRole::Superadmin];

#[utoipa::path(
    get,
    path = "/api/v1/superadmin/dashboard",
    tag = "superadmin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Tenant statistics", body = SuperadminDashboardResponse),
        (status = 403, description = "Not a superadmin")
    )
)]
pub async fn dashboard(
    school_service: web::Data<SchoolService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    require_role(&req, SUPERADMIN)?;
    match school_service.dashboard().await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/superadmin/schools",
    tag = "superadmin",
    params(PaginationParams),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Schools with their subscription"))
)]
pub async fn list_schools(
    school_service: web::Data<SchoolService>,
    req: HttpRequest,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    require_role(&req, SUPERADMIN)?;
    match school_service.list_schools(&query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(ApiResponse::success(page))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/superadmin/schools",
    tag = "superadmin",
    request_body = CreateSchoolRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "School created", body = SchoolDetailResponse),
        (status = 400, description = "Invalid input or duplicate code")
    )
)]
pub async fn create_school(
    school_service: web::Data<SchoolService>,
    req: HttpRequest,
    request: web::Json<CreateSchoolRequest>,
) -> Result<HttpResponse> {
    require_role(&req, SUPERADMIN)?;
    match school_service.create_school(request.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            data,
            "School created",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/superadmin/schools/{id}/subscription",
    tag = "superadmin",
    params(("id" = i64, Path, description = "School id")),
    request_body = UpdateSubscriptionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription saved", body = SubscriptionResponse),
        (status = 404, description = "School not found")
    )
)]
pub async fn update_subscription(
    subscription_service: web::Data<SubscriptionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateSubscriptionRequest>,
) -> Result<HttpResponse> {
    require_role(&req, SUPERADMIN)?;
    match subscription_service
        .update(path.into_inner(), request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/superadmin/schools/{id}/admins",
    tag = "superadmin",
    params(("id" = i64, Path, description = "School id")),
    request_body = CreateAdminRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Admin created, credentials queued", body = AccountCreatedResponse),
        (status = 404, description = "School not found")
    )
)]
pub async fn create_admin(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateAdminRequest>,
) -> Result<HttpResponse> {
    require_role(&req, SUPERADMIN)?;
    match account_service
        .create_school_admin(path.into_inner(), request.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(ApiResponse::success(data))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/superadmin/tasks/{task_id}",
    tag = "superadmin",
    params(("task_id" = String, Path, description = "Id returned when the task was queued")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Task state", body = TaskStatus),
        (status = 404, description = "Unknown or expired task")
    )
)]
pub async fn task_status(
    tasks: web::Data<TaskClient>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    require_role(&req, SUPERADMIN)?;
    match tasks.status(&path).await {
        Ok(Some(status)) => Ok(HttpResponse::Ok().json(ApiResponse::success(status))),
        Ok(None) => Ok(AppError::NotFound("Task not found".to_string()).error_response()),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn superadmin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/superadmin")
            .route("/dashboard", web::get().to(dashboard))
            .route("/schools", web::get().to(list_schools))
            .route("/schools", web::post().to(create_school))
            .route(
                "/schools/{id}/subscription",
                web::put().to(update_subscription),
            )
            .route("/schools/{id}/admins", web::post().to(create_admin))
            .route("/tasks/{task_id}", web::get().to(task_status)),
    );
}
