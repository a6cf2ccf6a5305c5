use crate::config::AppConfig;
use crate::error::AppError;
use crate::middlewares::{current_user, subscription::EXPIRED_NOTICE};
use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};

fn notice_message(notice: Option<&str>) -> Option<String> {
    match notice? {
        EXPIRED_NOTICE => Some(
            "Your school's subscription has expired. Please contact your administrator."
                .to_string(),
        ),
        _ => None,
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/login",
    tag = "auth",
    params(LoginPageQuery),
    responses((status = 200, description = "Login landing", body = LoginPageResponse))
)]
pub async fn login_page(
    app: web::Data<AppConfig>,
    query: web::Query<LoginPageQuery>,
) -> Result<HttpResponse> {
    let notice = query.into_inner().notice;
    Ok(HttpResponse::Ok().json(ApiResponse::success(LoginPageResponse {
        login_url: app.login_url(),
        message: notice_message(notice.as_deref()),
        notice,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Wrong credentials or disabled account")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New token pair", body = AuthResponse),
        (status = 401, description = "Missing or invalid refresh token")
    )
)]
pub async fn refresh(
    auth_service: web::Data<AuthService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Ok(AppError::AuthError("Missing refresh token".to_string()).error_response());
    };

    match auth_service.refresh_token(token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(req: HttpRequest) -> Result<HttpResponse> {
    if let Ok(user) = current_user(&req) {
        log::info!("User {} logged out", user.user_id);
    }
    // tokens are stateless, the client drops them
    Ok(HttpResponse::Ok()
        .insert_header(("Clear-Site-Data", "\"cookies\", \"storage\""))
        .json(ApiResponse::success_with_message(
            serde_json::Value::Null,
            "Logged out",
        )))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchoolRequest,
    responses(
        (status = 200, description = "School registered", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Public registration is disabled")
    )
)]
pub async fn register(
    auth_service: web::Data<AuthService>,
    request: web::Json<RegisterSchoolRequest>,
) -> Result<HttpResponse> {
    match auth_service.register(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
            response,
            "School registered",
        ))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(auth_service: web::Data<AuthService>, req: HttpRequest) -> Result<HttpResponse> {
    let user = current_user(&req)?;
    match auth_service.me(user.user_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::get().to(login_page))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/logout", web::post().to(logout))
            .route("/register", web::post().to(register))
            .route("/me", web::get().to(me)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test as actix_test};

    #[test]
    fn test_notice_message() {
        assert!(notice_message(Some("subscription_expired")).is_some());
        assert!(notice_message(Some("something_else")).is_none());
        assert!(notice_message(None).is_none());
    }

    #[actix_web::test]
    async fn test_login_page_echoes_notice() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(AppConfig {
                    public_url: "https://absen.test".into(),
                    ..AppConfig::default()
                }))
                .service(web::scope("/api/v1").configure(auth_config)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/auth/login?notice=subscription_expired")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["notice"], "subscription_expired");
        assert_eq!(body["data"]["login_url"], "https://absen.test/api/v1/auth/login");
        assert!(body["data"]["message"].is_string());
    }
}
