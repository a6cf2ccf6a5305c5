use crate::config::AppConfig;
use crate::middlewares::current_user;
use crate::models::ApiResponse;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/",
    tag = "site",
    responses(
        (status = 302, description = "Authenticated: redirect to the role dashboard"),
        (status = 200, description = "Anonymous: landing information")
    )
)]
pub async fn index(req: HttpRequest, app: web::Data<AppConfig>) -> Result<HttpResponse> {
    if let Ok(user) = current_user(&req) {
        return Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, user.role.dashboard_path()))
            .finish());
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({
        "name": "HubSensi",
        "login_url": app.login_url(),
        "registration_open": app.allow_public_registration,
    }))))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "site",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "healthy" }))
}

fn robots_body(public_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /api/\nSitemap: {}/sitemap.xml\n",
        public_url.trim_end_matches('/')
    )
}

fn sitemap_body(public_url: &str, login_url: &str) -> String {
    let base = public_url.trim_end_matches('/');
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
            "  <url><loc>{}/</loc></url>\n",
            "  <url><loc>{}</loc></url>\n",
            "</urlset>\n"
        ),
        base, login_url
    )
}

pub async fn robots(app: web::Data<AppConfig>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(robots_body(&app.public_url))
}

pub async fn sitemap(app: web::Data<AppConfig>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/xml; charset=utf-8")
        .body(sitemap_body(&app.public_url, &app.login_url()))
}

pub async fn not_found(req: HttpRequest) -> HttpResponse {
    log::debug!("No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(ApiResponse::error("NOT_FOUND", "Resource not found"))
}

pub fn site_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/robots.txt", web::get().to(robots))
        .route("/sitemap.xml", web::get().to(sitemap));
}
