use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use crate::utils::{Claims, JwtService};
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// Identity taken from a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub role: UserRole,
    pub school_id: Option<i64>,
}

impl CurrentUser {
    fn from_claims(claims: &Claims) -> Option<Self> {
        Some(Self {
            user_id: claims.sub.parse().ok()?,
            role: claims.role,
            school_id: claims.school_id,
        })
    }

    /// School of a tenant user; superadmins have none.
    pub fn school(&self) -> AppResult<i64> {
        self.school_id
            .ok_or_else(|| AppError::AuthError("Account is not linked to a school".to_string()))
    }
}

struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
    excluded_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            exact_paths: vec![
                "/",
                "/health",
                "/robots.txt",
                "/sitemap.xml",
                "/swagger-ui",
                "/api-docs/openapi.json",
            ],
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/static/", "/api/v1/auth/"],
            // under a public prefix but need an access token
            excluded_paths: vec!["/api/v1/auth/me"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        if self
            .excluded_paths
            .iter()
            .any(|&excluded| path.starts_with(excluded))
        {
            return false;
        }

        if self.exact_paths.contains(&path) {
            return true;
        }

        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflight
        if req.method() == Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        let public = self.public_paths.is_public_path(req.path());
        let verified = bearer_token(&req).map(|token| {
            self.jwt_service
                .verify_access_token(token)
                .ok()
                .and_then(|claims| CurrentUser::from_claims(&claims))
        });

        match verified {
            Some(Some(user)) => {
                req.extensions_mut().insert(user);
                Box::pin(self.service.call(req))
            }
            // a stale token on a public page is simply ignored
            _ if public => Box::pin(self.service.call(req)),
            Some(None) => {
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Missing access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

pub fn current_user(req: &HttpRequest) -> AppResult<CurrentUser> {
    req.extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

/// Current user, provided their role is one of `roles`.
pub fn require_role(req: &HttpRequest, roles: &[UserRole]) -> AppResult<CurrentUser> {
    let user = current_user(req)?;
    if !roles.contains(&user.role) {
        log::warn!(
            "User {} with role {} denied access to {}",
            user.user_id,
            user.role,
            req.path()
        );
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test as actix_test, web};

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match current_user(&req) {
            Ok(user) => HttpResponse::Ok().body(user.user_id.to_string()),
            Err(_) => HttpResponse::Ok().body("anonymous"),
        }
    }

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/"));
        assert!(paths.is_public_path("/health"));
        assert!(paths.is_public_path("/api/v1/auth/login"));
        assert!(paths.is_public_path("/api/v1/auth/refresh"));
        assert!(paths.is_public_path("/swagger-ui/index.html"));
        assert!(!paths.is_public_path("/api/v1/auth/me"));
        assert!(!paths.is_public_path("/api/v1/admin/dashboard"));
    }

    #[actix_web::test]
    async fn test_protected_route_requires_token() {
        let jwt = JwtService::new("test-secret", 60, 120);
        let app = actix_test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .route("/api/v1/admin/dashboard", web::get().to(whoami))
                .route("/", web::get().to(whoami)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/dashboard")
            .to_request();
        let err = actix_test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(
            err.error_response().status(),
            actix_web::http::StatusCode::UNAUTHORIZED
        );

        let token = jwt
            .generate_access_token(42, UserRole::Admin, Some(1))
            .unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/dashboard")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "42");

        // refresh tokens are not access tokens
        let refresh = jwt
            .generate_refresh_token(42, UserRole::Admin, Some(1))
            .unwrap();
        let req = actix_test::TestRequest::get()
            .uri("/")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, "anonymous");
    }

    #[test]
    fn test_role_guard() {
        let req = actix_test::TestRequest::get()
            .uri("/api/v1/admin/dashboard")
            .to_http_request();
        assert!(matches!(
            require_role(&req, &[UserRole::Admin]),
            Err(AppError::AuthError(_))
        ));

        req.extensions_mut().insert(CurrentUser {
            user_id: 1,
            role: UserRole::Teacher,
            school_id: Some(1),
        });
        assert!(matches!(
            require_role(&req, &[UserRole::Admin]),
            Err(AppError::PermissionDenied)
        ));
        let user = require_role(&req, &[UserRole::Admin, UserRole::Teacher]).unwrap();
        assert_eq!(user.school().unwrap(), 1);
    }
}
