use crate::config::MissingSubscriptionPolicy;
use crate::entities::{UserRole, subscription_entity as subscriptions};
use crate::error::AppError;
use crate::middlewares::CurrentUser;
use crate::models::ApiResponse;
use crate::services::SubscriptionLookup;
use crate::utils::clock;
use actix_web::body::EitherBody;
use actix_web::http::header;
use actix_web::{
    Error, HttpMessage, HttpResponse, ResponseError,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use chrono::NaiveDate;
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

pub const EXPIRED_NOTICE: &str = "subscription_expired";

/// Reachable even with a lapsed subscription.
const EXEMPT_PATHS: [&str; 2] = ["/api/v1/auth/login", "/api/v1/auth/logout"];
const EXEMPT_PREFIXES: [&str; 1] = ["/static/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    ForceLogout,
}

/// School whose subscription must be checked, or `None` when the request
/// is not gated at all.
pub fn gated_school(user: Option<&CurrentUser>, path: &str) -> Option<i64> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if EXEMPT_PATHS.contains(&trimmed) || EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return None;
    }
    let user = user?;
    if user.role == UserRole::Superadmin {
        return None;
    }
    user.school_id
}

pub fn decide(
    subscription: Option<&subscriptions::Model>,
    policy: MissingSubscriptionPolicy,
    today: NaiveDate,
) -> GateDecision {
    match (subscription, policy) {
        (Some(sub), _) if sub.is_valid_on(today) => GateDecision::Pass,
        (Some(_), _) => GateDecision::ForceLogout,
        (None, MissingSubscriptionPolicy::Allow) => GateDecision::Pass,
        (None, MissingSubscriptionPolicy::Deny) => GateDecision::ForceLogout,
    }
}

pub fn login_redirect() -> String {
    format!("/api/v1/auth/login?notice={EXPIRED_NOTICE}")
}

/// 303 to the login page that also wipes client-side credentials.
pub fn force_logout_response() -> HttpResponse {
    let location = login_redirect();
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.as_str()))
        .insert_header(("Clear-Site-Data", "\"cookies\", \"storage\""))
        .json(ApiResponse::error_with_redirect(
            "SUBSCRIPTION_EXPIRED",
            "Your school's subscription has expired. Please contact your administrator.",
            location.as_str(),
        ))
}

/// Logs out users of schools whose subscription is no longer valid.
/// Must sit inside `AuthMiddleware` so the current user is known.
pub struct SubscriptionGate {
    lookup: Arc<dyn SubscriptionLookup>,
    policy: MissingSubscriptionPolicy,
}

impl SubscriptionGate {
    pub fn new(lookup: Arc<dyn SubscriptionLookup>, policy: MissingSubscriptionPolicy) -> Self {
        Self { lookup, policy }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SubscriptionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SubscriptionGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SubscriptionGateService {
            service: Rc::new(service),
            lookup: self.lookup.clone(),
            policy: self.policy,
        }))
    }
}

pub struct SubscriptionGateService<S> {
    service: Rc<S>,
    lookup: Arc<dyn SubscriptionLookup>,
    policy: MissingSubscriptionPolicy,
}

impl<S, B> Service<ServiceRequest> for SubscriptionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user = req.extensions().get::<CurrentUser>().copied();
        let Some(school_id) = gated_school(user.as_ref(), req.path()) else {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) });
        };

        let service = Rc::clone(&self.service);
        let lookup = self.lookup.clone();
        let policy = self.policy;

        Box::pin(async move {
            let subscription = match lookup.find_by_school(school_id).await {
                Ok(sub) => sub,
                Err(e) => {
                    log::error!("Subscription check failed for school {school_id}: {e}");
                    let resp = AppError::ServiceUnavailable(e.to_string()).error_response();
                    return Ok(req.into_response(resp).map_into_right_body());
                }
            };

            match decide(subscription.as_ref(), policy, clock::today()) {
                GateDecision::Pass => service
                    .call(req)
                    .await
                    .map(ServiceResponse::map_into_left_body),
                GateDecision::ForceLogout => {
                    log::warn!(
                        "Forced logout of user {:?} on {}: school {school_id} has no valid subscription",
                        user.map(|u| u.user_id),
                        req.path()
                    );
                    Ok(req
                        .into_response(force_logout_response())
                        .map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::SubscriptionPlan;
    use crate::error::AppResult;
    use crate::middlewares::AuthMiddleware;
    use crate::utils::JwtService;
    use actix_web::http::StatusCode;
    use actix_web::{App, test as actix_test, web};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn subscription(is_active: bool, end_date: NaiveDate) -> subscriptions::Model {
        subscriptions::Model {
            id: 1,
            school_id: 7,
            plan: SubscriptionPlan::Basic,
            is_active,
            start_date: date(2020, 1, 1),
            end_date,
            max_teachers: 5,
            max_students: 100,
            features: serde_json::json!({}),
            created_at: None,
            updated_at: None,
        }
    }

    fn user(role: UserRole, school_id: Option<i64>) -> CurrentUser {
        CurrentUser {
            user_id: 3,
            role,
            school_id,
        }
    }

    struct StubLookup {
        result: Option<subscriptions::Model>,
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SubscriptionLookup for StubLookup {
        async fn find_by_school(&self, _school_id: i64) -> AppResult<Option<subscriptions::Model>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::DatabaseError(sea_orm::DbErr::Custom(
                    "connection refused".into(),
                )));
            }
            Ok(self.result.clone())
        }
    }

    #[test]
    fn test_gated_school_bypasses() {
        let admin = user(UserRole::Admin, Some(7));
        assert_eq!(gated_school(None, "/api/v1/admin/dashboard"), None);
        assert_eq!(
            gated_school(Some(&user(UserRole::Superadmin, None)), "/api/v1/superadmin/schools"),
            None
        );
        assert_eq!(gated_school(Some(&admin), "/api/v1/auth/login"), None);
        assert_eq!(gated_school(Some(&admin), "/api/v1/auth/login/"), None);
        assert_eq!(gated_school(Some(&admin), "/api/v1/auth/logout"), None);
        assert_eq!(gated_school(Some(&admin), "/static/logo.png"), None);
        // only the exact login and logout routes are exempt
        assert_eq!(gated_school(Some(&admin), "/api/v1/auth/login-history"), Some(7));
        assert_eq!(gated_school(Some(&admin), "/api/v1/auth/logout/all"), Some(7));
        assert_eq!(gated_school(Some(&admin), "/static"), Some(7));
        assert_eq!(gated_school(Some(&user(UserRole::Teacher, None)), "/"), None);
        assert_eq!(gated_school(Some(&admin), "/api/v1/admin/dashboard"), Some(7));
    }

    #[test]
    fn test_decide() {
        let today = date(2026, 10, 19);
        let allow = MissingSubscriptionPolicy::Allow;
        let deny = MissingSubscriptionPolicy::Deny;

        assert_eq!(decide(Some(&subscription(true, today)), allow, today), GateDecision::Pass);
        assert_eq!(
            decide(Some(&subscription(true, date(2026, 10, 18))), allow, today),
            GateDecision::ForceLogout
        );
        assert_eq!(
            decide(Some(&subscription(false, date(2027, 1, 1))), allow, today),
            GateDecision::ForceLogout
        );
        assert_eq!(decide(None, allow, today), GateDecision::Pass);
        assert_eq!(decide(None, deny, today), GateDecision::ForceLogout);
    }

    async fn call_gated(
        lookup: Arc<StubLookup>,
        policy: MissingSubscriptionPolicy,
        role: UserRole,
        path: &str,
    ) -> ServiceResponse<impl actix_web::body::MessageBody> {
        let jwt = JwtService::new("test-secret", 60, 120);
        let app = actix_test::init_service(
            App::new()
                .wrap(SubscriptionGate::new(lookup, policy))
                .wrap(AuthMiddleware::new(jwt.clone()))
                .default_service(web::to(|| async { HttpResponse::Ok().body("ok") })),
        )
        .await;
        let school = (role != UserRole::Superadmin).then_some(7);
        let token = jwt.generate_access_token(3, role, school).unwrap();
        let req = actix_test::TestRequest::get()
            .uri(path)
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        actix_test::call_service(&app, req).await
    }

    #[actix_web::test]
    async fn test_expired_subscription_forces_logout() {
        let lookup = Arc::new(StubLookup {
            result: Some(subscription(true, date(2000, 1, 1))),
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let resp = call_gated(
            lookup.clone(),
            MissingSubscriptionPolicy::Allow,
            UserRole::Teacher,
            "/api/v1/teacher/dashboard",
        )
        .await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/api/v1/auth/login?notice=subscription_expired"
        );
        assert!(resp.headers().contains_key("clear-site-data"));
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "SUBSCRIPTION_EXPIRED");
        assert_eq!(body["redirect"], "/api/v1/auth/login?notice=subscription_expired");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn test_superadmin_and_login_are_not_checked() {
        let lookup = Arc::new(StubLookup {
            result: Some(subscription(false, date(2000, 1, 1))),
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let resp = call_gated(
            lookup.clone(),
            MissingSubscriptionPolicy::Deny,
            UserRole::Superadmin,
            "/api/v1/superadmin/dashboard",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = call_gated(
            lookup.clone(),
            MissingSubscriptionPolicy::Deny,
            UserRole::Admin,
            "/api/v1/auth/login",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn test_missing_subscription_follows_policy() {
        let lookup = Arc::new(StubLookup {
            result: None,
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let resp = call_gated(
            lookup.clone(),
            MissingSubscriptionPolicy::Allow,
            UserRole::Student,
            "/api/v1/student/dashboard",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = call_gated(
            lookup,
            MissingSubscriptionPolicy::Deny,
            UserRole::Student,
            "/api/v1/student/dashboard",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[actix_web::test]
    async fn test_lookup_failure_is_service_unavailable() {
        let lookup = Arc::new(StubLookup {
            result: None,
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let resp = call_gated(
            lookup,
            MissingSubscriptionPolicy::Allow,
            UserRole::Admin,
            "/api/v1/admin/dashboard",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
