use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{AttendanceStatus, EventType, SubscriptionPlan, TaskState, UserRole};
use crate::handlers;
use crate::models::*;
use crate::tasks::TaskStatus;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::site::index,
        handlers::site::health,
        handlers::auth::login_page,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::register,
        handlers::auth::me,
        handlers::superadmin::dashboard,
        handlers::superadmin::list_schools,
        handlers::superadmin::create_school,
        handlers::superadmin::update_subscription,
        handlers::superadmin::create_admin,
        handlers::superadmin::task_status,
        handlers::admin::dashboard,
        handlers::admin::subscription,
        handlers::admin::create_teacher,
        handlers::admin::create_student,
        handlers::admin::list_classrooms,
        handlers::admin::create_classroom,
        handlers::admin::list_events,
        handlers::admin::create_event,
        handlers::admin::regenerate_qr_code,
        handlers::admin::attendance,
        handlers::teacher::dashboard,
        handlers::teacher::record_attendance,
        handlers::teacher::check_in,
        handlers::student::dashboard,
        handlers::student::attendance,
    ),
    components(
        schemas(
            UserRole,
            SubscriptionPlan,
            AttendanceStatus,
            EventType,
            TaskState,
            ApiError,
            UserResponse,
            LoginRequest,
            AuthResponse,
            LoginPageResponse,
            RegisterSchoolRequest,
            CreateAdminRequest,
            CreateTeacherRequest,
            CreateStudentRequest,
            AccountCreatedResponse,
            SchoolResponse,
            BrandingResponse,
            SubscriptionResponse,
            CreateSchoolRequest,
            CreateSubscriptionRequest,
            UpdateSubscriptionRequest,
            SchoolDetailResponse,
            SuperadminDashboardResponse,
            ClassroomResponse,
            CreateClassroomRequest,
            TeacherResponse,
            StudentResponse,
            EventResponse,
            CreateEventRequest,
            QrCodeResponse,
            RecordAttendanceRequest,
            AttendanceEntry,
            RecordAttendanceResponse,
            AttendanceRecordResponse,
            AttendanceSummary,
            CheckInRequest,
            CheckInAction,
            CheckInResponse,
            TeacherAttendanceResponse,
            StudentAttendanceResponse,
            AdminDashboardResponse,
            TeacherDashboardResponse,
            StudentDashboardResponse,
            TaskStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "site", description = "Landing, health and crawler files"),
        (name = "auth", description = "Login, tokens and public registration"),
        (name = "superadmin", description = "Tenant management"),
        (name = "admin", description = "School administration"),
        (name = "teacher", description = "Attendance taking and check-in"),
        (name = "student", description = "Own attendance")
    ),
    info(
        title = "HubSensi API",
        version = "1.0.0",
        description = "Multi-tenant school attendance backend"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_role_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/auth/login",
            "/api/v1/superadmin/tasks/{task_id}",
            "/api/v1/admin/attendance",
            "/api/v1/teacher/check-in",
            "/api/v1/student/attendance",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
