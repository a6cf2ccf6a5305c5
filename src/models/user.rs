use crate::entities::{UserRole, user_entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub school_id: Option<i64>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<user_entity::Model> for UserResponse {
    fn from(user: user_entity::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            school_id: user.school_id,
            is_active: user.is_active,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email address.
    #[schema(example = "budi123")]
    pub login: String,
    #[schema(example = "Rahasia123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Dashboard of the user's role.
    pub redirect_to: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginPageQuery {
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginPageResponse {
    pub login_url: String,
    pub notice: Option<String>,
    pub message: Option<String>,
}

/// Public sign-up: a new school with its first administrator.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterSchoolRequest {
    #[schema(example = "SMA Negeri 1 Bandung")]
    pub school_name: String,
    #[schema(example = "SMAN1BDG")]
    pub school_code: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "admin@sman1bdg.sch.id")]
    pub admin_email: String,
    pub admin_username: Option<String>,
    #[schema(example = "Rahasia123")]
    pub admin_password: String,
}

/// Account created by an administrator. The password is generated and
/// delivered by email.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateAdminRequest {
    #[schema(example = "tu@sman1bdg.sch.id")]
    pub email: String,
    #[schema(example = "Siti Aminah")]
    pub full_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTeacherRequest {
    pub email: String,
    pub full_name: String,
    pub username: Option<String>,
    pub nip: Option<String>,
    #[serde(default)]
    pub is_homeroom: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateStudentRequest {
    pub email: String,
    pub full_name: String,
    pub username: Option<String>,
    #[schema(example = "232410001")]
    pub nis: String,
    pub nisn: Option<String>,
    pub classroom_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountCreatedResponse {
    pub user: UserResponse,
    /// Teacher or student profile id.
    pub profile_id: Option<i64>,
    /// Id of the queued credential email, absent when queueing failed.
    pub email_task_id: Option<String>,
}
