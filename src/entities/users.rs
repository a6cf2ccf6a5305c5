use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema, DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[sea_orm(string_value = "SUPERADMIN")]
    Superadmin,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "TEACHER")]
    Teacher,
    #[sea_orm(string_value = "STUDENT")]
    Student,
}

impl UserRole {
    /// Landing page of each role, used by the `/` redirect.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            UserRole::Superadmin => "/api/v1/superadmin/dashboard",
            UserRole::Admin => "/api/v1/admin/dashboard",
            UserRole::Teacher => "/api/v1/teacher/dashboard",
            UserRole::Student => "/api/v1/student/dashboard",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Superadmin => write!(f, "SUPERADMIN"),
            UserRole::Admin => write!(f, "ADMIN"),
            UserRole::Teacher => write!(f, "TEACHER"),
            UserRole::Student => write!(f, "STUDENT"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUPERADMIN" => Ok(UserRole::Superadmin),
            "ADMIN" => Ok(UserRole::Admin),
            "TEACHER" => Ok(UserRole::Teacher),
            "STUDENT" => Ok(UserRole::Student),
            other => Err(format!("unknown role {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// None only for superadmins.
    pub school_id: Option<i64>,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_display() {
        for role in [
            UserRole::Superadmin,
            UserRole::Admin,
            UserRole::Teacher,
            UserRole::Student,
        ] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert!("PRINCIPAL".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_dashboard_paths() {
        assert_eq!(UserRole::Admin.dashboard_path(), "/api/v1/admin/dashboard");
        assert_eq!(
            UserRole::Student.dashboard_path(),
            "/api/v1/student/dashboard"
        );
    }
}
