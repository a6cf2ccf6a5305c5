use crate::entities::{
    SubscriptionPlan,
    school_entity::{self, DEFAULT_PRIMARY_COLOR, DEFAULT_SECONDARY_COLOR},
    subscription_entity,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchoolResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<school_entity::Model> for SchoolResponse {
    fn from(school: school_entity::Model) -> Self {
        Self {
            id: school.id,
            name: school.name,
            code: school.code,
            address: school.address,
            phone: school.phone,
            email: school.email,
            website: school.website,
            is_active: school.is_active,
            created_at: school.created_at,
        }
    }
}

/// Look of the tenant's pages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct BrandingResponse {
    pub brand_name: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub logo_url: Option<String>,
}

impl From<&school_entity::Model> for BrandingResponse {
    fn from(school: &school_entity::Model) -> Self {
        fn non_empty(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }
        Self {
            brand_name: non_empty(&school.brand_name).unwrap_or_else(|| school.name.clone()),
            primary_color: non_empty(&school.primary_color)
                .unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
            secondary_color: non_empty(&school.secondary_color)
                .unwrap_or_else(|| DEFAULT_SECONDARY_COLOR.to_string()),
            logo_url: non_empty(&school.logo_url),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub school_id: i64,
    pub plan: SubscriptionPlan,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_valid: bool,
    pub days_remaining: i64,
    pub max_teachers: i32,
    pub max_students: i32,
    #[schema(value_type = Object)]
    pub features: serde_json::Value,
}

impl SubscriptionResponse {
    pub fn from_model(sub: subscription_entity::Model, today: NaiveDate) -> Self {
        Self {
            school_id: sub.school_id,
            plan: sub.plan,
            is_active: sub.is_active,
            start_date: sub.start_date,
            end_date: sub.end_date,
            is_valid: sub.is_valid_on(today),
            days_remaining: sub.days_remaining_on(today),
            max_teachers: sub.max_teachers,
            max_students: sub.max_students,
            features: sub.features,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSchoolRequest {
    #[schema(example = "SMP Harapan Bangsa")]
    pub name: String,
    #[schema(example = "SMPHB01")]
    pub code: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub brand_name: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    pub logo_url: Option<String>,
    pub subscription: CreateSubscriptionRequest,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    pub plan: Option<SubscriptionPlan>,
    /// Defaults to today.
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub max_teachers: Option<i32>,
    pub max_students: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub features: Option<serde_json::Value>,
}

/// Partial update; omitted fields keep their value.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    pub plan: Option<SubscriptionPlan>,
    pub is_active: Option<bool>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub max_teachers: Option<i32>,
    pub max_students: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub features: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchoolDetailResponse {
    pub school: SchoolResponse,
    pub branding: BrandingResponse,
    pub subscription: Option<SubscriptionResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuperadminDashboardResponse {
    pub total_schools: u64,
    pub active_schools: u64,
    pub valid_subscriptions: u64,
    pub expired_subscriptions: u64,
    pub total_admins: u64,
    pub total_teachers: u64,
    pub total_students: u64,
    pub recent_schools: Vec<SchoolDetailResponse>,
}
