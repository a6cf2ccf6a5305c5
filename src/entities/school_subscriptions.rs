use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::utils::clock;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "subscription_plan")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[sea_orm(string_value = "basic")]
    Basic,
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "premium")]
    Premium,
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionPlan::Basic => write!(f, "basic"),
            SubscriptionPlan::Standard => write!(f, "standard"),
            SubscriptionPlan::Premium => write!(f, "premium"),
        }
    }
}

pub const DEFAULT_MAX_TEACHERS: i32 = 5;
pub const DEFAULT_MAX_STUDENTS: i32 = 100;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "school_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub school_id: i64,
    pub plan: SubscriptionPlan,
    pub is_active: bool,
    pub start_date: NaiveDate,
    /// Last day of access, inclusive.
    pub end_date: NaiveDate,
    pub max_teachers: i32,
    pub max_students: i32,
    pub features: Json,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Active and not past `end_date` on the school's current calendar day.
    pub fn is_valid(&self) -> bool {
        self.is_valid_on(clock::today())
    }

    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        self.is_active && today <= self.end_date
    }

    pub fn days_remaining(&self) -> i64 {
        self.days_remaining_on(clock::today())
    }

    pub fn days_remaining_on(&self, today: NaiveDate) -> i64 {
        if !self.is_valid_on(today) {
            return 0;
        }
        (self.end_date - today).num_days()
    }

    pub fn feature_enabled(&self, name: &str) -> bool {
        match self.features.get(name) {
            Some(Json::Bool(b)) => *b,
            Some(Json::Null) | None => false,
            Some(_) => true,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subscription(is_active: bool, end_date: NaiveDate) -> Model {
        Model {
            id: 1,
            school_id: 1,
            plan: SubscriptionPlan::Basic,
            is_active,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date,
            max_teachers: DEFAULT_MAX_TEACHERS,
            max_students: DEFAULT_MAX_STUDENTS,
            features: json!({}),
            created_at: None,
            updated_at: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_valid_until_end_date_inclusive() {
        let sub = subscription(true, date(2026, 6, 30));
        assert!(sub.is_valid_on(date(2026, 6, 1)));
        assert!(sub.is_valid_on(date(2026, 6, 30)));
        assert!(!sub.is_valid_on(date(2026, 7, 1)));
    }

    #[test]
    fn test_inactive_is_never_valid() {
        let sub = subscription(false, date(2030, 1, 1));
        assert!(!sub.is_valid_on(date(2026, 6, 1)));
        assert_eq!(sub.days_remaining_on(date(2026, 6, 1)), 0);
    }

    #[test]
    fn test_days_remaining() {
        let sub = subscription(true, date(2026, 6, 30));
        assert_eq!(sub.days_remaining_on(date(2026, 6, 20)), 10);
        assert_eq!(sub.days_remaining_on(date(2026, 6, 30)), 0);
        // expired: clamped to zero rather than negative
        assert_eq!(sub.days_remaining_on(date(2026, 8, 1)), 0);
    }

    #[test]
    fn test_days_remaining_never_negative() {
        let sub = subscription(true, date(2026, 3, 15));
        let mut day = date(2026, 3, 1);
        while day <= date(2026, 4, 15) {
            let remaining = sub.days_remaining_on(day);
            assert!(remaining >= 0);
            if !sub.is_valid_on(day) {
                assert_eq!(remaining, 0);
            }
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_feature_flags() {
        let mut sub = subscription(true, date(2026, 6, 30));
        sub.features = json!({"teacher_qr": true, "export": false, "sms_quota": 100});
        assert!(sub.feature_enabled("teacher_qr"));
        assert!(!sub.feature_enabled("export"));
        assert!(sub.feature_enabled("sms_quota"));
        assert!(!sub.feature_enabled("unknown"));
    }
}
