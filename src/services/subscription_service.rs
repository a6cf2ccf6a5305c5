use crate::database::DbPool;
use crate::entities::{
    SubscriptionPlan, school_entity as schools,
    subscription_entity::{self as subscriptions, DEFAULT_MAX_STUDENTS, DEFAULT_MAX_TEACHERS},
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::clock;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, Set,
};

/// Source of a school's subscription for the request gate.
#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn find_by_school(&self, school_id: i64) -> AppResult<Option<subscriptions::Model>>;
}

/// Seats limited by the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seat {
    Teacher,
    Student,
}

impl Seat {
    fn limit(&self, sub: Option<&subscriptions::Model>) -> i32 {
        match (self, sub) {
            (Seat::Teacher, Some(s)) => s.max_teachers,
            (Seat::Student, Some(s)) => s.max_students,
            (Seat::Teacher, None) => DEFAULT_MAX_TEACHERS,
            (Seat::Student, None) => DEFAULT_MAX_STUDENTS,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Seat::Teacher => "teacher",
            Seat::Student => "student",
        }
    }
}

/// Fails when adding one more seat would exceed the plan.
pub fn check_seat_limit(
    sub: Option<&subscriptions::Model>,
    seat: Seat,
    current: u64,
) -> AppResult<()> {
    let limit = seat.limit(sub);
    if current >= u64::try_from(limit.max(0)).unwrap_or(0) {
        let plan = sub.map(|s| s.plan).unwrap_or(SubscriptionPlan::Basic);
        return Err(AppError::ValidationError(format!(
            "The {plan} plan allows at most {limit} {} accounts",
            seat.label()
        )));
    }
    Ok(())
}

pub(crate) async fn subscription_of<C: ConnectionTrait>(
    db: &C,
    school_id: i64,
) -> AppResult<Option<subscriptions::Model>> {
    Ok(subscriptions::Entity::find()
        .filter(subscriptions::Column::SchoolId.eq(school_id))
        .one(db)
        .await?)
}

fn validate_window(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if end < start {
        return Err(AppError::ValidationError(
            "Subscription end_date must not be before start_date".to_string(),
        ));
    }
    Ok(())
}

fn validate_limits(max_teachers: i32, max_students: i32) -> AppResult<()> {
    if max_teachers < 1 || max_students < 1 {
        return Err(AppError::ValidationError(
            "Plan limits must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_features(features: &serde_json::Value) -> AppResult<()> {
    if !features.is_object() {
        return Err(AppError::ValidationError(
            "Subscription features must be a JSON object".to_string(),
        ));
    }
    Ok(())
}

/// New subscription row, validated.
pub(crate) fn new_subscription(
    school_id: i64,
    req: CreateSubscriptionRequest,
) -> AppResult<subscriptions::ActiveModel> {
    let start_date = req.start_date.unwrap_or_else(clock::today);
    let max_teachers = req.max_teachers.unwrap_or(DEFAULT_MAX_TEACHERS);
    let max_students = req.max_students.unwrap_or(DEFAULT_MAX_STUDENTS);
    let features = req.features.unwrap_or_else(|| serde_json::json!({}));

    validate_window(start_date, req.end_date)?;
    validate_limits(max_teachers, max_students)?;
    validate_features(&features)?;

    Ok(subscriptions::ActiveModel {
        school_id: Set(school_id),
        plan: Set(req.plan.unwrap_or(SubscriptionPlan::Basic)),
        is_active: Set(true),
        start_date: Set(start_date),
        end_date: Set(req.end_date),
        max_teachers: Set(max_teachers),
        max_students: Set(max_students),
        features: Set(features),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    })
}

#[derive(Clone)]
pub struct SubscriptionService {
    pool: DbPool,
}

impl SubscriptionService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_for_school(&self, school_id: i64) -> AppResult<SubscriptionResponse> {
        let sub = subscription_of(&*self.pool, school_id)
            .await?
            .ok_or_else(|| AppError::NotFound("School has no subscription".to_string()))?;
        Ok(SubscriptionResponse::from_model(sub, clock::today()))
    }

    /// Partial update, or creation when the school has none yet.
    pub async fn update(
        &self,
        school_id: i64,
        req: UpdateSubscriptionRequest,
    ) -> AppResult<SubscriptionResponse> {
        schools::Entity::find_by_id(school_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        let Some(current) = subscription_of(&*self.pool, school_id).await? else {
            let end_date = req.end_date.ok_or_else(|| {
                AppError::ValidationError(
                    "end_date is required to create a subscription".to_string(),
                )
            })?;
            let mut model = new_subscription(
                school_id,
                CreateSubscriptionRequest {
                    plan: req.plan,
                    start_date: req.start_date,
                    end_date,
                    max_teachers: req.max_teachers,
                    max_students: req.max_students,
                    features: req.features,
                },
            )?;
            if let Some(active) = req.is_active {
                model.is_active = Set(active);
            }
            let created = model.insert(&*self.pool).await?;
            log::info!("Subscription created for school {school_id}");
            return Ok(SubscriptionResponse::from_model(created, clock::today()));
        };

        let start_date = req.start_date.unwrap_or(current.start_date);
        let end_date = req.end_date.unwrap_or(current.end_date);
        let max_teachers = req.max_teachers.unwrap_or(current.max_teachers);
        let max_students = req.max_students.unwrap_or(current.max_students);
        validate_window(start_date, end_date)?;
        validate_limits(max_teachers, max_students)?;
        if let Some(features) = &req.features {
            validate_features(features)?;
        }

        let mut model = current.into_active_model();
        if let Some(plan) = req.plan {
            model.plan = Set(plan);
        }
        if let Some(active) = req.is_active {
            model.is_active = Set(active);
        }
        if let Some(features) = req.features {
            model.features = Set(features);
        }
        model.start_date = Set(start_date);
        model.end_date = Set(end_date);
        model.max_teachers = Set(max_teachers);
        model.max_students = Set(max_students);
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&*self.pool).await?;
        log::info!(
            "Subscription of school {school_id} updated: plan {}, active {}, ends {}",
            updated.plan,
            updated.is_active,
            updated.end_date
        );
        Ok(SubscriptionResponse::from_model(updated, clock::today()))
    }
}

#[async_trait]
impl SubscriptionLookup for SubscriptionService {
    async fn find_by_school(&self, school_id: i64) -> AppResult<Option<subscriptions::Model>> {
        subscription_of(&*self.pool, school_id).await
    }
}
