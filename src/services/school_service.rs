use crate::database::DbPool;
use crate::entities::{
    UserRole, school_entity as schools, student_entity as students,
    subscription_entity as subscriptions, teacher_entity as teachers, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::subscription_service::new_subscription;
use crate::utils::clock;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

const RECENT_SCHOOLS: u64 = 5;

/// Upper-cased school code of 3 to 20 letters, digits or dashes.
pub(crate) fn normalize_school_code(code: &str) -> AppResult<String> {
    let code = code.trim().to_ascii_uppercase();
    let valid = (3..=20).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(AppError::ValidationError(
            "School code must be 3-20 letters, digits or '-'".to_string(),
        ));
    }
    Ok(code)
}

fn validate_color(field: &str, value: &Option<String>) -> AppResult<()> {
    if let Some(color) = value {
        let hex = color.strip_prefix('#').unwrap_or_default();
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::ValidationError(format!(
                "{field} must look like #1a2b3c"
            )));
        }
    }
    Ok(())
}

pub(crate) async fn insert_school<C: ConnectionTrait>(
    db: &C,
    mut school: schools::ActiveModel,
) -> AppResult<schools::Model> {
    let code = match &school.code {
        ActiveValue::Set(code) | ActiveValue::Unchanged(code) => code.clone(),
        ActiveValue::NotSet => {
            return Err(AppError::ValidationError("School code is required".to_string()));
        }
    };
    let taken = schools::Entity::find()
        .filter(schools::Column::Code.eq(code.as_str()))
        .count(db)
        .await?;
    if taken > 0 {
        return Err(AppError::ValidationError(format!(
            "School code {code} is already used"
        )));
    }
    school.created_at = Set(Some(Utc::now()));
    school.updated_at = Set(Some(Utc::now()));
    Ok(school.insert(db).await?)
}

fn detail(school: schools::Model, sub: Option<subscriptions::Model>) -> SchoolDetailResponse {
    let today = clock::today();
    SchoolDetailResponse {
        branding: BrandingResponse::from(&school),
        school: school.into(),
        subscription: sub.map(|s| SubscriptionResponse::from_model(s, today)),
    }
}

/// Tenant management for superadmins.
#[derive(Clone)]
pub struct SchoolService {
    pool: DbPool,
}

impl SchoolService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_school(&self, req: CreateSchoolRequest) -> AppResult<SchoolDetailResponse> {
        if req.name.trim().is_empty() {
            return Err(AppError::ValidationError("name is required".to_string()));
        }
        let code = normalize_school_code(&req.code)?;
        validate_color("primary_color", &req.primary_color)?;
        validate_color("secondary_color", &req.secondary_color)?;

        let txn = self.pool.begin().await?;
        let school = insert_school(
            &txn,
            schools::ActiveModel {
                name: Set(req.name.trim().to_string()),
                code: Set(code),
                address: Set(req.address),
                phone: Set(req.phone),
                email: Set(req.email),
                website: Set(req.website),
                is_active: Set(true),
                brand_name: Set(req.brand_name),
                primary_color: Set(req.primary_color),
                secondary_color: Set(req.secondary_color),
                logo_url: Set(req.logo_url),
                ..Default::default()
            },
        )
        .await?;
        let sub = new_subscription(school.id, req.subscription)?
            .insert(&txn)
            .await?;
        txn.commit().await?;

        log::info!(
            "School {} ({}) created with {} plan until {}",
            school.id,
            school.code,
            sub.plan,
            sub.end_date
        );
        Ok(detail(school, Some(sub)))
    }

    pub async fn list_schools(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<SchoolDetailResponse>> {
        let paginator = schools::Entity::find()
            .order_by_asc(schools::Column::Name)
            .paginate(&*self.pool, params.page_size());
        let total = paginator.num_items().await?;
        let page = paginator.fetch_page(params.page_index()).await?;

        let ids: Vec<i64> = page.iter().map(|s| s.id).collect();
        let mut subs: HashMap<i64, subscriptions::Model> = subscriptions::Entity::find()
            .filter(subscriptions::Column::SchoolId.is_in(ids))
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|s| (s.school_id, s))
            .collect();

        let data = page
            .into_iter()
            .map(|school| {
                let sub = subs.remove(&school.id);
                detail(school, sub)
            })
            .collect();
        Ok(PaginatedResponse::new(data, params, total))
    }

    pub async fn dashboard(&self) -> AppResult<SuperadminDashboardResponse> {
        let total_schools = schools::Entity::find().count(&*self.pool).await?;
        let active_schools = schools::Entity::find()
            .filter(schools::Column::IsActive.eq(true))
            .count(&*self.pool)
            .await?;

        let today = clock::today();
        let all_subs = subscriptions::Entity::find().all(&*self.pool).await?;
        let valid_subscriptions = all_subs.iter().filter(|s| s.is_valid_on(today)).count() as u64;
        let expired_subscriptions = all_subs.len() as u64 - valid_subscriptions;

        let total_admins = users::Entity::find()
            .filter(users::Column::Role.eq(UserRole::Admin))
            .count(&*self.pool)
            .await?;
        let total_teachers = teachers::Entity::find().count(&*self.pool).await?;
        let total_students = students::Entity::find().count(&*self.pool).await?;

        let recent = schools::Entity::find()
            .order_by_desc(schools::Column::CreatedAt)
            .limit(RECENT_SCHOOLS)
            .all(&*self.pool)
            .await?;
        let mut subs: HashMap<i64, subscriptions::Model> =
            all_subs.into_iter().map(|s| (s.school_id, s)).collect();
        let recent_schools = recent
            .into_iter()
            .map(|school| {
                let sub = subs.remove(&school.id);
                detail(school, sub)
            })
            .collect();

        Ok(SuperadminDashboardResponse {
            total_schools,
            active_schools,
            valid_subscriptions,
            expired_subscriptions,
            total_admins,
            total_teachers,
            total_students,
            recent_schools,
        })
    }
}
