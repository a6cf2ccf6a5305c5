use crate::config::AppConfig;
use crate::database::DbPool;
use crate::entities::{
    SubscriptionPlan, UserRole, school_entity as schools, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::account_service::{NewUser, insert_user};
use crate::services::school_service::{insert_school, normalize_school_code};
use crate::services::subscription_service::new_subscription;
use crate::utils::*;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt_service: JwtService,
    allow_public_registration: bool,
    trial_days: i64,
}

impl AuthService {
    pub fn new(pool: DbPool, jwt_service: JwtService, app: &AppConfig) -> Self {
        Self {
            pool,
            jwt_service,
            allow_public_registration: app.allow_public_registration,
            trial_days: app.trial_days,
        }
    }

    pub fn registration_open(&self) -> bool {
        self.allow_public_registration
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthResponse> {
        let login = request.login.trim();
        if login.is_empty() || request.password.is_empty() {
            return Err(AppError::ValidationError(
                "Username and password are required".to_string(),
            ));
        }

        let user = users::Entity::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(login))
                    .add(users::Column::Email.eq(normalize_email(login))),
            )
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            log::warn!("Failed login for user {}", user.id);
            return Err(AppError::AuthError(
                "Invalid username or password".to_string(),
            ));
        }
        if !user.is_active {
            return Err(AppError::AuthError("Account is disabled".to_string()));
        }

        let mut am = user.into_active_model();
        am.last_login = Set(Some(Utc::now()));
        let user = am.update(&*self.pool).await?;
        log::info!("User {} ({}) logged in", user.id, user.role);

        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;

        let user = self.find_active_user(user_id).await?;
        self.issue_tokens(user)
    }

    pub async fn me(&self, user_id: i64) -> AppResult<UserResponse> {
        Ok(self.find_active_user(user_id).await?.into())
    }

    /// Public sign-up: school, basic trial subscription and first admin in
    /// one transaction.
    pub async fn register(&self, request: RegisterSchoolRequest) -> AppResult<AuthResponse> {
        if !self.allow_public_registration {
            return Err(AppError::NotFound("Not found".to_string()));
        }
        if request.school_name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "school_name is required".to_string(),
            ));
        }
        validate_password(&request.admin_password)?;

        let code = normalize_school_code(&request.school_code)?;
        let today = clock::today();

        let txn = self.pool.begin().await?;
        let school = insert_school(
            &txn,
            schools::ActiveModel {
                name: Set(request.school_name.trim().to_string()),
                code: Set(code),
                address: Set(request.address),
                phone: Set(request.phone),
                email: Set(Some(normalize_email(&request.admin_email))),
                is_active: Set(true),
                ..Default::default()
            },
        )
        .await?;

        new_subscription(
            school.id,
            CreateSubscriptionRequest {
                plan: Some(SubscriptionPlan::Basic),
                start_date: Some(today),
                end_date: today + Duration::days(self.trial_days.max(0)),
                max_teachers: None,
                max_students: None,
                features: None,
            },
        )?
        .insert(&txn)
        .await?;

        let user = insert_user(
            &txn,
            NewUser {
                school_id: Some(school.id),
                role: UserRole::Admin,
                email: &request.admin_email,
                username: request.admin_username.as_deref(),
                password: &request.admin_password,
            },
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "School {} registered with a {}-day trial, admin {}",
            school.id,
            self.trial_days,
            user.id
        );
        self.issue_tokens(user)
    }

    async fn find_active_user(&self, user_id: i64) -> AppResult<users::Model> {
        let user = users::Entity::find_by_id(user_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;
        if !user.is_active {
            return Err(AppError::AuthError("Account is disabled".to_string()));
        }
        Ok(user)
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token =
            self.jwt_service
                .generate_access_token(user.id, user.role, user.school_id)?;
        let refresh_token =
            self.jwt_service
                .generate_refresh_token(user.id, user.role, user.school_id)?;

        Ok(AuthResponse {
            redirect_to: user.role.dashboard_path().to_string(),
            user: user.into(),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}
