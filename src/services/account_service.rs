use crate::database::DbPool;
use crate::entities::{
    UserRole, classroom_entity as classrooms, school_entity as schools,
    student_entity as students, teacher_entity as teachers, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::subscription_service::{Seat, check_seat_limit, subscription_of};
use crate::tasks::{SendLoginEmail, TaskClient};
use crate::utils::*;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};

pub(crate) struct NewUser<'a> {
    pub school_id: Option<i64>,
    pub role: UserRole,
    pub email: &'a str,
    pub username: Option<&'a str>,
    pub password: &'a str,
}

fn validate_username(username: &str) -> AppResult<()> {
    let ok_len = (3..=50).contains(&username.len());
    let ok_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
    if !ok_len || !ok_chars {
        return Err(AppError::ValidationError(
            "Username must be 3-50 characters of letters, digits, '.' or '_'".to_string(),
        ));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{field} is required")));
    }
    Ok(())
}

/// Inserts a user row after checking email and username uniqueness.
pub(crate) async fn insert_user<C: ConnectionTrait>(
    db: &C,
    new: NewUser<'_>,
) -> AppResult<users::Model> {
    let email = normalize_email(new.email);
    validate_email(&email)?;

    let taken = users::Entity::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .count(db)
        .await?;
    if taken > 0 {
        return Err(AppError::ValidationError(
            "Email is already registered".to_string(),
        ));
    }

    let username = match new.username.map(str::trim).filter(|u| !u.is_empty()) {
        Some(u) => {
            validate_username(u)?;
            let taken = users::Entity::find()
                .filter(users::Column::Username.eq(u))
                .count(db)
                .await?;
            if taken > 0 {
                return Err(AppError::ValidationError(
                    "Username is already taken".to_string(),
                ));
            }
            u.to_string()
        }
        None => generate_unique_username(db, &email).await?,
    };

    let user = users::ActiveModel {
        school_id: Set(new.school_id),
        username: Set(username),
        email: Set(email),
        password_hash: Set(hash_password(new.password)?),
        role: Set(new.role),
        is_active: Set(true),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(user)
}

/// Row lock on the school, held until `txn` ends. Seat counts taken after
/// it cannot race another creation for the same school.
async fn lock_school<C: ConnectionTrait>(txn: &C, school_id: i64) -> AppResult<()> {
    schools::Entity::find_by_id(school_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;
    Ok(())
}

/// Creates accounts on behalf of administrators and queues their
/// credential emails.
#[derive(Clone)]
pub struct AccountService {
    pool: DbPool,
    tasks: TaskClient,
    login_url: String,
}

impl AccountService {
    pub fn new(pool: DbPool, tasks: TaskClient, login_url: String) -> Self {
        Self {
            pool,
            tasks,
            login_url,
        }
    }

    pub async fn create_school_admin(
        &self,
        school_id: i64,
        req: CreateAdminRequest,
    ) -> AppResult<AccountCreatedResponse> {
        require_text("full_name", &req.full_name)?;
        schools::Entity::find_by_id(school_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

        let password = generate_password();
        let user = insert_user(
            &*self.pool,
            NewUser {
                school_id: Some(school_id),
                role: UserRole::Admin,
                email: &req.email,
                username: req.username.as_deref(),
                password: &password,
            },
        )
        .await?;
        log::info!("Admin account {} created for school {school_id}", user.id);

        let email_task_id = self
            .queue_credentials(&user, &req.full_name, password)
            .await;
        Ok(AccountCreatedResponse {
            user: user.into(),
            profile_id: None,
            email_task_id,
        })
    }

    pub async fn create_teacher(
        &self,
        school_id: i64,
        req: CreateTeacherRequest,
    ) -> AppResult<AccountCreatedResponse> {
        require_text("full_name", &req.full_name)?;

        let txn = self.pool.begin().await?;
        lock_school(&txn, school_id).await?;
        let sub = subscription_of(&txn, school_id).await?;
        let seats = teachers::Entity::find()
            .filter(teachers::Column::SchoolId.eq(school_id))
            .count(&txn)
            .await?;
        check_seat_limit(sub.as_ref(), Seat::Teacher, seats)?;

        let password = generate_password();
        let user = insert_user(
            &txn,
            NewUser {
                school_id: Some(school_id),
                role: UserRole::Teacher,
                email: &req.email,
                username: req.username.as_deref(),
                password: &password,
            },
        )
        .await?;
        let teacher = teachers::ActiveModel {
            school_id: Set(school_id),
            user_id: Set(user.id),
            nip: Set(req.nip.filter(|n| !n.trim().is_empty())),
            full_name: Set(req.full_name.trim().to_string()),
            is_homeroom: Set(req.is_homeroom),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        log::info!("Teacher {} created for school {school_id}", teacher.id);

        let email_task_id = self
            .queue_credentials(&user, &teacher.full_name, password)
            .await;
        Ok(AccountCreatedResponse {
            user: user.into(),
            profile_id: Some(teacher.id),
            email_task_id,
        })
    }

    pub async fn create_student(
        &self,
        school_id: i64,
        req: CreateStudentRequest,
    ) -> AppResult<AccountCreatedResponse> {
        require_text("full_name", &req.full_name)?;
        require_text("nis", &req.nis)?;

        let txn = self.pool.begin().await?;
        lock_school(&txn, school_id).await?;
        let sub = subscription_of(&txn, school_id).await?;
        let seats = students::Entity::find()
            .filter(students::Column::SchoolId.eq(school_id))
            .count(&txn)
            .await?;
        check_seat_limit(sub.as_ref(), Seat::Student, seats)?;

        if let Some(classroom_id) = req.classroom_id {
            let classroom = classrooms::Entity::find_by_id(classroom_id).one(&txn).await?;
            if classroom.is_none_or(|c| c.school_id != school_id) {
                return Err(AppError::ValidationError(
                    "Classroom does not belong to this school".to_string(),
                ));
            }
        }

        let password = generate_password();
        let user = insert_user(
            &txn,
            NewUser {
                school_id: Some(school_id),
                role: UserRole::Student,
                email: &req.email,
                username: req.username.as_deref(),
                password: &password,
            },
        )
        .await?;
        let student = students::ActiveModel {
            school_id: Set(school_id),
            user_id: Set(user.id),
            nis: Set(req.nis.trim().to_string()),
            nisn: Set(req.nisn.filter(|n| !n.trim().is_empty())),
            full_name: Set(req.full_name.trim().to_string()),
            classroom_id: Set(req.classroom_id),
            qr_code: Set(Some(generate_qr_token("STU"))),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;
        log::info!("Student {} created for school {school_id}", student.id);

        let email_task_id = self
            .queue_credentials(&user, &student.full_name, password)
            .await;
        Ok(AccountCreatedResponse {
            user: user.into(),
            profile_id: Some(student.id),
            email_task_id,
        })
    }

    /// The account already exists at this point, so a broker failure is
    /// logged and reported as a missing task id.
    async fn queue_credentials(
        &self,
        user: &users::Model,
        name: &str,
        password: String,
    ) -> Option<String> {
        let payload = SendLoginEmail {
            to_email: user.email.clone(),
            name: name.trim().to_string(),
            username: user.username.clone(),
            password,
            login_link: Some(self.login_url.clone()),
        };
        match self.tasks.send_login_email(&payload).await {
            Ok(task_id) => Some(task_id),
            Err(e) => {
                log::error!("Failed to queue login email for user {}: {e}", user.id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SubscriptionPlan, school_entity, subscription_entity};
    use crate::tasks::queue::memory::MemoryTaskStore;
    use chrono::NaiveDate;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("budi.santoso_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("budi santoso").is_err());
        assert!(validate_username("guru@sekolah").is_err());
    }

    #[tokio::test]
    async fn test_teacher_limit_blocks_creation_and_email() {
        let sub = subscription_entity::Model {
            id: 1,
            school_id: 4,
            plan: SubscriptionPlan::Basic,
            is_active: true,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2999, 1, 1).unwrap(),
            max_teachers: 1,
            max_students: 100,
            features: serde_json::json!({}),
            created_at: None,
            updated_at: None,
        };
        let school = school_entity::Model {
            id: 4,
            name: "SMAN 4".into(),
            code: "SMAN-4".into(),
            address: None,
            phone: None,
            email: None,
            website: None,
            is_active: true,
            brand_name: None,
            primary_color: None,
            secondary_color: None,
            logo_url: None,
            created_at: None,
            updated_at: None,
        };
        let count_row = BTreeMap::from([("num_items", Value::BigInt(Some(1)))]);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![school]])
                .append_query_results([vec![sub]])
                .append_query_results([vec![count_row]])
                .into_connection(),
        );

        let store = Arc::new(MemoryTaskStore::default());
        let service = AccountService::new(
            db.clone(),
            TaskClient::new(store.clone()),
            "https://absen.test/api/v1/auth/login".into(),
        );

        let result = service
            .create_teacher(
                4,
                CreateTeacherRequest {
                    email: "guru@sekolah.sch.id".into(),
                    full_name: "Budi".into(),
                    username: None,
                    nip: None,
                    is_homeroom: false,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(store.jobs.lock().unwrap().is_empty());

        // the school row is locked before seats are counted
        drop(service);
        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let statements = format!("{log:?}");
        let lock = statements.find("FOR UPDATE").unwrap();
        let count = statements.find("COUNT(*)").unwrap();
        assert!(lock < count);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected_before_any_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = AccountService::new(
            Arc::new(db),
            TaskClient::new(Arc::new(MemoryTaskStore::default())),
            String::new(),
        );
        let result = service
            .create_student(
                1,
                CreateStudentRequest {
                    email: "s@sekolah.sch.id".into(),
                    full_name: "  ".into(),
                    username: None,
                    nis: "1".into(),
                    nisn: None,
                    classroom_id: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
