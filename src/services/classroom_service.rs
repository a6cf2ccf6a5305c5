use crate::database::DbPool;
use crate::entities::{
    EventType, classroom_entity as classrooms, school_event_entity as events,
    school_qr_code_entity as qr_codes, teacher_entity as teachers,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::generate_qr_token;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};

const UPCOMING_EVENTS: u64 = 5;

fn holiday_flag(is_holiday: Option<bool>, event_type: EventType) -> bool {
    is_holiday.unwrap_or(event_type == EventType::Libur)
}

pub(crate) async fn upcoming_events<C: ConnectionTrait>(
    db: &C,
    school_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Vec<EventResponse>> {
    Ok(events::Entity::find()
        .filter(events::Column::SchoolId.eq(school_id))
        .filter(events::Column::EndDate.gte(now))
        .order_by_asc(events::Column::StartDate)
        .limit(UPCOMING_EVENTS)
        .all(db)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Classrooms, calendar and the check-in QR code of one school.
#[derive(Clone)]
pub struct ClassroomService {
    pool: DbPool,
}

impl ClassroomService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_classrooms(&self, school_id: i64) -> AppResult<Vec<ClassroomResponse>> {
        Ok(classrooms::Entity::find()
            .filter(classrooms::Column::SchoolId.eq(school_id))
            .order_by_asc(classrooms::Column::Name)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn create_classroom(
        &self,
        school_id: i64,
        req: CreateClassroomRequest,
    ) -> AppResult<ClassroomResponse> {
        if req.name.trim().is_empty() {
            return Err(AppError::ValidationError("name is required".to_string()));
        }
        if let Some(teacher_id) = req.homeroom_teacher_id {
            let teacher = teachers::Entity::find_by_id(teacher_id)
                .one(&*self.pool)
                .await?;
            if teacher.is_none_or(|t| t.school_id != school_id) {
                return Err(AppError::ValidationError(
                    "Homeroom teacher does not belong to this school".to_string(),
                ));
            }
        }

        let classroom = classrooms::ActiveModel {
            school_id: Set(school_id),
            name: Set(req.name.trim().to_string()),
            grade_level: Set(req.grade_level),
            homeroom_teacher_id: Set(req.homeroom_teacher_id),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;
        Ok(classroom.into())
    }

    pub async fn list_events(&self, school_id: i64) -> AppResult<Vec<EventResponse>> {
        Ok(events::Entity::find()
            .filter(events::Column::SchoolId.eq(school_id))
            .order_by_desc(events::Column::StartDate)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn create_event(
        &self,
        school_id: i64,
        req: CreateEventRequest,
    ) -> AppResult<EventResponse> {
        if req.title.trim().is_empty() {
            return Err(AppError::ValidationError("title is required".to_string()));
        }
        if req.end_date < req.start_date {
            return Err(AppError::ValidationError(
                "end_date must not be before start_date".to_string(),
            ));
        }
        let is_holiday = holiday_flag(req.is_holiday, req.event_type);

        let event = events::ActiveModel {
            school_id: Set(school_id),
            title: Set(req.title.trim().to_string()),
            description: Set(req.description),
            start_date: Set(req.start_date),
            end_date: Set(req.end_date),
            event_type: Set(req.event_type),
            is_holiday: Set(is_holiday),
            created_at: Set(Some(Utc::now())),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;
        Ok(event.into())
    }

    /// Issues a fresh code; the previous one stops working.
    pub async fn regenerate_qr_code(&self, school_id: i64) -> AppResult<QrCodeResponse> {
        let token = generate_qr_token("SCH");
        let existing = qr_codes::Entity::find()
            .filter(qr_codes::Column::SchoolId.eq(school_id))
            .one(&*self.pool)
            .await?;

        let saved = match existing {
            Some(row) => {
                let mut am = row.into_active_model();
                am.qr_code = Set(Some(token));
                am.is_active = Set(true);
                am.updated_at = Set(Some(Utc::now()));
                am.update(&*self.pool).await?
            }
            None => {
                qr_codes::ActiveModel {
                    school_id: Set(school_id),
                    qr_code: Set(Some(token)),
                    is_active: Set(true),
                    created_at: Set(Some(Utc::now())),
                    updated_at: Set(Some(Utc::now())),
                    ..Default::default()
                }
                .insert(&*self.pool)
                .await?
            }
        };
        log::info!("Check-in QR code regenerated for school {school_id}");
        Ok(QrCodeResponse::from_model(saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_event_with_inverted_dates_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = ClassroomService::new(Arc::new(db));
        let now = Utc::now();
        let result = service
            .create_event(
                1,
                CreateEventRequest {
                    title: "Libur Semester".into(),
                    description: None,
                    start_date: now,
                    end_date: now - Duration::days(1),
                    event_type: EventType::Libur,
                    is_holiday: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_holiday_defaults_from_event_type() {
        assert!(holiday_flag(None, EventType::Libur));
        assert!(!holiday_flag(None, EventType::Ujian));
        assert!(!holiday_flag(Some(false), EventType::Libur));
        assert!(holiday_flag(Some(true), EventType::Acara));
    }
}
