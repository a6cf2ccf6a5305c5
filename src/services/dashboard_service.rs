use crate::database::DbPool;
use crate::entities::{
    attendance_entity as attendances, classroom_entity as classrooms, school_entity as schools,
    student_entity as students, teacher_attendance_entity as teacher_attendances,
    teacher_entity as teachers,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::attendance_service::{month_range, student_of, teacher_of};
use crate::services::classroom_service::upcoming_events;
use crate::services::subscription_service::subscription_of;
use crate::utils::clock;
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// Read-only landing payloads for each role.
#[derive(Clone)]
pub struct DashboardService {
    pool: DbPool,
}

impl DashboardService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn school(&self, school_id: i64) -> AppResult<schools::Model> {
        schools::Entity::find_by_id(school_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("School not found".to_string()))
    }

    async fn classroom(&self, id: Option<i64>) -> AppResult<Option<classrooms::Model>> {
        match id {
            Some(id) => Ok(classrooms::Entity::find_by_id(id).one(&*self.pool).await?),
            None => Ok(None),
        }
    }

    pub async fn admin(&self, school_id: i64) -> AppResult<AdminDashboardResponse> {
        let school = self.school(school_id).await?;
        let today = clock::today();

        let total_teachers = teachers::Entity::find()
            .filter(teachers::Column::SchoolId.eq(school_id))
            .count(&*self.pool)
            .await?;
        let total_students = students::Entity::find()
            .filter(students::Column::SchoolId.eq(school_id))
            .count(&*self.pool)
            .await?;
        let total_classrooms = classrooms::Entity::find()
            .filter(classrooms::Column::SchoolId.eq(school_id))
            .count(&*self.pool)
            .await?;

        let today_attendance = attendances::Entity::find()
            .filter(attendances::Column::SchoolId.eq(school_id))
            .filter(attendances::Column::Date.eq(today))
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|a| a.status)
            .collect();

        let subscription = subscription_of(&*self.pool, school_id)
            .await?
            .map(|s| SubscriptionResponse::from_model(s, today));
        let upcoming_events = upcoming_events(&*self.pool, school_id, Utc::now()).await?;

        Ok(AdminDashboardResponse {
            branding: BrandingResponse::from(&school),
            school: school.into(),
            subscription,
            total_teachers,
            total_students,
            total_classrooms,
            today,
            today_attendance,
            upcoming_events,
        })
    }

    pub async fn teacher(&self, user_id: i64) -> AppResult<TeacherDashboardResponse> {
        let teacher = teacher_of(&*self.pool, user_id).await?;
        let school = self.school(teacher.school_id).await?;
        let today = clock::today();

        let homeroom = classrooms::Entity::find()
            .filter(classrooms::Column::HomeroomTeacherId.eq(teacher.id))
            .one(&*self.pool)
            .await?
            .map(Into::into);
        let today_check_in = teacher_attendances::Entity::find()
            .filter(teacher_attendances::Column::TeacherId.eq(teacher.id))
            .filter(teacher_attendances::Column::Date.eq(today))
            .one(&*self.pool)
            .await?
            .map(Into::into);
        let upcoming_events = upcoming_events(&*self.pool, school.id, Utc::now()).await?;

        Ok(TeacherDashboardResponse {
            teacher: teacher.into(),
            branding: BrandingResponse::from(&school),
            homeroom,
            today,
            today_check_in,
            upcoming_events,
        })
    }

    pub async fn student(&self, user_id: i64) -> AppResult<StudentDashboardResponse> {
        let student = student_of(&*self.pool, user_id).await?;
        let school = self.school(student.school_id).await?;
        let classroom = self.classroom(student.classroom_id).await?.map(Into::into);

        let (first, last, month) = month_range(None, clock::today())?;
        let month_summary = attendances::Entity::find()
            .filter(attendances::Column::StudentId.eq(student.id))
            .filter(attendances::Column::Date.between(first, last))
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|a| a.status)
            .collect();
        let upcoming_events = upcoming_events(&*self.pool, school.id, Utc::now()).await?;

        Ok(StudentDashboardResponse {
            student: student.into(),
            branding: BrandingResponse::from(&school),
            classroom,
            month,
            month_summary,
            upcoming_events,
        })
    }
}
