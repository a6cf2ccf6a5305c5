use crate::database::DbPool;
use crate::entities::{
    AttendanceStatus, attendance_entity as attendances, classroom_entity as classrooms,
    school_qr_code_entity as qr_codes, student_entity as students,
    teacher_attendance_entity as teacher_attendances, teacher_entity as teachers,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::clock;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

pub(crate) async fn teacher_of<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> AppResult<teachers::Model> {
    teachers::Entity::find()
        .filter(teachers::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher profile not found".to_string()))
}

pub(crate) async fn student_of<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
) -> AppResult<students::Model> {
    students::Entity::find()
        .filter(students::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student profile not found".to_string()))
}

/// First and last day of `YYYY-MM`, defaulting to the month of `today`.
pub(crate) fn month_range(
    month: Option<&str>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveDate, String)> {
    let first = match month.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => NaiveDate::parse_from_str(&format!("{m}-01"), "%Y-%m-%d").map_err(|_| {
            AppError::ValidationError(format!("Invalid month {m:?}, expected YYYY-MM"))
        })?,
        None => today.with_day(1).unwrap_or(today),
    };
    let next_month = first
        .checked_add_months(chrono::Months::new(1))
        .ok_or_else(|| AppError::ValidationError("Month out of range".to_string()))?;
    let last = next_month.pred_opt().unwrap_or(first);
    Ok((first, last, first.format("%Y-%m").to_string()))
}

/// Check-in when nothing is recorded today, check-out after that, once.
pub(crate) fn next_check_in_action(
    today_record: Option<&teacher_attendances::Model>,
) -> AppResult<CheckInAction> {
    match today_record {
        None => Ok(CheckInAction::CheckIn),
        Some(r) if r.time_out.is_none() => Ok(CheckInAction::CheckOut),
        Some(_) => Err(AppError::ValidationError(
            "Already checked out today".to_string(),
        )),
    }
}

#[derive(Clone)]
pub struct AttendanceService {
    pool: DbPool,
}

impl AttendanceService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Upserts one record per (student, date) for a classroom.
    pub async fn record_class_attendance(
        &self,
        user_id: i64,
        school_id: i64,
        req: RecordAttendanceRequest,
    ) -> AppResult<RecordAttendanceResponse> {
        if req.entries.is_empty() {
            return Err(AppError::ValidationError(
                "At least one attendance entry is required".to_string(),
            ));
        }
        let today = clock::today();
        let date = req.date.unwrap_or(today);
        if date > today {
            return Err(AppError::ValidationError(
                "Attendance cannot be recorded for a future date".to_string(),
            ));
        }

        let teacher = teacher_of(&*self.pool, user_id).await?;
        if teacher.school_id != school_id {
            return Err(AppError::Forbidden);
        }
        let classroom = classrooms::Entity::find_by_id(req.classroom_id)
            .one(&*self.pool)
            .await?
            .filter(|c| c.school_id == school_id)
            .ok_or_else(|| AppError::NotFound("Classroom not found".to_string()))?;

        let ids: HashSet<i64> = req.entries.iter().map(|e| e.student_id).collect();
        if ids.len() != req.entries.len() {
            return Err(AppError::ValidationError(
                "Each student may appear only once".to_string(),
            ));
        }
        let enrolled = students::Entity::find()
            .filter(students::Column::Id.is_in(ids.iter().copied()))
            .filter(students::Column::ClassroomId.eq(classroom.id))
            .all(&*self.pool)
            .await?;
        if enrolled.len() != ids.len() {
            return Err(AppError::ValidationError(
                "Some students are not in this classroom".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;
        let mut existing: HashMap<i64, attendances::Model> = attendances::Entity::find()
            .filter(attendances::Column::StudentId.is_in(ids.iter().copied()))
            .filter(attendances::Column::Date.eq(date))
            .all(&txn)
            .await?
            .into_iter()
            .map(|a| (a.student_id, a))
            .collect();

        let (mut created, mut updated) = (0, 0);
        for entry in req.entries {
            match existing.remove(&entry.student_id) {
                Some(row) => {
                    let mut am = row.into_active_model();
                    am.status = Set(entry.status);
                    am.notes = Set(entry.notes);
                    am.classroom_id = Set(classroom.id);
                    am.recorded_by = Set(Some(teacher.id));
                    am.updated_at = Set(Some(Utc::now()));
                    am.update(&txn).await?;
                    updated += 1;
                }
                None => {
                    attendances::ActiveModel {
                        school_id: Set(school_id),
                        student_id: Set(entry.student_id),
                        classroom_id: Set(classroom.id),
                        date: Set(date),
                        status: Set(entry.status),
                        recorded_by: Set(Some(teacher.id)),
                        notes: Set(entry.notes),
                        created_at: Set(Some(Utc::now())),
                        updated_at: Set(Some(Utc::now())),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                    created += 1;
                }
            }
        }
        txn.commit().await?;

        log::info!(
            "Attendance for classroom {} on {date}: {created} created, {updated} updated by teacher {}",
            classroom.id,
            teacher.id
        );
        Ok(RecordAttendanceResponse {
            classroom_id: classroom.id,
            date,
            created,
            updated,
        })
    }

    pub async fn school_attendance(
        &self,
        school_id: i64,
        date: NaiveDate,
    ) -> AppResult<Vec<AttendanceRecordResponse>> {
        let records = attendances::Entity::find()
            .filter(attendances::Column::SchoolId.eq(school_id))
            .filter(attendances::Column::Date.eq(date))
            .order_by_asc(attendances::Column::ClassroomId)
            .all(&*self.pool)
            .await?;

        let names: HashMap<i64, String> = students::Entity::find()
            .filter(students::Column::SchoolId.eq(school_id))
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|s| (s.id, s.full_name))
            .collect();

        Ok(records
            .into_iter()
            .map(|a| AttendanceRecordResponse {
                id: a.id,
                student_id: a.student_id,
                student_name: names.get(&a.student_id).cloned(),
                classroom_id: a.classroom_id,
                date: a.date,
                status: a.status,
                notes: a.notes,
            })
            .collect())
    }

    pub async fn check_in(
        &self,
        user_id: i64,
        school_id: i64,
        req: CheckInRequest,
        now: DateTime<Utc>,
    ) -> AppResult<CheckInResponse> {
        let teacher = teacher_of(&*self.pool, user_id).await?;
        if teacher.school_id != school_id {
            return Err(AppError::Forbidden);
        }

        let qr = qr_codes::Entity::find()
            .filter(qr_codes::Column::SchoolId.eq(school_id))
            .one(&*self.pool)
            .await?;
        let matches = qr.is_some_and(|q| {
            q.is_active && q.qr_code.as_deref() == Some(req.qr_code.trim())
        });
        if !matches {
            return Err(AppError::ValidationError("Invalid QR code".to_string()));
        }

        let date = clock::local_date(now);
        let today_record = teacher_attendances::Entity::find()
            .filter(teacher_attendances::Column::TeacherId.eq(teacher.id))
            .filter(teacher_attendances::Column::Date.eq(date))
            .one(&*self.pool)
            .await?;

        let action = next_check_in_action(today_record.as_ref())?;
        let saved = match (action, today_record) {
            (CheckInAction::CheckOut, Some(row)) => {
                let mut am = row.into_active_model();
                am.time_out = Set(Some(now));
                am.updated_at = Set(Some(now));
                am.update(&*self.pool).await?
            }
            _ => {
                teacher_attendances::ActiveModel {
                    school_id: Set(school_id),
                    teacher_id: Set(teacher.id),
                    date: Set(date),
                    time_in: Set(Some(now)),
                    time_out: Set(None),
                    status: Set(AttendanceStatus::Hadir),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(&*self.pool)
                .await?
            }
        };

        log::info!("Teacher {} {:?} on {date}", teacher.id, action);
        Ok(CheckInResponse {
            action,
            attendance: saved.into(),
        })
    }

    pub async fn student_attendance(
        &self,
        user_id: i64,
        month: Option<&str>,
    ) -> AppResult<StudentAttendanceResponse> {
        let student = student_of(&*self.pool, user_id).await?;
        let (first, last, label) = month_range(month, clock::today())?;

        let records: Vec<AttendanceRecordResponse> = attendances::Entity::find()
            .filter(attendances::Column::StudentId.eq(student.id))
            .filter(attendances::Column::Date.between(first, last))
            .order_by_asc(attendances::Column::Date)
            .all(&*self.pool)
            .await?
            .into_iter()
            .map(|a| AttendanceRecordResponse {
                id: a.id,
                student_id: a.student_id,
                student_name: Some(student.full_name.clone()),
                classroom_id: a.classroom_id,
                date: a.date,
                status: a.status,
                notes: a.notes,
            })
            .collect();

        Ok(StudentAttendanceResponse {
            month: label,
            summary: records.iter().map(|r| r.status).collect(),
            records,
        })
    }
}
