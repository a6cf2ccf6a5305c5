use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Tenant schema: schools, users, profiles, attendance, subscriptions
        let sql = include_str!("../../migrations/20261019000001_initial.sql");
        manager.get_connection().execute_unprepared(sql).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            DROP TABLE IF EXISTS teacher_attendances;
            DROP TABLE IF EXISTS school_qr_codes;
            DROP TABLE IF EXISTS school_events;
            DROP TABLE IF EXISTS attendances;
            DROP TABLE IF EXISTS students;
            ALTER TABLE IF EXISTS classrooms DROP CONSTRAINT IF EXISTS fk_classrooms_homeroom_teacher;
            DROP TABLE IF EXISTS teachers;
            DROP TABLE IF EXISTS classrooms;
            DROP TABLE IF EXISTS users;
            DROP TABLE IF EXISTS school_subscriptions;
            DROP TABLE IF EXISTS schools;
            DROP TYPE IF EXISTS event_type;
            DROP TYPE IF EXISTS attendance_status;
            DROP TYPE IF EXISTS user_role;
            DROP TYPE IF EXISTS subscription_plan;
        "#;
        manager.get_connection().execute_unprepared(sql).await?;
        Ok(())
    }
}
