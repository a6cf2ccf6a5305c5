pub mod attendances;
pub mod classrooms;
pub mod school_events;
pub mod school_qr_codes;
pub mod school_subscriptions;
pub mod schools;
pub mod students;
pub mod task_jobs;
pub mod task_results;
pub mod teacher_attendances;
pub mod teachers;
pub mod users;

pub use attendances::AttendanceStatus;
pub use school_events::EventType;
pub use school_subscriptions::SubscriptionPlan;
pub use task_jobs::TaskState;
pub use users::UserRole;

pub use attendances as attendance_entity;
pub use classrooms as classroom_entity;
pub use school_events as school_event_entity;
pub use school_qr_codes as school_qr_code_entity;
pub use school_subscriptions as subscription_entity;
pub use schools as school_entity;
pub use students as student_entity;
pub use task_jobs as task_job_entity;
pub use task_results as task_result_entity;
pub use teacher_attendances as teacher_attendance_entity;
pub use teachers as teacher_entity;
pub use users as user_entity;
