//! Fixtures shared by the service tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, Set};

use model::entities::{course, course_content, course_member, user};

pub type Result<T> = std::result::Result<T, DbErr>;

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

async fn insert_user(db: &DatabaseConnection, username: &str, staff: bool, superuser: bool) -> Result<user::Model> {
    user::ActiveModel {
        username: Set(username.to_string()),
        password_hash: Set(crate::password::hash_password("password123")),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        email: Set(format!("{}@example.com", username)),
        is_staff: Set(staff),
        is_superuser: Set(superuser),
        is_active: Set(true),
        date_joined: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// A regular user with a unique username.
pub async fn new_user(db: &DatabaseConnection) -> Result<user::Model> {
    static USER_ID: AtomicU64 = AtomicU64::new(0);
    let current_id = USER_ID.fetch_add(1, Ordering::SeqCst);
    insert_user(db, &format!("user_{}", current_id), false, false).await
}

pub async fn new_named_user(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    insert_user(db, username, false, false).await
}

pub async fn new_staff(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    insert_user(db, username, true, false).await
}

pub async fn new_superuser(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    insert_user(db, username, true, true).await
}

pub async fn new_course(db: &DatabaseConnection, teacher: &user::Model, name: &str) -> Result<course::Model> {
    let now = Utc::now().naive_utc();
    course::ActiveModel {
        teacher_id: Set(teacher.id),
        name: Set(name.to_string()),
        description: Set(format!("All about {}", name)),
        price: Set(10000),
        image: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_content(db: &DatabaseConnection, course: &course::Model, name: &str) -> Result<course_content::Model> {
    let now = Utc::now().naive_utc();
    course_content::ActiveModel {
        name: Set(name.to_string()),
        description: Set("-".to_string()),
        video_url: Set(None),
        file_attachment: Set(None),
        course_id: Set(course.id),
        parent_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_member(
    db: &DatabaseConnection,
    course: &course::Model,
    user: &user::Model,
    role: course_member::MemberRole,
) -> Result<course_member::Model> {
    let now = Utc::now().naive_utc();
    course_member::ActiveModel {
        course_id: Set(course.id),
        user_id: Set(user.id),
        roles: Set(role),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}
