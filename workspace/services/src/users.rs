use chrono::Utc;
use common::Page;
use model::entities::{course, course_member, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};
use crate::password::{hash_password, verify_password};
use crate::search::icontains;

/// Users shown per page in the user listing.
pub const USERS_PAGE_SIZE: u64 = 10;

/// Data for a new account, from self-registration or staff creation.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Fields staff may change on an existing user. The username is read-only.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
}

/// Creates a user after checking the username is free.
#[instrument(skip(db, new_user), fields(username = %new_user.username))]
pub async fn create_user<C: ConnectionTrait>(db: &C, new_user: NewUser) -> Result<user::Model> {
    let username = new_user.username.trim().to_string();
    if username.is_empty() {
        return Err(ServiceError::Validation("Username must not be empty".to_string()));
    }

    let taken = user::Entity::find()
        .filter(user::Column::Username.eq(username.as_str()))
        .count(db)
        .await?;
    if taken > 0 {
        warn!("Username '{}' is already taken", username);
        return Err(ServiceError::UsernameTaken(username));
    }

    let created = user::ActiveModel {
        username: Set(username),
        password_hash: Set(hash_password(&new_user.password)),
        first_name: Set(new_user.first_name),
        last_name: Set(new_user.last_name),
        email: Set(new_user.email),
        is_staff: Set(new_user.is_staff || new_user.is_superuser),
        is_superuser: Set(new_user.is_superuser),
        is_active: Set(true),
        date_joined: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created user {} ({})", created.id, created.username);
    Ok(created)
}

/// Returns the user when the credentials match an active account.
#[instrument(skip(db, password))]
pub async fn authenticate<C: ConnectionTrait>(
    db: &C,
    username: &str,
    password: &str,
) -> Result<Option<user::Model>> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?;

    match found {
        Some(user) if user.is_active && verify_password(password, &user.password_hash) => {
            debug!("Credentials accepted for {}", username);
            Ok(Some(user))
        }
        Some(_) => {
            warn!("Rejected credentials for {}", username);
            Ok(None)
        }
        None => {
            warn!("Unknown username {}", username);
            Ok(None)
        }
    }
}

pub async fn get_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))
}

/// Lists users ordered by join date, optionally matching `search` against
/// username, first name, last name or email.
#[instrument(skip(db))]
pub async fn list_users<C: ConnectionTrait>(
    db: &C,
    search: Option<&str>,
    page: u64,
) -> Result<Page<user::Model>> {
    let mut query = user::Entity::find();

    if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(icontains(user::Column::Username, term))
                .add(icontains(user::Column::FirstName, term))
                .add(icontains(user::Column::LastName, term))
                .add(icontains(user::Column::Email, term)),
        );
    }

    let paginator = query
        .order_by_asc(user::Column::DateJoined)
        .order_by_asc(user::Column::Id)
        .paginate(db, USERS_PAGE_SIZE);
    let count = paginator.num_items().await?;
    let items = paginator.fetch_page(page.max(1) - 1).await?;

    debug!("Fetched {} of {} users for page {}", items.len(), count, page);
    Ok(Page::new(items, count, page.max(1), USERS_PAGE_SIZE))
}

pub async fn count_users<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(user::Entity::find().count(db).await?)
}

/// Applies staff edits. Only a superuser may edit another superuser.
#[instrument(skip(db, actor, changes), fields(actor_id = actor.id))]
pub async fn update_user<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    user_id: i32,
    changes: UserChanges,
) -> Result<user::Model> {
    let target = get_user(db, user_id).await?;

    if !actor.is_superuser && target.is_superuser {
        warn!("User {} tried to edit superuser {}", actor.id, target.id);
        return Err(ServiceError::Forbidden(
            "You do not have permission to edit a superuser account".to_string(),
        ));
    }

    let mut active: user::ActiveModel = target.into();
    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(email) = changes.email {
        active.email = Set(email);
    }
    if let Some(is_active) = changes.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_staff) = changes.is_staff {
        active.is_staff = Set(is_staff);
    }

    let updated = active.update(db).await?;
    info!("Updated user {}", updated.id);
    Ok(updated)
}

/// Deletes a user. Refused for the caller's own account, for superusers
/// unless the caller is one, and while the user teaches or attends a course.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn delete_user<C: ConnectionTrait>(
    db: &C,
    actor: &user::Model,
    user_id: i32,
) -> Result<user::Model> {
    let target = get_user(db, user_id).await?;

    if target.id == actor.id {
        return Err(ServiceError::CannotDeleteSelf);
    }
    if !actor.is_superuser && target.is_superuser {
        warn!("User {} tried to delete superuser {}", actor.id, target.id);
        return Err(ServiceError::Forbidden(
            "You do not have permission to delete a superuser account".to_string(),
        ));
    }

    let taught = course::Entity::find()
        .filter(course::Column::TeacherId.eq(target.id))
        .count(db)
        .await?;
    let memberships = course_member::Entity::find()
        .filter(course_member::Column::UserId.eq(target.id))
        .count(db)
        .await?;
    if taught > 0 || memberships > 0 {
        return Err(ServiceError::Conflict(format!(
            "User '{}' still teaches {} course(s) and holds {} membership(s)",
            target.username, taught, memberships
        )));
    }

    user::Entity::delete_by_id(target.id).exec(db).await?;
    info!("Deleted user {} ({})", target.id, target.username);
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, setup_db};
    use model::entities::course_member::MemberRole;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "secret123".to_string(),
            email: format!("{}@example.com", username),
            first_name: "Budi".to_string(),
            last_name: "Santoso".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let db = setup_db().await;
        let created = create_user(&db, new_user("budi123")).await.unwrap();
        assert!(!created.is_staff);
        assert_ne!(created.password_hash, "secret123");

        let ok = authenticate(&db, "budi123", "secret123").await.unwrap();
        assert_eq!(ok.map(|u| u.id), Some(created.id));
        assert!(authenticate(&db, "budi123", "wrong").await.unwrap().is_none());
        assert!(authenticate(&db, "nobody", "secret123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_authenticate() {
        let db = setup_db().await;
        let staff = testing::new_superuser(&db, "admin").await.unwrap();
        let created = create_user(&db, new_user("sleepy")).await.unwrap();
        update_user(
            &db,
            &staff,
            created.id,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(authenticate(&db, "sleepy", "secret123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let db = setup_db().await;
        create_user(&db, new_user("budi123")).await.unwrap();
        let err = create_user(&db, new_user("budi123")).await.unwrap_err();
        assert!(matches!(err, ServiceError::UsernameTaken(name) if name == "budi123"));
    }

    #[tokio::test]
    async fn test_list_users_search_is_case_insensitive() {
        let db = setup_db().await;
        create_user(&db, new_user("alice01")).await.unwrap();
        create_user(&db, new_user("bob0001")).await.unwrap();
        let mut carol = new_user("carol01");
        carol.first_name = "ALICIA".to_string();
        create_user(&db, carol).await.unwrap();

        let page = list_users(&db, Some("ali"), 1).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice01", "carol01"]);
        assert_eq!(page.count, 2);
    }

    #[tokio::test]
    async fn test_list_users_search_underscore_is_literal() {
        let db = setup_db().await;
        create_user(&db, new_user("alice01")).await.unwrap();
        create_user(&db, new_user("bob_001")).await.unwrap();

        let page = list_users(&db, Some("_"), 1).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["bob_001"]);
    }

    #[tokio::test]
    async fn test_list_users_paginates_by_ten() {
        let db = setup_db().await;
        for i in 0..12 {
            create_user(&db, new_user(&format!("member{:02}", i))).await.unwrap();
        }

        let first = list_users(&db, None, 1).await.unwrap();
        let second = list_users(&db, None, 2).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(second.items.len(), 2);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.items[0].username, "member00");
    }

    #[tokio::test]
    async fn test_staff_cannot_edit_or_delete_superuser() {
        let db = setup_db().await;
        let staff = testing::new_staff(&db, "staff1").await.unwrap();
        let root = testing::new_superuser(&db, "root").await.unwrap();

        let err = update_user(&db, &staff, root.id, UserChanges::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = delete_user(&db, &staff, root.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        // A superuser may edit another superuser
        let other_root = testing::new_superuser(&db, "root2").await.unwrap();
        let updated = update_user(
            &db,
            &other_root,
            root.id,
            UserChanges {
                first_name: Some("Super".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.first_name, "Super");
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let db = setup_db().await;
        let staff = testing::new_staff(&db, "staff1").await.unwrap();
        let teacher = testing::new_named_user(&db, "teacher1").await.unwrap();
        let student = testing::new_named_user(&db, "student1").await.unwrap();
        let idle = testing::new_named_user(&db, "idle01").await.unwrap();
        let course = testing::new_course(&db, &teacher, "Rust").await.unwrap();
        testing::new_member(&db, &course, &student, MemberRole::Student).await.unwrap();

        assert!(matches!(
            delete_user(&db, &staff, staff.id).await.unwrap_err(),
            ServiceError::CannotDeleteSelf
        ));
        assert!(matches!(
            delete_user(&db, &staff, teacher.id).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            delete_user(&db, &staff, student.id).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));

        let deleted = delete_user(&db, &staff, idle.id).await.unwrap();
        assert_eq!(deleted.username, "idle01");
        assert!(matches!(get_user(&db, idle.id).await.unwrap_err(), ServiceError::NotFound(_)));
    }
}
