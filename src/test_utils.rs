#[cfg(test)]
pub mod test_utils {
    use crate::config::{Settings, ThrottleSettings, initialize_app_state_with_url};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use migration::{Migrator, MigratorTrait};
    use model::entities::{course, course_content, user};
    use services::courses::CourseInput;
    use services::users::NewUser;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_PASSWORD: &str = "secret123";

    /// Settings for tests: throttles loose enough that ordinary tests never hit them.
    pub fn test_settings() -> Settings {
        Settings {
            jwt_secret: "test-secret".to_string(),
            throttle: ThrottleSettings {
                enabled: true,
                anon: "10000/s".to_string(),
                auth: "10000/s".to_string(),
                simple: "10000/s".to_string(),
                no_reads: "10000/s".to_string(),
                strict_post: "10000/s".to_string(),
                daily: "10000/s".to_string(),
            },
            ..Settings::default()
        }
    }

    /// Create AppState on a migrated in-memory SQLite database
    pub async fn setup_test_app_state_with(settings: &Settings) -> AppState {
        let state = initialize_app_state_with_url("sqlite::memory:", settings)
            .await
            .expect("Failed to initialize test state");

        Migrator::up(&state.db, None)
            .await
            .expect("Failed to run migrations");

        state
    }

    pub async fn setup_test_app_state() -> AppState {
        setup_test_app_state_with(&test_settings()).await
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level comes from RUST_LOG and defaults to WARN.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing, returning the state for fixtures
    pub async fn setup_test_app() -> (Router, AppState) {
        let _ = init_test_tracing();
        let state = setup_test_app_state().await;
        (create_router(state.clone()), state)
    }

    /// Same as [`setup_test_app`] with custom settings
    pub async fn setup_test_app_with(settings: &Settings) -> (Router, AppState) {
        let _ = init_test_tracing();
        let state = setup_test_app_state_with(settings).await;
        (create_router(state.clone()), state)
    }

    async fn insert_user(state: &AppState, username: &str, is_staff: bool, is_superuser: bool) -> user::Model {
        services::users::create_user(
            &state.db,
            NewUser {
                username: username.to_string(),
                password: TEST_PASSWORD.to_string(),
                email: format!("{}@example.com", username),
                is_staff,
                is_superuser,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create test user")
    }

    pub async fn create_student(state: &AppState, username: &str) -> user::Model {
        insert_user(state, username, false, false).await
    }

    pub async fn create_staff(state: &AppState, username: &str) -> user::Model {
        insert_user(state, username, true, false).await
    }

    pub async fn create_superuser(state: &AppState, username: &str) -> user::Model {
        insert_user(state, username, true, true).await
    }

    pub async fn create_course(state: &AppState, teacher: &user::Model, name: &str, price: i64) -> course::Model {
        services::courses::create_course(
            &state.db,
            CourseInput {
                teacher_id: teacher.id,
                name: name.to_string(),
                description: Some(format!("About {}", name)),
                price: Some(price),
                image: None,
            },
        )
        .await
        .expect("Failed to create test course")
    }

    pub async fn create_content(state: &AppState, course: &course::Model, name: &str) -> course_content::Model {
        services::contents::create_content(
            &state.db,
            course,
            services::contents::ContentInput {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to create test content")
    }

    /// A valid access token for the user
    pub fn token_for(state: &AppState, user: &user::Model) -> String {
        state.auth.access_token(user.id).expect("Failed to sign token")
    }
}
