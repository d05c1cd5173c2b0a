use thiserror::Error;

/// Error types for the service layer
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// The requested record does not exist (or is not visible to the caller)
    #[error("{0}")]
    NotFound(String),

    /// The caller is authenticated but not allowed to perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// The operation would break a restriction between records
    #[error("{0}")]
    Conflict(String),

    /// Input rejected before touching the database
    #[error("{0}")]
    Validation(String),

    /// The user already holds a membership in the course
    #[error("You are already enrolled in course '{0}'")]
    AlreadyEnrolled(String),

    /// Registration with a username that exists
    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    /// Staff tried to delete their own account
    #[error("You cannot delete your own account")]
    CannotDeleteSelf,

    /// A CSV import was rejected; nothing was written
    #[error("{0}")]
    Import(String),
}

impl ServiceError {
    pub(crate) fn not_found(entity: &str, id: i32) -> Self {
        ServiceError::NotFound(format!("{} with id {} not found", entity, id))
    }
}

/// Type alias for Result with ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;
