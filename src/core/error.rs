use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl AppError {
    /// Log the error at a level matching its kind and hand it back.
    ///
    /// Store-side failures are opaque to the user, so the detail only ends up here.
    pub fn logged(self) -> Self {
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Storage(msg) => tracing::error!("Storage error: {}", msg),
            AppError::ExternalServiceError(msg) => {
                tracing::error!("External service error: {}", msg)
            }
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            AppError::Io(e) => tracing::warn!("I/O error: {}", e),
            AppError::NotFound(msg) | AppError::Validation(msg) => {
                tracing::warn!("{}", msg)
            }
        }
        self
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
