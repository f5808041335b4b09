#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Unsupported time format: {0}")]
    TimeFormat(String),

    #[error("Recurring reminders must use the 'every <schedule> at <time>' form")]
    RecurrenceMisuse,

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Unsupported recurrence pattern: {0}")]
    UnsupportedRecurrence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Errors caused by user input. These are shown to the user as-is and never retried.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::Format(_)
                | AppError::TimeFormat(_)
                | AppError::RecurrenceMisuse
                | AppError::InvalidSchedule(_)
                | AppError::UnsupportedRecurrence(_)
                | AppError::NotFound(_)
        )
    }

    /// Text suitable for a chat reply. Internal failures are not leaked.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "An internal error occurred".to_string()
            }
            AppError::Serialization(e) => {
                tracing::warn!("Serialization error: {:?}", e);
                "The data could not be read".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_are_classified() {
        assert!(AppError::Validation("x".into()).is_user_error());
        assert!(AppError::RecurrenceMisuse.is_user_error());
        assert!(!AppError::Delivery("x".into()).is_user_error());
        assert!(!AppError::InvalidRecipient("abc".into()).is_user_error());
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = AppError::Internal(anyhow::anyhow!("secret path /var/lib"));
        assert_eq!(err.user_message(), "An internal error occurred");

        let err = AppError::TimeFormat("noonish".into());
        assert_eq!(err.user_message(), "Unsupported time format: noonish");
    }
}
