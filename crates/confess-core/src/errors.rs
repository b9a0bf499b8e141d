/// Core error type for the confession workflow.
///
/// Adapter crates map their specific failures into this type so the router
/// can decide between user-facing wording and operator logging.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("store error: {0}")]
    Store(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wording shown to the end user when an externally triggered operation
    /// fails. Operator detail stays in the `Display` impl and the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) => format!("❌ {msg}"),
            Error::Permission(_) => "❌ Access denied".to_string(),
            Error::NotFound(_) => {
                "❌ Confession not found or may have been deleted.".to_string()
            }
            Error::RateLimited { retry_after_secs } => {
                format!("⏳ Please wait {retry_after_secs} seconds before trying again.")
            }
            _ => "❌ Something went wrong. Please try again.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_wording_carries_the_reason() {
        let err = Error::Validation("Comment too short. Minimum 3 characters.".to_string());
        assert_eq!(
            err.user_message(),
            "❌ Comment too short. Minimum 3 characters."
        );
    }

    #[test]
    fn internal_errors_stay_generic_for_users() {
        let err = Error::Store("backend unreachable at 10.0.0.3".to_string());
        assert!(!err.user_message().contains("10.0.0.3"));
    }
}
