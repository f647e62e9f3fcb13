use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    DatabaseMigration(#[from] sqlx::migrate::MigrateError),

    // Payload errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Session errors
    #[error("No authenticated user")]
    Unauthorized,

    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    // Validation errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short message suitable for an in-app toast
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::DatabaseMigration(_) | AppError::Internal(_) => {
                "Ocorreu um erro inesperado. Tente novamente.".to_string()
            }
            AppError::Serialization(_) | AppError::Io(_) => {
                "Não foi possível ler ou gravar os dados locais.".to_string()
            }
            AppError::Unauthorized => "Você precisa estar autenticado.".to_string(),
            AppError::NotFound(what) => format!("{} não encontrado.", what),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::Configuration(_) => "Configuração inválida.".to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_shown_verbatim() {
        let err = AppError::ValidationError("Título é obrigatório".to_string());
        assert_eq!(err.user_message(), "Título é obrigatório");
        assert_eq!(err.to_string(), "Validation error: Título é obrigatório");
    }

    #[test]
    fn test_internal_details_are_hidden_from_users() {
        let err = AppError::Internal("connection reset by peer".to_string());
        assert!(!err.user_message().contains("connection reset"));
    }
}
