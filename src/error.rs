use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The buffer is not a readable spreadsheet container.
    #[error("Decode error: {0}")]
    Decode(String),
    /// The workbook decoded but its first sheet has no usable header row.
    #[error("Format error: {0}")]
    Format(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Export error: {0}")]
    Export(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        AppError::Decode(err.to_string())
    }
}

impl AppError {
    /// Message shown to the technician in the import notification.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Decode(_) => {
                "Impossible de lire le fichier : ce n'est pas un classeur Excel valide".to_string()
            }
            AppError::Format(_) => "Format de fichier invalide".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Io(err) => format!("Lecture du fichier impossible : {}", err),
            AppError::Export(msg) => format!("Export impossible : {}", msg),
            AppError::Serialization(_) | AppError::Render(_) => "Une erreur est survenue".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_has_french_message() {
        let err = AppError::Format("missing header row".to_string());
        assert_eq!(err.user_message(), "Format de fichier invalide");
        assert_eq!(err.to_string(), "Format error: missing header row");
    }

    #[test]
    fn invalid_input_message_is_passed_through() {
        let err = AppError::InvalidInput("Seuls les fichiers .xlsx et .xls sont acceptés".to_string());
        assert_eq!(err.user_message(), "Seuls les fichiers .xlsx et .xls sont acceptés");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[test]
    fn render_errors_convert() {
        fn failing() -> Result<(), AppError> {
            Err(std::fmt::Error)?;
            Ok(())
        }
        let err = failing().unwrap_err();
        assert!(matches!(err, AppError::Render(_)));
        assert_eq!(err.user_message(), "Une erreur est survenue");
    }
}
