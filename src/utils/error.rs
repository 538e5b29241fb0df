use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreehouseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Pattern error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required value: {field}")]
    MissingConfigError { field: String },

    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    #[error("Could not lock {path}: {source}")]
    LockError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Mail source error: {message}")]
    MailSourceError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Storage,
    Input,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 依嚴重程度決定 CLI 的退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl TreehouseError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TreehouseError::ConfigError { .. }
            | TreehouseError::ConfigValidationError { .. }
            | TreehouseError::InvalidConfigValueError { .. }
            | TreehouseError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TreehouseError::IoError(_) | TreehouseError::LockError { .. } => {
                ErrorCategory::Storage
            }
            TreehouseError::ItemNotFound { .. }
            | TreehouseError::ValidationError { .. }
            | TreehouseError::MailSourceError { .. } => ErrorCategory::Input,
            TreehouseError::SerializationError(_)
            | TreehouseError::CsvError(_)
            | TreehouseError::RegexError(_)
            | TreehouseError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 另一個程序持有鎖，稍後重試即可
            TreehouseError::LockError { .. } => ErrorSeverity::Medium,
            TreehouseError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            TreehouseError::IoError(_) => {
                "Check that the file exists and that you have read/write permission".to_string()
            }
            TreehouseError::SerializationError(_) => {
                "Check that the JSON input is well formed".to_string()
            }
            TreehouseError::CsvError(_) => {
                "Check the CSV header row and that every row has the same column count"
                    .to_string()
            }
            TreehouseError::RegexError(_) => {
                "Check the vendor patterns in treehouse.toml".to_string()
            }
            TreehouseError::ConfigError { .. }
            | TreehouseError::ConfigValidationError { .. } => {
                "Review treehouse.toml or the command-line flags".to_string()
            }
            TreehouseError::InvalidConfigValueError { field, .. } => {
                format!("Provide a valid value for '{}'", field)
            }
            TreehouseError::MissingConfigError { field } => {
                format!("Supply '{}' on the command line", field)
            }
            TreehouseError::ItemNotFound { .. } => {
                "Run with --list --all to see the available item ids".to_string()
            }
            TreehouseError::LockError { .. } => {
                "Another treehouse process is updating the queue; retry in a moment".to_string()
            }
            TreehouseError::MailSourceError { .. } => {
                "Check the mailbox export directory".to_string()
            }
            TreehouseError::ProcessingError { .. } | TreehouseError::ValidationError { .. } => {
                "Inspect the input data and try again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TreehouseError::ItemNotFound { id } => format!("Error: Item not found: {}", id),
            TreehouseError::ValidationError { message } => format!("Error: {}", message),
            TreehouseError::MissingConfigError { field } => {
                format!("Error: {} is required", field)
            }
            other => format!("Error: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TreehouseError>;
