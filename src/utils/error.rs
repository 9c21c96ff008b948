use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Card catalog error: {message}")]
    CatalogError { message: String },

    #[error("{vendor} returned HTTP {status}: {body}")]
    VendorError {
        vendor: String,
        status: u16,
        body: String,
    },

    #[error("{vendor} response is missing {field}")]
    VendorResponseError { vendor: String, field: String },

    #[error("Download of {url} failed: {reason}")]
    DownloadError { url: String, reason: String },

    #[error("Rendering failed: {message}")]
    RenderError { message: String },

    #[error("Printing failed: {message}")]
    PrintError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Vendor,
    Data,
    Rendering,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DeckError {
    pub fn config(message: impl Into<String>) -> Self {
        DeckError::ConfigError {
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        DeckError::CatalogError {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        DeckError::RenderError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DeckError::ConfigError { .. }
            | DeckError::MissingConfigError { .. }
            | DeckError::InvalidConfigValueError { .. }
            | DeckError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            DeckError::HttpError(_) | DeckError::DownloadError { .. } => ErrorCategory::Network,
            DeckError::VendorError { .. } | DeckError::VendorResponseError { .. } => {
                ErrorCategory::Vendor
            }
            DeckError::CsvError(_)
            | DeckError::SerializationError(_)
            | DeckError::ImageError(_)
            | DeckError::CatalogError { .. } => ErrorCategory::Data,
            DeckError::RenderError { .. } | DeckError::PrintError { .. } => {
                ErrorCategory::Rendering
            }
            DeckError::IoError(_) | DeckError::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeckError::PrintError { .. } => ErrorSeverity::Low,
            DeckError::HttpError(_)
            | DeckError::DownloadError { .. }
            | DeckError::VendorError { .. } => ErrorSeverity::Medium,
            DeckError::IoError(_) | DeckError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 是否值得重試 (網路暫時性錯誤或 5xx / 429)
    pub fn is_transient(&self) -> bool {
        match self {
            DeckError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DeckError::VendorError { status, .. } => *status == 429 || *status >= 500,
            DeckError::DownloadError { .. } => true,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DeckError::MissingConfigError { field } if field.contains("api_key") => {
                "Export MULEROUTER_API_KEY or REPLICATE_API_TOKEN, or set vendor.api_key in deck.toml"
            }
            DeckError::MissingConfigError { .. } => "Add the missing setting to deck.toml or pass it on the command line",
            DeckError::ConfigError { .. }
            | DeckError::InvalidConfigValueError { .. }
            | DeckError::ConfigValidationError { .. } => "Check deck.toml against the documented sections",
            DeckError::CatalogError { .. } => "Fix the card catalog JSON: every card needs a unique id, a name and a category",
            DeckError::HttpError(_) | DeckError::DownloadError { .. } => "Check network connectivity and retry the command",
            DeckError::VendorError { status, .. } if *status == 401 || *status == 403 => {
                "The vendor rejected the credentials; verify the API key"
            }
            DeckError::VendorError { status, .. } if *status == 429 => {
                "The vendor is rate limiting; raise pacing.submit_delay_secs and retry"
            }
            DeckError::VendorError { .. } | DeckError::VendorResponseError { .. } => {
                "Run `card-forge probe` to confirm the vendor endpoint and response shape"
            }
            DeckError::RenderError { .. } => "Install Chromium or set render.chrome_path / CHROME_PATH",
            DeckError::PrintError { .. } => "Make sure CUPS `lp` is installed and a default printer is configured",
            DeckError::ImageError(_) => "The vendor returned something that is not an image; re-run `card-forge status`",
            DeckError::SerializationError(_) | DeckError::CsvError(_) => "The input file is malformed; regenerate it",
            DeckError::IoError(_) | DeckError::ZipError(_) => "Check file permissions and free disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DeckError::MissingConfigError { field } => {
                format!("Required setting '{}' is not configured", field)
            }
            DeckError::VendorError { vendor, status, .. } => {
                format!("{} rejected the request (HTTP {})", vendor, status)
            }
            DeckError::RenderError { .. } => "Could not render cards with the headless browser".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
