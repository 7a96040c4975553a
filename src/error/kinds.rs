use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
#[derive(Debug)]
pub enum ExportError {
    /// Caller input rejected before the export started.
    Validation(ValidationError),

    /// The record store failed before any output was written.
    Store(StoreError),

    /// The record store failed after rows were already written to the sink.
    ///
    /// The output is incomplete; CSV has no trailer to signal this in-band.
    Truncated {
        rows_emitted: u64,
        source: StoreError,
    },

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors, usually from the output sink.
    Io(io::Error),

    /// JSON decoding errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Request validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No shape (table) selector was supplied.
    MissingShape,

    /// Unknown shape selector.
    InvalidShape(String),

    /// A date filter is not an ISO 8601 timestamp.
    InvalidDate { field: &'static str, value: String },

    /// Start of the time range is after its end.
    InvertedRange { start: String, end: String },

    /// Row limit missing, unparsable or out of bounds.
    InvalidLimit { value: String, max: u64 },

    /// Column override list is empty or contains blank names.
    InvalidColumns(String),
}

/// Record store errors.
#[derive(Debug)]
pub enum StoreError {
    /// The continuation token could not be decoded.
    InvalidToken(String),

    /// The store is unreachable or refused the request.
    Unavailable(String),

    /// The store returned data it could not describe as records.
    Malformed(String),

    /// Underlying I/O failure.
    Io(io::Error),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl ExportError {
    /// Whether this error was raised by request validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, ExportError::Validation(_))
    }

    /// Whether output had already been written when this error occurred.
    pub fn is_truncation(&self) -> bool {
        matches!(self, ExportError::Truncated { .. })
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Validation(e) => write!(f, "{e}"),
            ExportError::Store(e) => write!(f, "Store error: {e}"),
            ExportError::Truncated {
                rows_emitted,
                source,
            } => write!(
                f,
                "Export truncated after {rows_emitted} rows: {source}"
            ),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportError::Io(e) => write!(f, "I/O error: {e}"),
            ExportError::Json(e) => write!(f, "JSON error: {e}"),
            ExportError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingShape => write!(f, "table parameter is required"),
            ValidationError::InvalidShape(name) => write!(
                f,
                "Invalid table parameter '{name}'. Must be one of: detections, classifications, models, videos, environment, devices"
            ),
            ValidationError::InvalidDate { field, value } => write!(
                f,
                "Invalid date format for {field} '{value}'. Use ISO 8601 format (e.g. 2023-07-15T10:30:00Z)"
            ),
            ValidationError::InvertedRange { start, end } => {
                write!(f, "start_time {start} is after end_time {end}")
            }
            ValidationError::InvalidLimit { value, max } => {
                write!(f, "Invalid limit '{value}'. Must be between 1 and {max}")
            }
            ValidationError::InvalidColumns(msg) => write!(f, "Invalid columns: {msg}"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidToken(msg) => write!(f, "Invalid continuation token: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::Malformed(msg) => write!(f, "Malformed store response: {msg}"),
            StoreError::Io(e) => write!(f, "Store I/O error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Validation(e) => Some(e),
            ExportError::Store(e) => Some(e),
            ExportError::Truncated { source, .. } => Some(source),
            ExportError::Config(e) => Some(e),
            ExportError::Io(e) => Some(e),
            ExportError::Json(e) => Some(e),
            ExportError::Generic(_) => None,
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for ConfigError {}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/* ========================= Conversions to ExportError ========================= */

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Json(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(e) => ExportError::Io(e),
            _ => ExportError::Generic(format!("CSV encoding error: {message}")),
        }
    }
}

impl From<ValidationError> for ExportError {
    fn from(err: ValidationError) -> Self {
        ExportError::Validation(err)
    }
}

impl From<StoreError> for ExportError {
    fn from(err: StoreError) -> Self {
        ExportError::Store(err)
    }
}

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<String> for ExportError {
    fn from(msg: String) -> Self {
        ExportError::Generic(msg)
    }
}

impl From<&str> for ExportError {
    fn from(msg: &str) -> Self {
        ExportError::Generic(msg.to_owned())
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_shape_lists_choices() {
        let msg = ValidationError::InvalidShape("invalid_table".into()).to_string();
        assert!(msg.contains("Invalid table parameter"));
        assert!(msg.contains("detections, classifications, models, videos, environment, devices"));
    }

    #[test]
    fn test_invalid_date_mentions_iso_format() {
        let msg = ValidationError::InvalidDate {
            field: "start_time",
            value: "2023-07-15".into(),
        }
        .to_string();
        assert!(msg.contains("Invalid date format"));
        assert!(msg.contains("ISO 8601 format"));
    }

    #[test]
    fn test_csv_io_error_keeps_its_kind() {
        let err = ExportError::from(csv::Error::from(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "pipe closed",
        )));
        assert!(matches!(err, ExportError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_truncated_reports_rows() {
        let err = ExportError::Truncated {
            rows_emitted: 42,
            source: StoreError::Unavailable("timeout".into()),
        };
        assert!(err.is_truncation());
        assert!(err.to_string().contains("42 rows"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
