//! Error types for taxalens.

/// Result type alias for taxalens operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for taxalens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model version is not in the supported set.
    #[error("this model version is not supported: '{version}'")]
    UnsupportedVersion {
        /// Requested version.
        version: String,
    },

    /// Confidence threshold is outside the range allowed for the model version.
    #[error("confidence threshold must be a number between {min} and {max}, got {value}")]
    InvalidConfidenceThreshold {
        /// Rejected value.
        value: f64,
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },

    /// Crop ratio is outside 0.0-1.0.
    #[error("crop ratio must be a number between 0 and 1, got {value}")]
    InvalidCropRatio {
        /// Rejected value.
        value: f64,
    },

    /// Geomodel requested without a usable location.
    #[error("location must have latitude and longitude set")]
    MissingLocation,

    /// Invalid latitude value.
    #[error("invalid latitude: {value} (must be -90.0 to 90.0)")]
    InvalidLatitude {
        /// Invalid latitude value.
        value: f64,
    },

    /// Invalid longitude value.
    #[error("invalid longitude: {value} (must be -180.0 to 180.0)")]
    InvalidLongitude {
        /// Invalid longitude value.
        value: f64,
    },

    /// Result buffer capacity must be at least one.
    #[error("result buffer size must be at least 1, got {value}")]
    InvalidBufferSize {
        /// Rejected capacity.
        value: usize,
    },

    /// A required native collaborator is not available.
    #[error("{component} is not available")]
    PluginUnavailable {
        /// Name of the missing collaborator.
        component: String,
    },

    /// The classifier or geomodel failed.
    #[error("inference failed: {reason}")]
    Inference {
        /// Description of the failure.
        reason: String,
    },

    /// Grid geometry rejected a coordinate or cell id.
    #[error("invalid grid cell: {reason}")]
    InvalidCell {
        /// Description of the failure.
        reason: String,
    },

    /// Failed to read taxonomy file.
    #[error("failed to read taxonomy file '{path}'")]
    TaxonomyRead {
        /// Path to the taxonomy file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Taxonomy file content is inconsistent.
    #[error("invalid taxonomy: {message}")]
    TaxonomyParse {
        /// Description of the problem.
        message: String,
    },

    /// Failed to read elevation table.
    #[error("failed to read elevation table '{path}'")]
    ElevationTableRead {
        /// Path to the elevation table.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse elevation table.
    #[error("failed to parse elevation table '{path}'")]
    ElevationTableParse {
        /// Path to the elevation table.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to read a recorded classifier output file.
    #[error("failed to read recording '{path}'")]
    RecordingRead {
        /// Path to the recording.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a recorded classifier output.
    #[error("failed to parse recording '{path}' (line {line})")]
    RecordingParse {
        /// Path to the recording.
        path: std::path::PathBuf,
        /// One-based line number (1 for whole-file JSON).
        line: usize,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to serialize output.
    #[error("failed to serialize output")]
    OutputSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}
