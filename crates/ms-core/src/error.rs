//! Error types for minisel

use thiserror::Error;

/// minisel error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error (bad or missing configuration before processing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel map was empty when the cutflow session was initialized
    #[error("channel map is empty; define channels before initializing the selection")]
    EmptyChannels,

    /// A selection step referenced a parent that was never registered
    #[error("step '{step}' references unknown parent step '{parent}'")]
    MissingParent {
        /// Step being added.
        step: String,
        /// The unregistered parent.
        parent: String,
    },

    /// A named mask (or step label) was registered twice
    #[error("duplicate selection key '{0}'")]
    DuplicateKey(String),

    /// A channel-wise step mask omitted one of the configured channels
    #[error("channel-wise step '{step}' has no mask for channel '{channel}'")]
    MissingChannelMask {
        /// Step being added.
        step: String,
        /// The channel missing from the mask map.
        channel: String,
    },

    /// A mask conjunction requested a key that was never registered
    #[error("unknown selection key '{0}'")]
    UnknownKey(String),

    /// A mask or column length did not match the batch length
    #[error("length mismatch for '{name}': expected {expected}, got {got}")]
    LengthMismatch {
        /// Offending mask/column name.
        name: String,
        /// Expected batch length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// Columnar data error (missing column, wrong type, inconsistent offsets)
    #[error("column error: {0}")]
    Column(String),

    /// Parquet/Arrow I/O error
    #[error("parquet error: {0}")]
    Parquet(String),

    /// An era with no calibration support was requested
    #[error("unsupported era: {0}")]
    UnsupportedEra(String),

    /// A selection strategy was asked about a channel it does not define
    #[error("channel '{0}' is not supported by this strategy")]
    UnknownChannel(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
