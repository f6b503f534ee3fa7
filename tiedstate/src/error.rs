//! Error types for tiedstate organized by loading stage.

use std::path::PathBuf;
use thiserror::Error;

/// Acoustic model error variants organized by stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or resource resolution error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed model file
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Cross-pool consistency violation
    #[error(transparent)]
    Invariant(#[from] InvariantError),

    /// Query-time inconsistency
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Configuration errors (missing resources, unreadable config files).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Referenced model file does not exist
    #[error("model resource not found: {}", path.display())]
    ResourceNotFound { path: PathBuf },

    /// IO error while reading a config file
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for `ModelConfig`
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Log-math base must be greater than 1
    #[error("log base must be greater than 1, got {0}")]
    InvalidLogBase(f32),
}

/// Model file format errors. Each carries the offending file path.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Binary file does not start with the `s3` identifier
    #[error("{}: not a binary model file (found {found:?})", path.display())]
    NotBinaryModel { path: PathBuf, found: String },

    /// Byte-order magic matches neither orientation
    #[error("{}: corrupt byte-order magic {magic:#010x}", path.display())]
    BadMagic { path: PathBuf, magic: u32 },

    /// Header version differs from the one this reader supports
    #[error("{}: unsupported version {found:?} (expected {expected:?})", path.display())]
    UnsupportedVersion {
        path: PathBuf,
        expected: &'static str,
        found: Option<String>,
    },

    /// Token mismatch in a text section
    #[error("{}:{line}: expected {expected:?}, found {found:?}", path.display())]
    UnexpectedToken {
        path: PathBuf,
        line: usize,
        expected: String,
        found: String,
    },

    /// A number was expected but the token does not parse
    #[error("{}:{line}: expected number for {label}, found {found:?}", path.display())]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        label: &'static str,
        found: String,
    },

    /// HMM position token is not one of `b e s i -`
    #[error("{}:{line}: invalid HMM position {found:?}", path.display())]
    InvalidPosition {
        path: PathBuf,
        line: usize,
        found: String,
    },

    /// A count field holds a negative value
    #[error("{}: negative count for {label}: {value}", path.display())]
    NegativeCount {
        path: PathBuf,
        label: &'static str,
        value: i64,
    },

    /// Stream ended before the expected data
    #[error("{}: unexpected end of file", path.display())]
    Truncated { path: PathBuf },

    /// IO error while reading a model file
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FormatError {
    /// Wrap an IO error for `path`, mapping early EOF to [`FormatError::Truncated`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::UnexpectedEof => FormatError::Truncated { path },
            _ => FormatError::Io { path, source },
        }
    }
}

/// Load-time consistency violations between pools and the model definition.
#[derive(Debug, Error)]
pub enum InvariantError {
    /// Two pool sizes that must agree do not
    #[error("{what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Product of header counts does not fit in `usize`
    #[error("{what}: count product overflows")]
    CountOverflow { what: &'static str },

    /// Gaussians per state must be positive
    #[error("number of gaussians per state must be positive")]
    NoGaussians,

    /// Only single-stream models are supported
    #[error("{}: expected 1 feature stream, got {streams}", path.display())]
    MultipleStreams { path: PathBuf, streams: usize },

    /// Record ids must be dense `0..len`
    #[error("pool {pool}: id {id} is not the next dense id {next}")]
    NonDenseId {
        pool: String,
        id: usize,
        next: usize,
    },

    /// Senone id outside the range allowed for its phone class
    #[error("{unit}: senone id {id} outside {start}..{end}")]
    StateIdOutOfRange {
        unit: String,
        id: usize,
        start: usize,
        end: usize,
    },

    /// Transition matrix index past the tied matrix count
    #[error("{unit}: transition matrix {index} out of range (count {count})")]
    TransitionMatrixOutOfRange {
        unit: String,
        index: usize,
        count: usize,
    },

    /// Model definition yields an unusable HMM topology
    #[error("invalid HMM topology: {0}")]
    Topology(String),
}

/// Query-time errors. Apart from `NotAllocated`, these signal corrupted in-memory state.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Query issued before a successful `allocate()`
    #[error("acoustic model is not allocated")]
    NotAllocated,

    /// No context-independent unit exists for the base name
    #[error("no context-independent unit named {name:?}")]
    MissingContextIndependentUnit { name: String },

    /// The context-independent unit exists but has no undefined-position HMM
    #[error("no context-independent HMM for {unit}")]
    MissingContextIndependentHmm { unit: String },
}

/// Result type alias for tiedstate operations.
pub type Result<T> = std::result::Result<T, Error>;

// Nested From implementations for automatic error conversion chains

// std::io::Error → ConfigError → Error
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(ConfigError::Io(e))
    }
}

// serde_json::Error → ConfigError → Error
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(ConfigError::Json(e))
    }
}
