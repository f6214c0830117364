//! Error types and result aliases.
//!
//! Only [`Error::UpstreamTimeout`], [`Error::UpstreamFailure`], and
//! [`Error::InvalidCoordinate`] ever reach a caller of
//! [`Engine::query`](crate::Engine::query), and then only as a
//! [`QueryFailure`](crate::engine::QueryFailure) value. Storage errors are
//! absorbed inside the cache.

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or caching geographic context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The upstream fetch exceeded its time bound.
    #[error("upstream request timed out after {seconds}s")]
    UpstreamTimeout {
        /// The configured bound.
        seconds: u64,
    },

    /// The upstream fetch failed for a reason other than a timeout.
    #[error("upstream request failed: {message}")]
    UpstreamFailure {
        /// Description of the failure.
        message: String,
    },

    /// The backing store has no room for a write.
    #[error("storage quota exceeded writing {bytes} bytes to {key}")]
    StorageQuotaExceeded {
        /// Key being written.
        key: String,
        /// Size of the rejected value.
        bytes: usize,
    },

    /// A stored entry could not be deserialized.
    #[error("corrupt cache entry {key}: {message}")]
    CorruptEntry {
        /// Key of the entry.
        key: String,
        /// Deserialization error.
        message: String,
    },

    /// The center coordinate is outside `[-90, 90] x [-180, 180]`.
    #[error("invalid coordinate: ({latitude}, {longitude})")]
    InvalidCoordinate {
        /// Supplied latitude.
        latitude: f64,
        /// Supplied longitude.
        longitude: f64,
    },

    /// A backend operation failed for a reason other than quota.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// Configuration could not be loaded or is out of range.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl Error {
    /// Creates an upstream failure with the given message.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            message: message.into(),
        }
    }

    /// Creates a storage error with the given message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this is an upstream timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpstreamTimeout { .. })
    }

    /// Whether this is a backend capacity failure.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::StorageQuotaExceeded { .. })
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::UpstreamFailure { .. } => "upstream_failure",
            Self::StorageQuotaExceeded { .. } => "storage_quota_exceeded",
            Self::CorruptEntry { .. } => "corrupt_entry",
            Self::InvalidCoordinate { .. } => "invalid_coordinate",
            Self::Storage { .. } => "storage",
            Self::Config { .. } => "config",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}
