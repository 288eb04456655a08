//! Error types and handling for the Ripple library

use thiserror::Error;

use crate::disruptor::Sequence;

/// Result type alias for Ripple operations
pub type Result<T> = std::result::Result<T, RingError>;

/// Main error type for the Ripple library
#[derive(Error, Debug)]
pub enum RingError {
    /// I/O errors, e.g. failing to spawn a stage thread
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or wiring of the ring buffer
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message describing the configuration issue
        message: String,
    },

    /// A batch handler failed while a stage was processing
    #[error("Handler failed at sequence {sequence}: {source}")]
    Handler {
        /// Sequence being processed when the handler failed
        sequence: Sequence,
        /// Error returned by the handler
        #[source]
        source: anyhow::Error,
    },

    /// CPU affinity errors
    #[error("CPU affinity error: {0}")]
    CpuAffinity(#[from] nix::Error),

    /// System resource errors
    #[error("System resource error: {message}")]
    SystemResource {
        /// Error message describing the system resource issue
        message: String,
    },

    /// Generic error for unexpected conditions.
    /// Used for situations that do not happen in a correctly wired system,
    /// such as a stage thread panicking or a stage being run twice.
    #[error("Unexpected error: {message}")]
    Unexpected {
        /// Error message describing the unexpected condition
        message: String,
    },
}

impl RingError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Wrap a handler failure observed at `sequence`
    pub fn handler(sequence: Sequence, source: anyhow::Error) -> Self {
        Self::Handler { sequence, source }
    }

    /// Create a new system resource error
    pub fn system_resource(message: impl Into<String>) -> Self {
        Self::SystemResource {
            message: message.into(),
        }
    }

    /// Create a new unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Configuration errors are raised at setup time and never retried
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error came out of a handler
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// Check if this error is related to system resources
    pub fn is_system_resource_error(&self) -> bool {
        matches!(self, Self::SystemResource { .. } | Self::CpuAffinity(_) | Self::Io(_))
    }
}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::error::RingError::config(format!($($arg)*))
    };
}
