//! Error types for dot1x.

use thiserror::Error;

/// Result type alias using the `dot1x` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dot1x operations.
///
/// Malformed packets never surface here: the receive paths discard them
/// silently and bump the relevant per-port counter. This enum covers the
/// management surface, configuration loading, and endpoint plumbing.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A supplied parameter is malformed or out of its managed range
    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// The port index does not identify a port of this context
    #[error("Invalid port index {index} (context has {num_ports} ports)")]
    InvalidPort {
        /// The offending 1-based index
        index: u16,
        /// Number of ports in the context
        num_ports: u16,
    },

    /// A length field or buffer size is inconsistent
    #[error("Invalid length: {message}")]
    InvalidLength {
        /// Error message
        message: String,
    },

    /// A MAC or IP address is malformed
    #[error("Invalid address: {message}")]
    InvalidAddress {
        /// Error message
        message: String,
    },

    /// The request cannot be interpreted
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
    },

    /// A parameter value is outside its permitted range
    #[error("Wrong value for {parameter}: {value} not in {range}")]
    WrongValue {
        /// The parameter name
        parameter: String,
        /// The rejected value
        value: u64,
        /// Human-readable permitted range
        range: String,
    },

    /// The operation is not permitted in the current FSM state
    #[error("Wrong state: {message}")]
    WrongState {
        /// Error message
        message: String,
    },

    /// A buffer limit would be exceeded
    #[error("Buffer overflow: {message}")]
    BufferOverflow {
        /// Error message
        message: String,
    },

    /// A field carried a value the protocol does not allow here
    #[error("Unexpected value: {message}")]
    UnexpectedValue {
        /// Error message
        message: String,
    },

    /// The operation would block
    #[error("Operation would block")]
    WouldBlock,

    /// The peer reset the connection
    #[error("Connection reset")]
    ConnectionReset,

    /// The service is shutting down
    #[error("Service closing")]
    ServiceClosing,

    /// An endpoint or device could not be opened
    #[error("Open failed: {message}")]
    OpenFailed {
        /// Error message
        message: String,
    },

    /// A bounded resource pool is exhausted
    #[error("Out of resources: {message}")]
    OutOfResources {
        /// Error message
        message: String,
    },

    /// Memory allocation failed or a fixed arena is full
    #[error("Out of memory: {message}")]
    OutOfMemory {
        /// Error message
        message: String,
    },

    /// A write to an endpoint failed
    #[error("Write failed: {message}")]
    WriteFailed {
        /// Error message
        message: String,
    },

    /// A named object does not exist
    #[error("Object not found: {name}")]
    ObjectNotFound {
        /// The object name
        name: String,
    },

    /// A referenced instance does not exist
    #[error("Instance not found: {name}")]
    InstanceNotFound {
        /// The instance name
        name: String,
    },

    /// The feature is recognised but not implemented
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// The feature name
        feature: String,
    },
}

impl Error {
    /// Creates an invalid-parameter error.
    #[must_use]
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates a wrong-value error for a range violation.
    #[must_use]
    pub fn wrong_value(parameter: impl Into<String>, value: u64, range: impl Into<String>) -> Self {
        Self::WrongValue {
            parameter: parameter.into(),
            value,
            range: range.into(),
        }
    }

    /// Creates an invalid-port error.
    #[must_use]
    pub const fn invalid_port(index: u16, num_ports: u16) -> Self {
        Self::InvalidPort { index, num_ports }
    }

    /// Returns true if this is a range/value error from validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. } | Self::WrongValue { .. } | Self::InvalidPort { .. }
        )
    }

    /// Returns true if this is a would-block error.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}
