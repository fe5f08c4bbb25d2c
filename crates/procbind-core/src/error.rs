//! Error types for procbind

use thiserror::Error;

/// Core error type for procbind operations
#[derive(Error, Debug)]
pub enum ProcbindError {
    /// No usable connection could be obtained; nothing was executed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Parameter name or type does not match the procedure signature.
    #[error("Bind error: {0}")]
    Bind(String),

    /// The database rejected the statement at runtime.
    #[error("{0}")]
    Execution(String),

    /// A result row could not be turned into an entity.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A bound attribute could not be read from its owner.
    #[error("Access error: {0}")]
    Access(String),

    /// Attribute metadata is structurally inconsistent.
    #[error("Argument error: {0}")]
    Argument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by callers to branch on a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Bind,
    Execution,
    Mapping,
    Access,
    Argument,
    Configuration,
    Other,
}

impl ProcbindError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcbindError::Connection(_) | ProcbindError::Timeout(_) => ErrorKind::Connection,
            ProcbindError::Bind(_) => ErrorKind::Bind,
            ProcbindError::Execution(_) => ErrorKind::Execution,
            ProcbindError::Mapping(_) => ErrorKind::Mapping,
            ProcbindError::Access(_) => ErrorKind::Access,
            ProcbindError::Argument(_) => ErrorKind::Argument,
            ProcbindError::Configuration(_) => ErrorKind::Configuration,
            ProcbindError::NotSupported(_)
            | ProcbindError::Io(_)
            | ProcbindError::Serialization(_)
            | ProcbindError::Other(_) => ErrorKind::Other,
        }
    }

    /// The bare failure cause, without the variant prefix
    pub fn cause(&self) -> String {
        match self {
            ProcbindError::Connection(msg)
            | ProcbindError::Bind(msg)
            | ProcbindError::Execution(msg)
            | ProcbindError::Mapping(msg)
            | ProcbindError::Access(msg)
            | ProcbindError::Argument(msg)
            | ProcbindError::Configuration(msg)
            | ProcbindError::NotSupported(msg)
            | ProcbindError::Timeout(msg)
            | ProcbindError::Other(msg) => msg.clone(),
            ProcbindError::Io(err) => err.to_string(),
            ProcbindError::Serialization(err) => err.to_string(),
        }
    }
}

/// Result type alias for procbind operations
pub type Result<T> = std::result::Result<T, ProcbindError>;
