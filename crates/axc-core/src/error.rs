use thiserror::Error;

pub type AxcResult<T> = Result<T, AxcError>;

/// Machine-checkable failure category. Callers branch on this, never on the
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    InvalidArgument,
    InvalidOperation,
    ObjectDisposed,
    InternalError,
    FileFormatError,
    DataIntegrity,
    CryptoPadding,
    Cancelled,
    Io,
}

#[derive(Debug, Error)]
pub enum AxcError {
    /// A required argument was missing or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not valid in the current state of the object.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("object disposed: {0}")]
    Disposed(&'static str),

    /// A contract between internal components was broken.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("file format error: {0}")]
    FileFormat(String),

    /// The stored HMAC does not match the one computed over the container.
    #[error("data integrity check failed: {0}")]
    DataIntegrity(String),

    #[error("invalid cipher padding")]
    CryptoPadding,

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AxcError {
    pub fn status(&self) -> ErrorStatus {
        match self {
            Self::InvalidArgument(_) => ErrorStatus::InvalidArgument,
            Self::InvalidOperation(_) => ErrorStatus::InvalidOperation,
            Self::Disposed(_) => ErrorStatus::ObjectDisposed,
            Self::Internal(_) => ErrorStatus::InternalError,
            Self::FileFormat(_) => ErrorStatus::FileFormatError,
            Self::DataIntegrity(_) => ErrorStatus::DataIntegrity,
            Self::CryptoPadding => ErrorStatus::CryptoPadding,
            Self::Cancelled => ErrorStatus::Cancelled,
            Self::Io(_) => ErrorStatus::Io,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
