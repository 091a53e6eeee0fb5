//! Shared error type across hubwire crates.

use thiserror::Error;

/// Stable error kinds. Callers branch on these, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Peer closed the stream.
    EndOfStream,
    /// Malformed frame, unknown kind, or body/kind mismatch.
    Decode,
    /// Message could not be serialized.
    Encode,
    /// Frame exceeds the configured maximum.
    FrameTooLarge,
    /// Handler refused the request until the peer authenticates.
    Unauthorized,
    /// Business-logic failure reported by a handler.
    Handler,
    /// Handler does not implement the request.
    Unsupported,
    /// Connection was closed locally.
    Closed,
    /// Underlying stream failure.
    Io,
    /// Invalid configuration or registry setup.
    Config,
}

impl ErrorKind {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::EndOfStream => "END_OF_STREAM",
            ErrorKind::Decode => "DECODE",
            ErrorKind::Encode => "ENCODE",
            ErrorKind::FrameTooLarge => "FRAME_TOO_LARGE",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Handler => "HANDLER",
            ErrorKind::Unsupported => "UNSUPPORTED",
            ErrorKind::Closed => "CLOSED",
            ErrorKind::Io => "IO",
            ErrorKind::Config => "CONFIG",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HubError>;

/// Unified error type used by core and service.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("end of stream")]
    EndOfStream,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("unregistered message kind: {0}")]
    UnregisteredKind(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("authentication required")]
    Unauthorized,
    #[error("handler failed: {0}")]
    Handler(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("connection closed")]
    Closed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),
}

impl HubError {
    /// Map to a stable error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HubError::EndOfStream => ErrorKind::EndOfStream,
            HubError::Decode(_) | HubError::UnregisteredKind(_) => ErrorKind::Decode,
            HubError::Encode(_) => ErrorKind::Encode,
            HubError::FrameTooLarge { .. } => ErrorKind::FrameTooLarge,
            HubError::Unauthorized => ErrorKind::Unauthorized,
            HubError::Handler(_) => ErrorKind::Handler,
            HubError::Unsupported(_) => ErrorKind::Unsupported,
            HubError::Closed => ErrorKind::Closed,
            HubError::Io(_) => ErrorKind::Io,
            HubError::Config(_) | HubError::DuplicateRegistration(_) => ErrorKind::Config,
        }
    }

    /// True when the stream can no longer carry frames.
    ///
    /// Dispatch loops stop on terminal errors and keep reading on all others.
    /// `Io` counts as terminal alongside `EndOfStream`: a failed stream read
    /// leaves no frame boundary to resume from, and retrying it would spin.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EndOfStream | ErrorKind::Closed | ErrorKind::Io
        )
    }

    /// Shorthand for the authentication sentinel check.
    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }
}
