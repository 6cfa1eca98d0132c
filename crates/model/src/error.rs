use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The socket or HTTP layer failed, including non-success statuses.
    Transport,
    /// The response body violates the server-sent events framing.
    MalformedStream,
    /// A payload could not be decoded into the expected shape.
    Decode,
    /// The provider broke the streaming contract, e.g. an unexpected role
    /// or candidate count.
    Protocol,
    /// The caller cancelled the call.
    Cancelled,
    /// The request was rejected before being sent.
    InvalidRequest,
    /// The provider doesn't support the operation.
    Unsupported,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::MalformedStream => write!(f, "malformed stream"),
            ErrorKind::Decode => write!(f, "decode error"),
            ErrorKind::Protocol => write!(f, "protocol error"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::InvalidRequest => write!(f, "invalid request"),
            ErrorKind::Unsupported => write!(f, "not supported"),
        }
    }
}

/// The error type shared by adapters, transports and the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
}

impl Error {
    /// Creates an error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Creates a [`ErrorKind::Transport`] error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Creates a [`ErrorKind::MalformedStream`] error.
    #[inline]
    pub fn malformed_stream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedStream, message)
    }

    /// Creates a [`ErrorKind::Decode`] error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    /// Creates a [`ErrorKind::Protocol`] error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Creates a [`ErrorKind::Cancelled`] error.
    #[inline]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Creates a [`ErrorKind::InvalidRequest`] error.
    #[inline]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Creates a [`ErrorKind::Unsupported`] error.
    #[inline]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Attaches the HTTP status code of the failed response.
    #[inline]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status code, if the error came from a response.
    #[inline]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns `true` if the caller cancelled the call.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => {
                write!(f, "{} (http {status}): {}", self.kind, self.message)
            }
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl StdError for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::transport("connection reset");
        assert_eq!(err.to_string(), "transport error: connection reset");

        let err = Error::transport("bad key").with_status(401);
        assert_eq!(err.to_string(), "transport error (http 401): bad key");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_kind() {
        assert!(Error::cancelled("stop").is_cancelled());
        assert!(!Error::protocol("role").is_cancelled());
        assert_eq!(Error::decode("x").kind(), ErrorKind::Decode);
    }
}
