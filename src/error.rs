//! Defines error types.

use std::fmt::Debug;
use std::sync::Arc;

type BoxedSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// An error reported by the device interface through a `Failure` outcome.
///
/// Cheap to clone; the wrapped error is shared.
#[derive(Clone)]
pub struct TransportError(BoxedSource);

impl TransportError {
    /// Wraps any error (or a plain message) reported by the transport.
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self(Arc::from(err.into()))
    }

    /// Returns the wrapped error.
    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl std::fmt::Debug for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransportError({:?})", self.0)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}

/// An error produced while encoding or decoding a characteristic value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecError {
    message: String,
}

impl CodecError {
    pub fn new<S: ToString>(message: S) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    /// Checks `bytes` has exactly `expected` bytes.
    pub fn check_len(bytes: &[u8], expected: usize) -> Result<(), Self> {
        if bytes.len() == expected {
            Ok(())
        } else {
            Err(Self::new(format!(
                "expected {expected} bytes, got {}",
                bytes.len()
            )))
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CodecError {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            source: None,
            message: String::new(),
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        let msg = err.0.to_string();
        Error {
            kind: ErrorKind::Transport,
            source: Some(err.0),
            message: msg,
        }
    }
}

/// The error type of the blocking operations.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxedSource>,
    message: String,
}

impl Error {
    pub(crate) fn new<S: ToString>(kind: ErrorKind, message: S) -> Self {
        Error {
            kind,
            source: None,
            message: message.to_string(),
        }
    }

    pub(crate) fn with_source<E, S>(kind: ErrorKind, source: E, message: S) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        S: ToString,
    {
        Error {
            kind,
            source: Some(Arc::new(source)),
            message: message.to_string(),
        }
    }

    pub(crate) fn decode(err: CodecError) -> Self {
        let msg = format!("cannot decode the received value: {err}");
        Self::with_source(ErrorKind::ReadFailed, err, msg)
    }

    pub(crate) fn encode(err: CodecError) -> Self {
        let msg = format!("cannot encode the value to write: {err}");
        Self::with_source(ErrorKind::WriteFailed, err, msg)
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", &self.kind)
        } else {
            write!(f, "{}: {}", &self.kind, &self.message)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = &**x;
            x
        })
    }
}

/// Categories of bridge errors.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// a received value could not be decoded
    ReadFailed,
    /// a value could not be encoded for writing
    WriteFailed,
    /// the operation was cancelled by the device
    Cancelled,
    /// timed out waiting for notifications
    ListenTimedOut,
    /// the device reported a transport failure
    Transport,
    /// the characteristic is already subscribed
    AlreadySubscribed,
    /// the event loop is not running
    NotRunning,
    /// blocking call issued from the event loop thread
    EventLoopThread,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ReadFailed => f.write_str("a received value could not be decoded"),
            ErrorKind::WriteFailed => f.write_str("a value could not be encoded for writing"),
            ErrorKind::Cancelled => f.write_str("the operation was cancelled by the device"),
            ErrorKind::ListenTimedOut => f.write_str("timed out waiting for notifications"),
            ErrorKind::Transport => f.write_str("the device reported a transport failure"),
            ErrorKind::AlreadySubscribed => f.write_str("the characteristic is already subscribed"),
            ErrorKind::NotRunning => f.write_str("the event loop is not running"),
            ErrorKind::EventLoopThread => {
                f.write_str("blocking call issued from the event loop thread")
            }
        }
    }
}
