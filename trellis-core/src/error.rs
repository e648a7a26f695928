//! Error Types
//!
//! Every failure in Trellis is contained at the nearest boundary: a handler
//! invocation, a page render or an outbound send. The enums below describe
//! what can go wrong at each of those boundaries.
//!
//! - [`HandlerError`]: resolving or running an event handler
//! - [`StateError`]: reading or writing a state field
//! - [`RenderError`]: running a page factory
//! - [`TransportError`]: pushing a message to a socket
//! - [`ProtocolError`]: decoding or encoding a wire frame
//! - [`ConfigError`]: loading configuration
//! - [`TrellisError`]: umbrella type for the server entry points

use thiserror::Error;

use crate::state::FieldKind;

/// A boxed error type for errors raised by user code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type returned by the server entry points.
#[derive(Error, Debug)]
pub enum TrellisError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised while resolving or running a handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The inbound message referenced an id nobody registered.
    #[error("handler not found: {0}")]
    NotFound(String),

    #[error("missing argument `{0}`")]
    MissingArgument(String),

    #[error("invalid argument `{name}`: {source}")]
    InvalidArgument {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),

    /// The handler panicked. The panic payload is kept when it is a string.
    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("background worker pool is closed")]
    PoolClosed,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Custom(BoxError),
}

impl HandlerError {
    /// Build an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap any error raised by user code.
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Custom(Box::new(error))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors raised by state field access.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state `{state}` has no field `{field}`")]
    UnknownField { state: String, field: String },

    #[error("state `{state}` has no handler `{name}`")]
    UnknownHandler { state: String, name: String },

    #[error("field `{field}` of state `{state}` is computed and cannot be set")]
    ReadOnly { state: String, field: String },

    #[error("field `{field}` of state `{state}` expects {expected:?}, got {found:?}")]
    TypeMismatch {
        state: String,
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },

    #[error("field `{field}` could not be converted: {source}")]
    Convert {
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while producing page content.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no page registered for `{0}`")]
    NotFound(String),

    #[error("page factory for `{path}` failed: {source}")]
    Factory {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("page factory for `{path}` panicked: {message}")]
    Panicked { path: String, message: String },
}

impl RenderError {
    /// HTTP status equivalent for this failure.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Factory { .. } | Self::Panicked { .. } => 500,
        }
    }
}

/// Errors raised when pushing a message to a client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection was already closed.
    #[error("connection closed")]
    Closed,

    #[error("socket error: {0}")]
    Socket(String),
}

/// Errors raised by the wire codec.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid MessagePack frame: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    #[error("MessagePack encoding failed: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("text frame is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
}

/// Errors raised by the client-side reconciler model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("connection is closed")]
    Closed,
}

/// Turn a panic payload into something printable.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
