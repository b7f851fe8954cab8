use std::{any::Any, io, result::Result as StdResult};

use serde::{Deserialize, Serialize};

/// Failure categories that survive a trip across the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    DuplicateRegistration,
    UnresolvedProxy,
    UnknownMethod,
    ChannelClosed,
    MalformedIdentifier,
    ListenerFailure,
    MissingWorkspaceContext,
    UnknownCommand,
    InvalidArguments,
    Internal,
}

/// Error payload of an `error` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} is already registered")]
    DuplicateRegistration(String),
    #[error("no service bound to proxy identifier {0}")]
    UnresolvedProxy(String),
    #[error("{target} has no method {method}")]
    UnknownMethod { target: String, method: String },
    #[error("channel closed")]
    ChannelClosed,
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),
    #[error("listener for {topic} failed: {reason}")]
    ListenerFailure { topic: &'static str, reason: String },
    #[error("workspace {0} is not registered")]
    MissingWorkspaceContext(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },
    #[error("internal error: {0}")]
    Internal(String),
    #[error("remote error ({kind:?}): {message}")]
    Remote { kind: ErrorKind, message: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    pub fn invalid_arguments(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// The category of this error. Remote errors report the kind raised on
    /// the other side.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateRegistration(_) => ErrorKind::DuplicateRegistration,
            Self::UnresolvedProxy(_) => ErrorKind::UnresolvedProxy,
            Self::UnknownMethod { .. } => ErrorKind::UnknownMethod,
            Self::ChannelClosed => ErrorKind::ChannelClosed,
            Self::MalformedIdentifier(_) => ErrorKind::MalformedIdentifier,
            Self::ListenerFailure { .. } => ErrorKind::ListenerFailure,
            Self::MissingWorkspaceContext(_) => ErrorKind::MissingWorkspaceContext,
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::Remote { kind, .. } => *kind,
            Self::Internal(_) | Self::Io(_) | Self::Json(_) | Self::Watch(_) => ErrorKind::Internal,
        }
    }

    pub fn to_remote(&self) -> RemoteError {
        let message = match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        };
        RemoteError {
            kind: self.kind(),
            message,
        }
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        Self::Remote {
            kind: e.kind,
            message: e.message,
        }
    }
}

pub type Result<T> = StdResult<T, Error>;

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
