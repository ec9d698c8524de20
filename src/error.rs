//! Error types for the Lit PKP client

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure reported by the Lit network or the contracts client.
///
/// The message and code are carried through unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not initialized")]
    NotInitialized(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A lower-level failure re-wrapped with the name of the failing operation.
    #[error("{context}: {source}")]
    Operation {
        context: &'static str,
        #[source]
        source: Box<Error>,
    },
}

/// Root category of an [`Error`], looking through operation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotInitialized,
    InvalidArgument,
    Precondition,
    Authorization,
    Remote,
    Wallet,
    Storage,
    Config,
    Json,
}

impl Error {
    /// Prefix this error with the operation that produced it.
    pub fn context(self, context: &'static str) -> Self {
        Error::Operation {
            context,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any operation wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Operation { source, .. } => source.kind(),
            Error::NotInitialized(_) => ErrorKind::NotInitialized,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Precondition(_) => ErrorKind::Precondition,
            Error::Authorization(_) => ErrorKind::Authorization,
            Error::Remote(_) => ErrorKind::Remote,
            Error::Wallet(_) => ErrorKind::Wallet,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Config(_) => ErrorKind::Config,
            Error::Json(_) => ErrorKind::Json,
        }
    }

    /// The remote failure at the root of this error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self.root() {
            Error::Remote(remote) => Some(remote),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
