//! Error classification for remote calls.
//!
//! Every failure from the review API collapses into a closed set of six
//! `ErrorKind`s. Three of them (`Unauthorized`, `NotFound`,
//! `InvalidStorage`) are logout-required: handling them must erase the
//! local identity record and return the user to the unregistered view.
//! The mapping is a fixed table, never overridden per call site.

use std::fmt;

/// Closed set of failure categories for remote calls and storage guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 401: the device is not (or no longer) verified.
    Unauthorized,
    /// 404: member or device no longer exists on the server.
    NotFound,
    /// Local identity record is missing required fields. Never produced
    /// by a remote call.
    InvalidStorage,
    /// 400 or any other unexpected non-2xx status.
    BadRequest,
    /// 5xx server-side failure.
    ServerError,
    /// Connection failure: no HTTP response was received at all.
    NetworkError,
}

impl ErrorKind {
    /// Map an HTTP status code to an error kind.
    ///
    /// Only called for non-2xx statuses; connection failures never reach
    /// this point (they are `NetworkError` by construction).
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            400 => Self::BadRequest,
            s if s >= 500 => Self::ServerError,
            _ => Self::BadRequest,
        }
    }

    /// Whether handling this kind must erase local identity state.
    pub fn is_logout_required(self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::NotFound | Self::InvalidStorage
        )
    }
}

/// A classified failure from a remote call or a storage guard.
///
/// Carries the optional server-supplied message so `BadRequest` (and the
/// default fallback path) can surface what the server actually said.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn new(kind: ErrorKind, message: Option<String>) -> Self {
        Self { kind, message }
    }

    /// Classify a non-2xx HTTP response.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        Self::new(ErrorKind::from_status(status), message)
    }

    /// Connection failure: the request never produced a response.
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, Some(detail.into()))
    }

    /// Raised by the storage guard when identity fields are missing.
    pub fn invalid_storage() -> Self {
        Self::new(
            ErrorKind::InvalidStorage,
            Some("No stored credentials found.".into()),
        )
    }

    /// The one user-facing message for this error.
    ///
    /// `BadRequest` has no canned text: it prefers the server-supplied
    /// message and falls back to a generic string, which also covers any
    /// future unknown kind.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Unauthorized => {
                "Your credentials are no longer valid. Please sign in again.".into()
            }
            ErrorKind::NotFound => "Account not found. Please register again.".into(),
            ErrorKind::InvalidStorage => {
                "Stored credentials are damaged. Please sign in again.".into()
            }
            ErrorKind::ServerError => {
                "The server ran into a problem. Please try again later.".into()
            }
            ErrorKind::NetworkError => {
                "Could not reach the server. Check your network connection.".into()
            }
            ErrorKind::BadRequest => self
                .message
                .clone()
                .unwrap_or_else(|| "Something went wrong.".into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    /// Ambient failures (store IO, prompt IO) have no status code; they
    /// classify as `BadRequest` carrying their own description.
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::BadRequest, Some(err.to_string()))
    }
}
