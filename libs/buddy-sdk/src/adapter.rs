//! Helpers for CRUD adapters sitting between the declarative engine and the
//! facades.

use buddy_http::{ErrorKind, HttpError, RawResponse};

/// Result of a read that tolerates a missing resource
#[derive(Debug)]
pub enum ReadOutcome<T> {
    Present(T, RawResponse),
    /// The server answered 404; the resource should be dropped from state
    Absent,
}

impl<T> ReadOutcome<T> {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The record, if present
    #[must_use]
    pub fn into_record(self) -> Option<T> {
        match self {
            Self::Present(record, _) => Some(record),
            Self::Absent => None,
        }
    }
}

/// Translate a facade read into a [`ReadOutcome`].
///
/// # Errors
///
/// Every error other than a 404 is passed through.
pub fn read_outcome<T>(
    result: Result<(T, RawResponse), HttpError>,
) -> Result<ReadOutcome<T>, HttpError> {
    match result {
        Ok((record, raw)) => Ok(ReadOutcome::Present(record, raw)),
        Err(err) if err.is_not_found() => {
            if let Some(response) = err.response() {
                tracing::debug!(
                    method = %response.method,
                    url = %response.url,
                    "resource no longer exists"
                );
            }
            Ok(ReadOutcome::Absent)
        }
        Err(err) => Err(err),
    }
}

/// Engine-facing diagnostic for a failed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub summary: String,
    pub detail: String,
}

/// Diagnostic for `err` raised while performing `operation` (e.g. "create project").
///
/// The detail is the error's display form, which for non-success responses
/// is the full error record: request line, status and flattened message.
#[must_use]
pub fn diagnostic(operation: &str, err: &HttpError) -> Diagnostic {
    let summary = match err.kind() {
        ErrorKind::Config => format!("Invalid request to {operation}"),
        ErrorKind::Transport => format!("Unable to reach the Buddy API to {operation}"),
        ErrorKind::Timeout => format!("Timed out trying to {operation}"),
        ErrorKind::Http => format!("Failed to {operation}"),
        ErrorKind::Decode => format!("Unexpected response while trying to {operation}"),
    };

    Diagnostic {
        summary,
        detail: err.to_string(),
    }
}
