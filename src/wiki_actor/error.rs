//! Error types for the wiki database actor.

use crate::framework::BusError;
use crate::store::StoreError;
use thiserror::Error;

/// Numeric codes carried by failure replies on the wiki queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    NoActionSpecified = 0,
    BadAction = 1,
    DbError = 2,
    MalformedRequest = 3,
}

impl ErrorCode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ErrorCode::NoActionSpecified),
            1 => Some(ErrorCode::BadAction),
            2 => Some(ErrorCode::DbError),
            3 => Some(ErrorCode::MalformedRequest),
            _ => None,
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

/// Ways a request on the wiki queue can fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WikiError {
    /// The envelope carried no `action` header.
    #[error("No action header specified")]
    NoActionSpecified,

    /// The `action` header named no known operation.
    #[error("Bad action: {0}")]
    BadAction(String),

    /// The store failed. Only the cause's message text is kept.
    #[error("{0}")]
    DbError(String),

    /// The body lacked a field the action needs, or had it in the wrong shape.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl WikiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WikiError::NoActionSpecified => ErrorCode::NoActionSpecified,
            WikiError::BadAction(_) => ErrorCode::BadAction,
            WikiError::DbError(_) => ErrorCode::DbError,
            WikiError::MalformedRequest(_) => ErrorCode::MalformedRequest,
        }
    }

    /// Rebuilds the error from a failure reply's code and message.
    pub fn from_failure(code: i32, message: &str) -> Option<Self> {
        let error = match ErrorCode::from_code(code)? {
            ErrorCode::NoActionSpecified => WikiError::NoActionSpecified,
            ErrorCode::BadAction => WikiError::BadAction(
                message
                    .strip_prefix("Bad action: ")
                    .unwrap_or(message)
                    .to_owned(),
            ),
            ErrorCode::DbError => WikiError::DbError(message.to_owned()),
            ErrorCode::MalformedRequest => WikiError::MalformedRequest(
                message
                    .strip_prefix("Malformed request: ")
                    .unwrap_or(message)
                    .to_owned(),
            ),
        };
        Some(error)
    }
}

impl From<StoreError> for WikiError {
    fn from(error: StoreError) -> Self {
        WikiError::DbError(error.to_string())
    }
}

/// Start-up failures of the database actor. Any of them leaves the actor
/// `Failed`.
#[derive(Debug, Error)]
pub enum DatabaseStartError {
    #[error("Couldn't open a database connection: {0}")]
    Connect(#[source] StoreError),

    #[error("Database preparation error: {0}")]
    Schema(#[source] StoreError),

    #[error("Couldn't register on queue '{queue}': {source}")]
    Register {
        queue: String,
        #[source]
        source: BusError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_round_trips_through_code_and_message() {
        let errors = [
            WikiError::NoActionSpecified,
            WikiError::BadAction("bogus".into()),
            WikiError::DbError("disk full".into()),
            WikiError::MalformedRequest("missing field `page`".into()),
        ];
        for error in errors {
            let code: i32 = error.code().into();
            assert_eq!(WikiError::from_failure(code, &error.to_string()), Some(error));
        }
    }

    #[test]
    fn unknown_codes_are_not_wiki_errors() {
        assert_eq!(WikiError::from_failure(-1, "whatever"), None);
    }

    #[test]
    fn store_errors_keep_only_their_message() {
        let error: WikiError = StoreError::DuplicateName("Home".into()).into();
        assert_eq!(
            error,
            WikiError::DbError("Unique constraint violated: page 'Home' already exists".into())
        );
    }
}
