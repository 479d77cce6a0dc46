//! Actions understood by the wiki database actor.
//!
//! The `action` header is parsed into an [`Action`] and, together with the
//! body, into a [`WikiRequest`] before anything touches the store. Unknown or
//! missing actions never reach dispatch.

use super::error::WikiError;
use crate::framework::{Envelope, Headers, ACTION_HEADER};
use crate::model::{CreatePage, DeletePage, GetPage, SavePage};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Operation tag carried in the `action` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AllPages,
    GetPage,
    CreatePage,
    SavePage,
    DeletePage,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::AllPages,
        Action::GetPage,
        Action::CreatePage,
        Action::SavePage,
        Action::DeletePage,
    ];

    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::AllPages => "all-pages",
            Action::GetPage => "get-page",
            Action::CreatePage => "create-page",
            Action::SavePage => "save-page",
            Action::DeletePage => "delete-page",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = WikiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| WikiError::BadAction(s.to_owned()))
    }
}

/// A fully decoded request for the wiki queue.
#[derive(Debug, Clone, PartialEq)]
pub enum WikiRequest {
    AllPages,
    GetPage(GetPage),
    CreatePage(CreatePage),
    SavePage(SavePage),
    DeletePage(DeletePage),
}

impl WikiRequest {
    pub fn action(&self) -> Action {
        match self {
            WikiRequest::AllPages => Action::AllPages,
            WikiRequest::GetPage(_) => Action::GetPage,
            WikiRequest::CreatePage(_) => Action::CreatePage,
            WikiRequest::SavePage(_) => Action::SavePage,
            WikiRequest::DeletePage(_) => Action::DeletePage,
        }
    }

    /// Validates the `action` header and extracts the fields it needs.
    pub fn decode(headers: &Headers, body: &Value) -> Result<Self, WikiError> {
        let action: Action = headers
            .get(ACTION_HEADER)
            .ok_or(WikiError::NoActionSpecified)?
            .parse()?;

        Ok(match action {
            Action::AllPages => WikiRequest::AllPages,
            Action::GetPage => WikiRequest::GetPage(fields(body)?),
            Action::CreatePage => WikiRequest::CreatePage(fields(body)?),
            Action::SavePage => WikiRequest::SavePage(fields(body)?),
            Action::DeletePage => WikiRequest::DeletePage(fields(body)?),
        })
    }

    /// Envelope carrying this request, as a caller would send it.
    pub fn into_envelope(self) -> Envelope {
        let action = self.action();
        let body = match self {
            WikiRequest::AllPages => json!({}),
            WikiRequest::GetPage(GetPage { page }) => json!({ "page": page }),
            WikiRequest::CreatePage(CreatePage { title, markdown }) => {
                json!({ "title": title, "markdown": markdown })
            }
            WikiRequest::SavePage(SavePage { id, markdown }) => {
                json!({ "id": id.to_string(), "markdown": markdown })
            }
            WikiRequest::DeletePage(DeletePage { id }) => json!({ "id": id.to_string() }),
        };
        Envelope::new(body).with_action(action.as_str())
    }
}

fn fields<T: DeserializeOwned>(body: &Value) -> Result<T, WikiError> {
    T::deserialize(body).map_err(|e| WikiError::MalformedRequest(e.to_string()))
}
