use serde::{Deserialize, Deserializer, Serialize};

/// A stored wiki page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: i64,
    pub name: String,
    pub content: String,
}

impl Page {
    pub fn new(id: i64, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Body of a `get-page` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPage {
    pub page: String,
}

/// Body of a `create-page` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePage {
    pub title: String,
    pub markdown: String,
}

/// Body of a `save-page` request. `id` travels as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavePage {
    #[serde(serialize_with = "id_as_string", deserialize_with = "id_from_string_or_number")]
    pub id: i64,
    pub markdown: String,
}

/// Body of a `delete-page` request. `id` travels as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletePage {
    #[serde(serialize_with = "id_as_string", deserialize_with = "id_from_string_or_number")]
    pub id: i64,
}

/// Reply to `all-pages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageList {
    pub pages: Vec<String>,
}

/// Reply to `get-page`. `id` and `rawContent` are omitted when not found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLookup {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(
        rename = "rawContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_content: Option<String>,
}

fn id_as_string<S: serde::Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

fn id_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(id) => Ok(id),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid page id '{text}'"))),
    }
}
