//! Canonical book records and the informal book snapshot captured on drafts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a canonical book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(pub Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A deduplicated catalog record that a published review ultimately references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub authors: Vec<String>,
    pub isbn13: Option<String>,
    pub publisher: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Informal book description captured before a canonical book exists.
///
/// Deserialized from a draft's `book_data` JSON. Accepts either an `authors`
/// array (search-provider shape) or a single `author` string. Unknown keys are
/// ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BookData {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, alias = "isbn13", skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl BookData {
    /// Parse a serialized snapshot. Only a JSON object is accepted.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        match serde_json::from_str::<serde_json::Value>(raw)? {
            value @ serde_json::Value::Object(_) => serde_json::from_value(value),
            _ => Err(<serde_json::Error as serde::de::Error>::custom(
                "book data must be a JSON object",
            )),
        }
    }

    /// First listed author, falling back to the single `author` field.
    pub fn first_author(&self) -> Option<&str> {
        self.authors
            .iter()
            .map(String::as_str)
            .chain(self.author.as_deref())
            .map(str::trim)
            .find(|a| !a.is_empty())
    }

    /// All authors, with a lone `author` field promoted to a one-element list.
    pub fn all_authors(&self) -> Vec<String> {
        if !self.authors.is_empty() {
            return self.authors.clone();
        }
        self.author.iter().cloned().collect()
    }

    /// A usable ISBN-13: 13 digits once hyphens and spaces are removed.
    ///
    /// Search providers often send "isbn10 isbn13" in one field; the last
    /// 13-digit token wins.
    pub fn isbn13(&self) -> Option<String> {
        self.isbn.as_deref().and_then(|raw| {
            raw.split_whitespace()
                .map(|token| token.replace('-', ""))
                .filter(|token| token.len() == 13 && token.chars().all(|c| c.is_ascii_digit()))
                .last()
        })
    }
}

/// Request to create a canonical book during sync.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub title: String,
    pub authors: Vec<String>,
    pub isbn13: Option<String>,
    pub publisher: Option<String>,
    pub thumbnail: Option<String>,
}

impl From<&BookData> for NewBook {
    fn from(data: &BookData) -> Self {
        Self {
            title: data.title.trim().to_string(),
            authors: data.all_authors(),
            isbn13: data.isbn13(),
            publisher: data.publisher.clone(),
            thumbnail: data.thumbnail.clone(),
        }
    }
}

/// Normalize a title or author name into an exact-match key.
///
/// Lowercases, trims, and collapses internal whitespace runs to one space.
///
/// ```
/// use readzone_types::book::match_key;
///
/// assert_eq!(match_key("  The   Little Prince "), "the little prince");
/// ```
pub fn match_key(s: &str) -> String {
    s.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
