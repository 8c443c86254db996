//! Record and result types for the book collection.
//!
//! Defines the document shape stored in the collection and the rows the
//! aggregation and write operations produce.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One book document.
///
/// Every field besides `_id` is optional: the collection has no schema, and a
/// record missing a field (or holding null there) still decodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Book {
    /// Storage-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
}

impl Book {
    /// Creates a complete book without a storage identifier.
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        genre: impl Into<String>,
        published_year: i32,
        price: f64,
        in_stock: bool,
    ) -> Self {
        Self {
            id: None,
            title: Some(title.into()),
            author: Some(author.into()),
            genre: Some(genre.into()),
            published_year: Some(published_year),
            price: Some(price),
            in_stock: Some(in_stock),
        }
    }

    /// Returns the projected view of this book.
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            title: self.title.clone(),
            author: self.author.clone(),
            price: self.price,
        }
    }
}

/// Writes the document as one line of JSON, `_id` as `{"$oid": ...}`.
impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_json(f, self)
    }
}

/// Title, author and price of a book, without `_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl fmt::Display for BookSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_json(f, self)
    }
}

fn write_json<T: Serialize>(f: &mut fmt::Formatter<'_>, value: &T) -> fmt::Result {
    let json = serde_json::to_string(value).map_err(|_| fmt::Error)?;
    f.write_str(&json)
}

/// Mean price of one genre.
///
/// `average_price` is None when no record in the group has a numeric price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenreAveragePrice {
    #[serde(rename = "_id")]
    pub genre: Option<String>,
    #[serde(rename = "avgPrice")]
    pub average_price: Option<f64>,
}

/// Number of books written by one author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorCount {
    #[serde(rename = "_id")]
    pub author: Option<String>,
    #[serde(rename = "totalBooks")]
    pub total_books: i64,
}

/// Books published within one decade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecadeGroup {
    /// None for records without a `published_year`.
    #[serde(rename = "_id")]
    pub decade: Option<i32>,
    #[serde(rename = "totalBooks")]
    pub total_books: i64,
    pub titles: Vec<String>,
}

/// Outcome of a single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matching the filter (0 or 1).
    pub matched_count: u64,
    /// Documents actually changed (0 when the value was already set).
    pub modified_count: u64,
}

/// Outcome of a single-document delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// Direction of an index key or sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Returns the MongoDB direction value (`1` or `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// An index declaration over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortOrder)>,
}

impl IndexSpec {
    /// Single-field index.
    pub fn single(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            keys: vec![(field.into(), order)],
        }
    }

    /// Adds another key to a compound index.
    pub fn then(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.keys.push((field.into(), order));
        self
    }

    /// Returns the name the server assigns by default, e.g. `author_1_published_year_-1`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, order)| format!("{field}_{}", order.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Returns true if the index leads with the given field.
    pub fn leads_with(&self, field: &str) -> bool {
        self.keys.first().is_some_and(|(f, _)| f == field)
    }
}
