//! Backend-neutral read descriptions.
//!
//! A `FindSpec` says which books to read and in what order. `MongoStore`
//! turns it into filter and option documents, `MemoryStore` evaluates it
//! directly against its records.

use super::types::{Book, SortOrder};
use crate::error::{BookstoreError, Result};
use mongodb::bson::{doc, Document};
use std::cmp::Ordering;

/// Which records a read selects.
#[derive(Debug, Clone, PartialEq)]
pub enum BookFilter {
    /// Every record.
    All,
    /// `genre` equal to the value (exact, case-sensitive).
    Genre(String),
    /// `author` equal to the value.
    Author(String),
    /// `title` equal to the value.
    Title(String),
    /// `published_year` strictly greater than the value.
    PublishedAfter(i32),
    /// `in_stock` is true and `published_year` strictly greater than the value.
    InStockPublishedAfter(i32),
}

impl BookFilter {
    /// Returns the MongoDB filter document.
    pub fn to_document(&self) -> Document {
        match self {
            Self::All => doc! {},
            Self::Genre(genre) => doc! { "genre": genre.as_str() },
            Self::Author(author) => doc! { "author": author.as_str() },
            Self::Title(title) => doc! { "title": title.as_str() },
            Self::PublishedAfter(year) => doc! { "published_year": { "$gt": *year } },
            Self::InStockPublishedAfter(year) => doc! {
                "in_stock": true,
                "published_year": { "$gt": *year },
            },
        }
    }

    /// Returns true if the book satisfies the filter.
    ///
    /// A missing field never equals a value and is never greater than one.
    pub fn matches(&self, book: &Book) -> bool {
        match self {
            Self::All => true,
            Self::Genre(genre) => book.genre.as_deref() == Some(genre.as_str()),
            Self::Author(author) => book.author.as_deref() == Some(author.as_str()),
            Self::Title(title) => book.title.as_deref() == Some(title.as_str()),
            Self::PublishedAfter(year) => book.published_year.is_some_and(|y| y > *year),
            Self::InStockPublishedAfter(year) => {
                book.in_stock == Some(true) && book.published_year.is_some_and(|y| y > *year)
            }
        }
    }
}

/// Field a read can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Title,
}

impl SortField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Title => "title",
        }
    }
}

/// Ordering applied to a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn ascending(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Descending,
        }
    }

    /// Returns the MongoDB sort document.
    pub fn to_document(self) -> Document {
        let mut sort = Document::new();
        sort.insert(self.field.as_str(), self.order.as_i32());
        sort
    }

    /// Compares two books under this ordering. Missing values sort lowest.
    pub fn compare(self, a: &Book, b: &Book) -> Ordering {
        let ord = match self.field {
            SortField::Price => match (a.price, b.price) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            },
            SortField::Title => a.title.cmp(&b.title),
        };
        match self.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// A one-based page of fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u64,
    size: u64,
}

impl Page {
    /// Creates a page; both the number and the size must be at least 1.
    pub fn new(number: u64, size: u64) -> Result<Self> {
        if number == 0 {
            return Err(BookstoreError::config("page must be at least 1"));
        }
        if size == 0 {
            return Err(BookstoreError::config("page_size must be at least 1"));
        }
        if i64::try_from(size).is_err() || number.checked_mul(size).is_none() {
            return Err(BookstoreError::config(format!(
                "page {number} with page_size {size} is out of range"
            )));
        }
        Ok(Self { number, size })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Records skipped before this page: `(number - 1) * size`.
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.size
    }
}

/// A complete read: filter, ordering and window.
#[derive(Debug, Clone, PartialEq)]
pub struct FindSpec {
    pub filter: BookFilter,
    pub sort: Option<SortSpec>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindSpec {
    /// Reads every record matching the filter in storage order.
    pub fn new(filter: BookFilter) -> Self {
        Self {
            filter,
            sort: None,
            skip: 0,
            limit: None,
        }
    }

    pub fn sorted(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Restricts the read to one page.
    pub fn page(mut self, page: Page) -> Self {
        self.skip = page.offset();
        self.limit = Some(page.size());
        self
    }

    /// Applies ordering and window to records already in storage order.
    pub fn apply(&self, books: &[Book]) -> Vec<Book> {
        let mut selected: Vec<Book> = books
            .iter()
            .filter(|book| self.filter.matches(book))
            .cloned()
            .collect();

        // Stable, so ties stay in storage order.
        if let Some(sort) = self.sort {
            selected.sort_by(|a, b| sort.compare(a, b));
        }

        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        selected.into_iter().skip(skip).take(limit).collect()
    }
}
