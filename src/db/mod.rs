//! Database abstraction layer for bookstore-queries.
//!
//! Provides a trait-based interface over the book collection, allowing the
//! query runner to work against a live MongoDB server or an in-memory store.

mod memory;
mod mongo;
mod query;
mod types;

pub use memory::{MemoryStore, StoreOperation};
pub use mongo::MongoStore;
pub use query::{BookFilter, FindSpec, Page, SortField, SortSpec};
pub use types::{
    AuthorCount, Book, BookSummary, DecadeGroup, DeleteOutcome, GenreAveragePrice, IndexSpec,
    SortOrder, UpdateOutcome,
};

use crate::config::ConnectionConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Connects to the MongoDB collection described by the configuration.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn BookStore>> {
    let store = MongoStore::connect(config).await?;
    Ok(Box::new(store))
}

/// Operations the query runner performs against one book collection.
///
/// All operations are async and return Results with BookstoreError.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Short description of where the records live, for log and report output.
    fn describe(&self) -> String;

    /// Reads full records.
    async fn find(&self, spec: &FindSpec) -> Result<Vec<Book>>;

    /// Reads records projected to title, author and price.
    async fn find_summaries(&self, filter: &BookFilter) -> Result<Vec<BookSummary>>;

    /// Reads the first record matching the filter, in storage order.
    async fn find_one(&self, filter: &BookFilter) -> Result<Option<Book>>;

    /// Sets the price of the first record with the given title.
    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome>;

    /// Deletes the first record with the given title.
    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome>;

    /// Mean price per genre, highest first.
    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>>;

    /// The author with the most records, or None for an empty collection.
    async fn top_author(&self) -> Result<Option<AuthorCount>>;

    /// Record counts and titles per publication decade, earliest first.
    async fn books_by_decade(&self) -> Result<Vec<DecadeGroup>>;

    /// Declares an index and returns its name.
    async fn create_index(&self, index: &IndexSpec) -> Result<String>;

    /// Returns execution statistics for a lookup by title.
    async fn explain_title_lookup(&self, title: &str) -> Result<serde_json::Value>;

    /// Releases the connection.
    async fn close(&self) -> Result<()>;
}

/// Lets a caller keep a handle on a store it hands to the runner.
#[async_trait]
impl<T: BookStore + ?Sized> BookStore for Arc<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn find(&self, spec: &FindSpec) -> Result<Vec<Book>> {
        (**self).find(spec).await
    }

    async fn find_summaries(&self, filter: &BookFilter) -> Result<Vec<BookSummary>> {
        (**self).find_summaries(filter).await
    }

    async fn find_one(&self, filter: &BookFilter) -> Result<Option<Book>> {
        (**self).find_one(filter).await
    }

    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome> {
        (**self).update_price(title, price).await
    }

    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome> {
        (**self).delete_by_title(title).await
    }

    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>> {
        (**self).average_price_by_genre().await
    }

    async fn top_author(&self) -> Result<Option<AuthorCount>> {
        (**self).top_author().await
    }

    async fn books_by_decade(&self) -> Result<Vec<DecadeGroup>> {
        (**self).books_by_decade().await
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        (**self).create_index(index).await
    }

    async fn explain_title_lookup(&self, title: &str) -> Result<serde_json::Value> {
        (**self).explain_title_lookup(title).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
