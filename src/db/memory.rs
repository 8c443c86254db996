//! In-memory book store.
//!
//! Used by `--mock-db` for offline runs and by the test suite. Records keep
//! insertion order, which stands in for the server's natural order wherever
//! MongoDB leaves ordering unspecified.

use super::{
    AuthorCount, Book, BookFilter, BookStore, BookSummary, DecadeGroup, DeleteOutcome, FindSpec,
    GenreAveragePrice, IndexSpec, UpdateOutcome,
};
use crate::error::{BookstoreError, Result};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

/// Operations that can be told to fail, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Find,
    FindSummaries,
    FindOne,
    UpdatePrice,
    DeleteByTitle,
    Aggregate,
    CreateIndex,
    Explain,
    Close,
}

/// A book collection held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: RwLock<Vec<Book>>,
    indexes: RwLock<Vec<IndexSpec>>,
    fail_on: Option<StoreOperation>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given records, assigning ids where missing.
    pub fn with_books(books: Vec<Book>) -> Self {
        let books = books
            .into_iter()
            .map(|mut book| {
                book.id.get_or_insert_with(ObjectId::new);
                book
            })
            .collect();
        Self {
            books: RwLock::new(books),
            ..Self::default()
        }
    }

    /// Loads records from a JSON file holding an array of books.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BookstoreError::config(format!("Failed to read seed file {}: {e}", path.display()))
        })?;
        let books: Vec<Book> = serde_json::from_str(&content).map_err(|e| {
            BookstoreError::config(format!("Invalid seed file {}: {e}", path.display()))
        })?;
        debug!("Loaded {} records from {}", books.len(), path.display());
        Ok(Self::with_books(books))
    }

    /// Makes the given operation fail with a query error.
    pub fn failing_on(mut self, operation: StoreOperation) -> Self {
        self.fail_on = Some(operation);
        self
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns a copy of the current records.
    pub async fn snapshot(&self) -> Vec<Book> {
        self.books.read().await.clone()
    }

    fn check(&self, operation: StoreOperation) -> Result<()> {
        if self.fail_on == Some(operation) {
            return Err(BookstoreError::query(format!(
                "{operation:?} failed (injected)"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    async fn find(&self, spec: &FindSpec) -> Result<Vec<Book>> {
        self.check(StoreOperation::Find)?;
        let books = self.books.read().await;
        Ok(spec.apply(&books))
    }

    async fn find_summaries(&self, filter: &BookFilter) -> Result<Vec<BookSummary>> {
        self.check(StoreOperation::FindSummaries)?;
        let books = self.books.read().await;
        Ok(books
            .iter()
            .filter(|book| filter.matches(book))
            .map(Book::summary)
            .collect())
    }

    async fn find_one(&self, filter: &BookFilter) -> Result<Option<Book>> {
        self.check(StoreOperation::FindOne)?;
        let books = self.books.read().await;
        Ok(books.iter().find(|book| filter.matches(book)).cloned())
    }

    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome> {
        self.check(StoreOperation::UpdatePrice)?;
        let mut books = self.books.write().await;
        let Some(book) = books
            .iter_mut()
            .find(|book| book.title.as_deref() == Some(title))
        else {
            return Ok(UpdateOutcome::default());
        };

        // Like `$set`, writing the current value matches but modifies nothing.
        let modified = book.price != Some(price);
        book.price = Some(price);
        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
        })
    }

    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome> {
        self.check(StoreOperation::DeleteByTitle)?;
        let mut books = self.books.write().await;
        let position = books
            .iter()
            .position(|book| book.title.as_deref() == Some(title));
        let deleted_count = match position {
            Some(pos) => {
                books.remove(pos);
                1
            }
            None => 0,
        };
        Ok(DeleteOutcome { deleted_count })
    }

    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>> {
        self.check(StoreOperation::Aggregate)?;
        let books = self.books.read().await;

        // `$avg` skips records without a price; a group with none averages to null.
        let mut order: Vec<Option<&str>> = Vec::new();
        let mut totals: HashMap<Option<&str>, (f64, u32)> = HashMap::new();
        for book in books.iter() {
            let genre = book.genre.as_deref();
            let entry = totals.entry(genre).or_insert_with(|| {
                order.push(genre);
                (0.0, 0)
            });
            if let Some(price) = book.price {
                entry.0 += price;
                entry.1 += 1;
            }
        }

        let mut rows: Vec<GenreAveragePrice> = order
            .into_iter()
            .map(|genre| {
                let (sum, count) = totals[&genre];
                GenreAveragePrice {
                    genre: genre.map(String::from),
                    average_price: (count > 0).then(|| sum / f64::from(count)),
                }
            })
            .collect();
        rows.sort_by(|a, b| compare_averages(b.average_price, a.average_price));
        Ok(rows)
    }

    async fn top_author(&self) -> Result<Option<AuthorCount>> {
        self.check(StoreOperation::Aggregate)?;
        let books = self.books.read().await;

        let mut order: Vec<Option<&str>> = Vec::new();
        let mut counts: HashMap<Option<&str>, i64> = HashMap::new();
        for book in books.iter() {
            let author = book.author.as_deref();
            *counts.entry(author).or_insert_with(|| {
                order.push(author);
                0
            }) += 1;
        }

        // Strictly greater, so the first author seen wins a tie.
        let mut top: Option<(Option<&str>, i64)> = None;
        for author in order {
            let count = counts[&author];
            if top.map_or(true, |(_, best)| count > best) {
                top = Some((author, count));
            }
        }

        Ok(top.map(|(author, total_books)| AuthorCount {
            author: author.map(String::from),
            total_books,
        }))
    }

    async fn books_by_decade(&self) -> Result<Vec<DecadeGroup>> {
        self.check(StoreOperation::Aggregate)?;
        let books = self.books.read().await;

        // Records without a year group under None, which sorts first.
        let mut groups: BTreeMap<Option<i32>, DecadeGroup> = BTreeMap::new();
        for book in books.iter() {
            let decade = book.published_year.map(decade_of);
            let group = groups.entry(decade).or_insert_with(|| DecadeGroup {
                decade,
                total_books: 0,
                titles: Vec::new(),
            });
            group.total_books += 1;
            group.titles.extend(book.title.clone());
        }
        Ok(groups.into_values().collect())
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        self.check(StoreOperation::CreateIndex)?;
        let mut indexes = self.indexes.write().await;
        if !indexes.contains(index) {
            indexes.push(index.clone());
        }
        Ok(index.default_name())
    }

    async fn explain_title_lookup(&self, title: &str) -> Result<serde_json::Value> {
        self.check(StoreOperation::Explain)?;
        let start = Instant::now();
        let books = self.books.read().await;
        let indexes = self.indexes.read().await;

        let returned = books
            .iter()
            .filter(|book| book.title.as_deref() == Some(title))
            .count();
        let elapsed = start.elapsed().as_millis() as u64;

        let stats = match indexes.iter().find(|index| index.leads_with("title")) {
            Some(index) => json!({
                "executionSuccess": true,
                "nReturned": returned,
                "executionTimeMillis": elapsed,
                "totalKeysExamined": returned,
                "totalDocsExamined": returned,
                "executionStages": {
                    "stage": "FETCH",
                    "nReturned": returned,
                    "docsExamined": returned,
                    "inputStage": {
                        "stage": "IXSCAN",
                        "nReturned": returned,
                        "indexName": index.default_name(),
                        "keysExamined": returned,
                    }
                }
            }),
            None => json!({
                "executionSuccess": true,
                "nReturned": returned,
                "executionTimeMillis": elapsed,
                "totalKeysExamined": 0,
                "totalDocsExamined": books.len(),
                "executionStages": {
                    "stage": "COLLSCAN",
                    "nReturned": returned,
                    "docsExamined": books.len(),
                }
            }),
        };
        Ok(stats)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.check(StoreOperation::Close)
    }
}

/// Orders averages the way the server sorts them: null below any number.
fn compare_averages(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (x, y) => x.is_some().cmp(&y.is_some()),
    }
}

/// `floor(year / 10) * 10`, rounding toward negative infinity.
fn decade_of(year: i32) -> i32 {
    year.div_euclid(10) * 10
}
