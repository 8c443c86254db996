//! Shared fixtures for integration tests.

use std::path::PathBuf;

use bookstore_queries::db::{Book, MemoryStore};

/// Path of the bundled book fixture.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/books.json")
}

/// Records from the bundled fixture.
pub fn fixture_books() -> Vec<Book> {
    let content = std::fs::read_to_string(fixture_path()).unwrap();
    serde_json::from_str(&content).unwrap()
}

/// In-memory store seeded with the bundled fixture.
pub fn fixture_store() -> MemoryStore {
    MemoryStore::from_json_file(&fixture_path()).unwrap()
}
