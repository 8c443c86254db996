//! Error types for bookstore-queries.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for bookstore-queries operations.
#[derive(Error, Debug)]
pub enum BookstoreError {
    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Errors raised by a single database operation (bad filter, failed write, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failures writing the report to the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BookstoreError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

/// Result type alias using BookstoreError.
pub type Result<T> = std::result::Result<T, BookstoreError>;
