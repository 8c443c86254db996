//! bookstore-queries - runs a fixed batch of MongoDB operations over a book collection.
//!
//! This library exposes the core modules for use by the binary and in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod runner;
