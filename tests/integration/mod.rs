//! Integration tests for bookstore-queries.

pub mod common;
pub mod mongo_test;
pub mod runner_test;
