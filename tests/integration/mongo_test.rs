//! Live MongoDB integration tests.
//!
//! Runs only when MONGODB_URI points at a reachable server. Each test seeds
//! its own throwaway database and drops it afterwards.

use std::time::{SystemTime, UNIX_EPOCH};

use bookstore_queries::config::{ConnectionConfig, QueryConfig};
use bookstore_queries::db::{
    Book, BookFilter, BookStore, FindSpec, IndexSpec, MongoStore, SortField, SortOrder, SortSpec,
};
use bookstore_queries::runner::Runner;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Client;

use super::common::fixture_books;

/// Helper to get the test server URI from environment.
fn get_test_uri() -> Option<String> {
    std::env::var("MONGODB_URI").ok()
}

fn unique_database(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}_{}_{nanos}", std::process::id())
}

/// Seeds a fresh database with the fixture and connects a store to it.
async fn seeded_store(prefix: &str) -> Option<(MongoStore, Client, String)> {
    let uri = get_test_uri()?;
    let database = unique_database(prefix);

    let client = Client::with_uri_str(&uri).await.ok()?;
    client
        .database(&database)
        .collection::<Book>("books")
        .insert_many(fixture_books())
        .await
        .ok()?;

    let config = ConnectionConfig {
        uri: Some(uri),
        database: Some(database.clone()),
        ..Default::default()
    };
    let store = MongoStore::connect(&config).await.ok()?;
    Some((store, client, database))
}

async fn drop_database(client: &Client, database: &str) {
    client.database(database).drop().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_fails_to_connect() {
    if get_test_uri().is_none() {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    }

    let config = ConnectionConfig {
        uri: Some("mongodb://127.0.0.1:1".to_string()),
        connect_timeout_secs: Some(1),
        ..Default::default()
    };
    let err = MongoStore::connect(&config).await.unwrap_err();
    assert_eq!(err.category(), "Connection Error");
}

#[tokio::test]
async fn test_filters_and_sorts() {
    let Some((store, client, database)) = seeded_store("bookstore_filters").await else {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    };

    let fantasy = store
        .find(&FindSpec::new(BookFilter::Genre("Fantasy".into())))
        .await
        .unwrap();
    assert!(!fantasy.is_empty());
    assert!(fantasy.iter().all(|b| b.genre.as_deref() == Some("Fantasy")));

    let by_price = store
        .find(&FindSpec::new(BookFilter::All).sorted(SortSpec::descending(SortField::Price)))
        .await
        .unwrap();
    assert_eq!(by_price.len(), fixture_books().len());
    assert!(by_price.windows(2).all(|w| w[0].price >= w[1].price));

    let summaries = store
        .find_summaries(&BookFilter::Author("George Orwell".into()))
        .await
        .unwrap();
    assert_eq!(summaries.len(), 3);

    store.close().await.unwrap();
    drop_database(&client, &database).await;
}

#[tokio::test]
async fn test_update_and_delete() {
    let Some((store, client, database)) = seeded_store("bookstore_writes").await else {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    };

    let updated = store.update_price("1984", 15.99).await.unwrap();
    assert_eq!(updated.matched_count, 1);

    let book = store
        .find_one(&BookFilter::Title("1984".into()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.price, Some(15.99));

    let missing = store.delete_by_title("Nonexistent Book").await.unwrap();
    assert_eq!(missing.deleted_count, 0);

    let deleted = store.delete_by_title("Moby Dick").await.unwrap();
    assert_eq!(deleted.deleted_count, 1);
    assert!(store
        .find_one(&BookFilter::Title("Moby Dick".into()))
        .await
        .unwrap()
        .is_none());

    store.close().await.unwrap();
    drop_database(&client, &database).await;
}

#[tokio::test]
async fn test_aggregations() {
    let Some((store, client, database)) = seeded_store("bookstore_aggregates").await else {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    };

    let genres = store.average_price_by_genre().await.unwrap();
    assert!(genres
        .windows(2)
        .all(|w| w[0].average_price >= w[1].average_price));

    let top = store.top_author().await.unwrap().unwrap();
    assert_eq!(top.author.as_deref(), Some("George Orwell"));
    assert_eq!(top.total_books, 3);

    let decades = store.books_by_decade().await.unwrap();
    assert!(decades.windows(2).all(|w| w[0].decade < w[1].decade));
    let total: i64 = decades.iter().map(|g| g.total_books).sum();
    assert_eq!(total as usize, fixture_books().len());

    store.close().await.unwrap();
    drop_database(&client, &database).await;
}

#[tokio::test]
async fn test_index_and_explain() {
    let Some((store, client, database)) = seeded_store("bookstore_indexes").await else {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    };

    let index = IndexSpec::single("author", SortOrder::Ascending)
        .then("published_year", SortOrder::Descending);
    let name = store.create_index(&index).await.unwrap();
    assert_eq!(name, "author_1_published_year_-1");

    // Declaring the same index twice is a no-op.
    assert_eq!(store.create_index(&index).await.unwrap(), name);

    let stats = store.explain_title_lookup("1984").await.unwrap();
    assert_eq!(stats["nReturned"], 1);

    store.close().await.unwrap();
    drop_database(&client, &database).await;
}

#[tokio::test]
async fn test_full_run_against_server() {
    let Some((store, client, database)) = seeded_store("bookstore_run").await else {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    };

    let runner = Runner::new(QueryConfig::default()).unwrap();
    let mut out = Vec::new();
    let report = runner.run(Box::new(store), &mut out).await.unwrap();

    assert!(report.is_success());
    assert!(report.closed);
    let text = String::from_utf8(out).unwrap();
    assert!(text.trim_end().ends_with("Connection closed"));

    drop_database(&client, &database).await;
}

#[tokio::test]
async fn test_incomplete_records_decode() {
    let Some((store, client, database)) = seeded_store("bookstore_partial").await else {
        eprintln!("Skipping test: MONGODB_URI not set");
        return;
    };

    client
        .database(&database)
        .collection::<Document>("books")
        .insert_many([
            doc! { "title": "Mistborn", "genre": "Fantasy", "published_year": 2006, "price": 5.0 },
            doc! { "title": Bson::Null, "genre": "Fantasy", "price": Bson::Null },
        ])
        .await
        .unwrap();

    let fantasy = store
        .find(&FindSpec::new(BookFilter::Genre("Fantasy".into())))
        .await
        .unwrap();
    assert!(fantasy.iter().any(|b| b.in_stock.is_none()));

    let summaries = store.find_summaries(&BookFilter::All).await.unwrap();
    assert_eq!(summaries.len(), fixture_books().len() + 2);

    let decades = store.books_by_decade().await.unwrap();
    assert_eq!(decades[0].decade, None);
    assert!(decades[0].titles.is_empty());

    store.close().await.unwrap();
    drop_database(&client, &database).await;
}
