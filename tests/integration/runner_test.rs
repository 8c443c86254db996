//! Runner integration tests against the in-memory store.
//!
//! Exercises each step over the bundled fixture, plus the abort and
//! cleanup behavior of a full run.

use bookstore_queries::config::QueryConfig;
use bookstore_queries::db::{Book, BookFilter, BookStore, MemoryStore, StoreOperation};
use bookstore_queries::runner::{Runner, Step, StepOutput};
use pretty_assertions::assert_eq;

use super::common::{fixture_books, fixture_store};

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().filter_map(|b| b.title.as_deref()).collect()
}

async fn books_for(runner: &Runner, step: Step, store: &dyn BookStore) -> Vec<Book> {
    match runner.execute(step, store).await.unwrap() {
        StepOutput::Books(books) => books,
        other => panic!("Expected books from {step:?}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_then_read_back() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig {
        update_title: "1984".to_string(),
        new_price: 21.5,
        ..Default::default()
    })
    .unwrap();

    match runner.execute(Step::UpdatePrice, &store).await.unwrap() {
        StepOutput::Updated(outcome) => assert_eq!(outcome.modified_count, 1),
        other => panic!("Expected update outcome, got {other:?}"),
    }

    match runner.execute(Step::ReadBack, &store).await.unwrap() {
        StepOutput::Book(Some(book)) => {
            assert_eq!(book.title.as_deref(), Some("1984"));
            assert_eq!(book.price, Some(21.5));
        }
        other => panic!("Expected the updated book, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_missing_title() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig {
        delete_title: "Nonexistent Book".to_string(),
        ..Default::default()
    })
    .unwrap();

    match runner.execute(Step::Delete, &store).await.unwrap() {
        StepOutput::Deleted(outcome) => assert_eq!(outcome.deleted_count, 0),
        other => panic!("Expected delete outcome, got {other:?}"),
    }
    assert_eq!(
        runner.execute(Step::VerifyDeletion, &store).await.unwrap(),
        StepOutput::Book(None)
    );
    assert_eq!(store.snapshot().await.len(), fixture_books().len());
}

#[tokio::test]
async fn test_delete_then_verify() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig::default()).unwrap();

    match runner.execute(Step::Delete, &store).await.unwrap() {
        StepOutput::Deleted(outcome) => assert_eq!(outcome.deleted_count, 1),
        other => panic!("Expected delete outcome, got {other:?}"),
    }
    assert_eq!(
        runner.execute(Step::VerifyDeletion, &store).await.unwrap(),
        StepOutput::Book(None)
    );
}

#[tokio::test]
async fn test_genre_filter_exact_match() {
    let store = MemoryStore::with_books(vec![
        Book::new("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, true),
        Book::new("Dune", "Frank Herbert", "Sci-Fi", 1965, 9.99, true),
        Book::new("Mistborn", "Brandon Sanderson", "fantasy", 2006, 8.99, true),
        Book::new("Piranesi", "Susanna Clarke", "Fantasy ", 2020, 12.00, true),
    ]);
    let runner = Runner::new(QueryConfig::default()).unwrap();

    let books = books_for(&runner, Step::FilterByGenre, &store).await;
    assert_eq!(titles(&books), vec!["The Hobbit"]);
}

#[tokio::test]
async fn test_year_and_author_filters() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig::default()).unwrap();

    let recent = books_for(&runner, Step::FilterByYear, &store).await;
    assert!(recent
        .iter()
        .all(|b| b.published_year.is_some_and(|y| y > 1950)));
    assert_eq!(recent.len(), 5);

    let orwell = books_for(&runner, Step::FilterByAuthor, &store).await;
    assert_eq!(
        titles(&orwell),
        vec!["1984", "Animal Farm", "Homage to Catalonia"]
    );
}

#[tokio::test]
async fn test_second_page_by_title() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig {
        page: 2,
        page_size: 5,
        ..Default::default()
    })
    .unwrap();

    let page = books_for(&runner, Step::Paginate, &store).await;
    assert_eq!(
        titles(&page),
        vec![
            "Pride and Prejudice",
            "Project Hail Mary",
            "The Alchemist",
            "The Catcher in the Rye",
            "The Great Gatsby",
        ]
    );
}

#[tokio::test]
async fn test_second_page_of_small_collection_is_empty() {
    let store = MemoryStore::with_books(fixture_books().into_iter().take(5).collect());
    let runner = Runner::new(QueryConfig {
        page: 2,
        page_size: 5,
        ..Default::default()
    })
    .unwrap();

    assert!(books_for(&runner, Step::Paginate, &store).await.is_empty());
}

#[tokio::test]
async fn test_price_sorts_are_mirrored() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig::default()).unwrap();

    let asc = books_for(&runner, Step::SortByPriceAscending, &store).await;
    let desc = books_for(&runner, Step::SortByPriceDescending, &store).await;

    assert_eq!(titles(&asc)[0], "Pride and Prejudice");
    assert_eq!(titles(&desc)[0], "The Lord of the Rings");
    assert!(asc.windows(2).all(|w| w[0].price <= w[1].price));
    assert!(desc.windows(2).all(|w| w[0].price >= w[1].price));
}

#[tokio::test]
async fn test_decade_grouping() {
    let store = MemoryStore::with_books(vec![
        Book::new("A", "X", "Y", 1948, 1.0, true),
        Book::new("B", "X", "Y", 1951, 1.0, true),
        Book::new("C", "X", "Y", 1962, 1.0, true),
    ]);
    let runner = Runner::new(QueryConfig::default()).unwrap();

    match runner.execute(Step::BooksByDecade, &store).await.unwrap() {
        StepOutput::Decades(groups) => {
            let keys: Vec<(Option<i32>, i64)> =
                groups.iter().map(|g| (g.decade, g.total_books)).collect();
            assert_eq!(keys, vec![(Some(1940), 1), (Some(1950), 1), (Some(1960), 1)]);
        }
        other => panic!("Expected decade groups, got {other:?}"),
    }
}

#[tokio::test]
async fn test_top_author_from_fixture() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig::default()).unwrap();

    match runner.execute(Step::TopAuthor, &store).await.unwrap() {
        StepOutput::TopAuthor(Some(top)) => {
            assert_eq!(top.author.as_deref(), Some("George Orwell"));
            assert_eq!(top.total_books, 3);
        }
        other => panic!("Expected a top author, got {other:?}"),
    }
}

#[tokio::test]
async fn test_average_price_rows_per_genre() {
    let store = fixture_store();
    let runner = Runner::new(QueryConfig::default()).unwrap();

    match runner.execute(Step::AveragePriceByGenre, &store).await.unwrap() {
        StepOutput::GenrePrices(rows) => {
            // Fiction, Dystopian, Fantasy, Romance, Political Satire,
            // Adventure, Gothic Fiction, Memoir, Sci-Fi
            assert_eq!(rows.len(), 9);
            assert_eq!(rows[0].genre.as_deref(), Some("Sci-Fi"));
            assert!(rows
                .windows(2)
                .all(|w| w[0].average_price >= w[1].average_price));
        }
        other => panic!("Expected genre rows, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_run_output() {
    let runner = Runner::new(QueryConfig::default()).unwrap();
    let mut out = Vec::new();

    let report = runner.run(Box::new(fixture_store()), &mut out).await.unwrap();
    assert!(report.is_success());

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("1 document(s) updated (1 matched)"));
    assert!(text.contains("Check if \"Moby Dick\" is deleted:\nNot found"));
    assert!(text.contains("Index ready: author_1_published_year_-1"));
    assert!(text.contains("\"stage\": \"IXSCAN\""));
}

#[tokio::test]
async fn test_failed_step_is_reported_once_and_store_closed() {
    let store = std::sync::Arc::new(fixture_store().failing_on(StoreOperation::FindSummaries));
    let runner = Runner::new(QueryConfig::default()).unwrap();
    let mut out = Vec::new();

    let report = runner
        .run(Box::new(store.clone()), &mut out)
        .await
        .unwrap();

    assert!(store.is_closed());
    assert!(report.closed);
    let failed: Vec<Step> = report.failures().map(|(step, _)| step).collect();
    assert_eq!(failed, vec![Step::Projection]);
    assert_eq!(report.outcomes.last().unwrap().step, Step::Projection);

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.matches("Error: Query error").count(), 1);
    assert!(!text.contains("sorted by price"));

    // Writes before the failure stay applied.
    assert!(store
        .find_one(&BookFilter::Title("Moby Dick".into()))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_seed_with_incomplete_records_runs_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("books.json");
    std::fs::write(
        &path,
        r#"[
            {"title":"The Hobbit","author":"J.R.R. Tolkien","genre":"Fantasy",
             "published_year":1937,"price":14.99,"in_stock":true},
            {"title":"Mistborn","author":"Brandon Sanderson","genre":"Fantasy",
             "published_year":2006,"price":5.0},
            {"title":"Untitled draft","genre":null,"price":null}
        ]"#,
    )
    .unwrap();

    let store = MemoryStore::from_json_file(&path).unwrap();
    let runner = Runner::new(QueryConfig::default()).unwrap();

    let fantasy = books_for(&runner, Step::FilterByGenre, &store).await;
    assert_eq!(titles(&fantasy), vec!["The Hobbit", "Mistborn"]);

    let asc = books_for(&runner, Step::SortByPriceAscending, &store).await;
    assert_eq!(titles(&asc), vec!["Untitled draft", "Mistborn", "The Hobbit"]);

    let mut out = Vec::new();
    let report = runner.run(Box::new(store), &mut out).await.unwrap();
    assert!(report.is_success());

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("{\"title\":\"Untitled draft\"}"));
}
