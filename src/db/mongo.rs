//! MongoDB book store implementation.
//!
//! Provides the `MongoStore` struct that implements the `BookStore` trait
//! using the official MongoDB driver.

use crate::config::ConnectionConfig;
use crate::db::{
    AuthorCount, Book, BookFilter, BookStore, BookSummary, DecadeGroup, DeleteOutcome, FindSpec,
    GenreAveragePrice, IndexSpec, UpdateOutcome,
};
use crate::error::{BookstoreError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Name reported to the server in the connection handshake.
const APP_NAME: &str = "bookstore-queries";

/// MongoDB-backed book store.
#[derive(Debug)]
pub struct MongoStore {
    client: Client,
    database: Database,
    books: Collection<Book>,
    display: String,
}

impl MongoStore {
    /// Connects and pings the server so an unreachable host fails here.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(config.uri())
            .await
            .map_err(|e| BookstoreError::config(format!("Invalid connection string: {e}")))?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(Duration::from_secs(config.connect_timeout_secs()));

        let client =
            Client::with_options(options).map_err(|e| map_connection_error(e, config))?;
        let database = client.database(config.database());

        debug!("Pinging {}", config.display_string());
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| map_connection_error(e, config))?;

        info!("Connected to MongoDB: {}", config.display_string());

        let books = database.collection::<Book>(config.collection());
        Ok(Self {
            client,
            database,
            books,
            display: config.display_string(),
        })
    }

    /// Runs a pipeline and decodes each output document.
    async fn aggregate_rows<T: DeserializeOwned>(&self, pipeline: Vec<Document>) -> Result<Vec<T>> {
        debug!(?pipeline, "aggregate");
        let docs: Vec<Document> = self
            .books
            .aggregate(pipeline)
            .await
            .map_err(map_query_error)?
            .try_collect()
            .await
            .map_err(map_query_error)?;

        docs.into_iter()
            .map(|d| {
                bson::from_document(d).map_err(|e| {
                    BookstoreError::query(format!("Unexpected aggregation row: {e}"))
                })
            })
            .collect()
    }
}

#[async_trait]
impl BookStore for MongoStore {
    fn describe(&self) -> String {
        self.display.clone()
    }

    async fn find(&self, spec: &FindSpec) -> Result<Vec<Book>> {
        let filter = spec.filter.to_document();
        debug!(%filter, sort = ?spec.sort, skip = spec.skip, limit = ?spec.limit, "find");

        let mut find = self.books.find(filter);
        if let Some(sort) = spec.sort {
            find = find.sort(sort.to_document());
        }
        if spec.skip > 0 {
            find = find.skip(spec.skip);
        }
        if let Some(limit) = spec.limit {
            let limit = i64::try_from(limit)
                .map_err(|_| BookstoreError::query(format!("Limit {limit} is out of range")))?;
            find = find.limit(limit);
        }

        find.await
            .map_err(map_query_error)?
            .try_collect()
            .await
            .map_err(map_query_error)
    }

    async fn find_summaries(&self, filter: &BookFilter) -> Result<Vec<BookSummary>> {
        let filter = filter.to_document();
        debug!(%filter, "find with projection");

        self.books
            .clone_with_type::<BookSummary>()
            .find(filter)
            .projection(summary_projection())
            .await
            .map_err(map_query_error)?
            .try_collect()
            .await
            .map_err(map_query_error)
    }

    async fn find_one(&self, filter: &BookFilter) -> Result<Option<Book>> {
        let filter = filter.to_document();
        debug!(%filter, "find_one");

        self.books.find_one(filter).await.map_err(map_query_error)
    }

    async fn update_price(&self, title: &str, price: f64) -> Result<UpdateOutcome> {
        let result = self
            .books
            .update_one(
                BookFilter::Title(title.to_string()).to_document(),
                doc! { "$set": { "price": price } },
            )
            .await
            .map_err(map_query_error)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_by_title(&self, title: &str) -> Result<DeleteOutcome> {
        let result = self
            .books
            .delete_one(BookFilter::Title(title.to_string()).to_document())
            .await
            .map_err(map_query_error)?;

        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }

    async fn average_price_by_genre(&self) -> Result<Vec<GenreAveragePrice>> {
        self.aggregate_rows(average_price_pipeline()).await
    }

    async fn top_author(&self) -> Result<Option<AuthorCount>> {
        let rows: Vec<AuthorCount> = self.aggregate_rows(top_author_pipeline()).await?;
        Ok(rows.into_iter().next())
    }

    async fn books_by_decade(&self) -> Result<Vec<DecadeGroup>> {
        self.aggregate_rows(decade_pipeline()).await
    }

    async fn create_index(&self, index: &IndexSpec) -> Result<String> {
        let model = IndexModel::builder().keys(index_keys(index)).build();
        let result = self
            .books
            .create_index(model)
            .await
            .map_err(map_query_error)?;
        Ok(result.index_name)
    }

    async fn explain_title_lookup(&self, title: &str) -> Result<serde_json::Value> {
        let command = doc! {
            "explain": {
                "find": self.books.name(),
                "filter": BookFilter::Title(title.to_string()).to_document(),
            },
            "verbosity": "executionStats",
        };

        let plan = self
            .database
            .run_command(command)
            .await
            .map_err(map_query_error)?;
        let stats = plan
            .get_document("executionStats")
            .map_err(|e| BookstoreError::query(format!("Explain output has no stats: {e}")))?;

        Ok(Bson::Document(stats.clone()).into_relaxed_extjson())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// Fields kept by the projection step.
pub(crate) fn summary_projection() -> Document {
    doc! { "title": 1, "author": 1, "price": 1, "_id": 0 }
}

/// Keys document for an index declaration.
pub(crate) fn index_keys(index: &IndexSpec) -> Document {
    let mut keys = Document::new();
    for (field, order) in &index.keys {
        keys.insert(field.as_str(), order.as_i32());
    }
    keys
}

/// Mean price per genre, highest first.
pub(crate) fn average_price_pipeline() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$genre", "avgPrice": { "$avg": "$price" } } },
        doc! { "$sort": { "avgPrice": -1 } },
    ]
}

/// The single author with the most records.
pub(crate) fn top_author_pipeline() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$author", "totalBooks": { "$sum": 1 } } },
        doc! { "$sort": { "totalBooks": -1 } },
        doc! { "$limit": 1 },
    ]
}

/// Record counts and titles per decade, `floor(year / 10) * 10`.
///
/// Records without a `published_year` group under a null decade.
pub(crate) fn decade_pipeline() -> Vec<Document> {
    vec![
        doc! {
            "$project": {
                "decade": {
                    "$toInt": {
                        "$multiply": [
                            { "$floor": { "$divide": ["$published_year", 10] } },
                            10
                        ]
                    }
                },
                "title": 1,
            }
        },
        doc! {
            "$group": {
                "_id": "$decade",
                "totalBooks": { "$sum": 1 },
                "titles": { "$push": "$title" },
            }
        },
        // A stored null title would otherwise land in the list.
        doc! {
            "$set": {
                "titles": {
                    "$filter": {
                        "input": "$titles",
                        "cond": { "$eq": [{ "$type": "$$this" }, "string"] },
                    }
                }
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

/// Maps driver errors raised while connecting to user-friendly messages.
fn map_connection_error(e: mongodb::error::Error, config: &ConnectionConfig) -> BookstoreError {
    let target = config.display_string();
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. } => BookstoreError::connection(format!(
            "Cannot reach MongoDB ({target}) within {}s: {e}",
            config.connect_timeout_secs()
        )),
        ErrorKind::Authentication { .. } => {
            BookstoreError::connection(format!("Authentication failed for {target}: {e}"))
        }
        ErrorKind::DnsResolve { .. } => {
            BookstoreError::connection(format!("Cannot resolve host for {target}: {e}"))
        }
        _ => BookstoreError::connection(e.to_string()),
    }
}

/// Maps driver errors raised by an operation.
fn map_query_error(e: mongodb::error::Error) -> BookstoreError {
    BookstoreError::query(e.to_string())
}
