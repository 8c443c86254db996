//! The query runner.
//!
//! Runs the fixed sequence of steps against one store, writes a section per
//! step to the output sink, and closes the store on every exit path.

use std::io::Write;

use tracing::{error, info, warn};

use crate::config::QueryConfig;
use crate::db::{
    AuthorCount, Book, BookFilter, BookStore, BookSummary, DecadeGroup, DeleteOutcome, FindSpec,
    GenreAveragePrice, IndexSpec, Page, SortField, SortOrder, SortSpec, UpdateOutcome,
};
use crate::error::{BookstoreError, Result};
use crate::output::{write_section, Block};

/// One operation of the run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FilterByGenre,
    FilterByYear,
    FilterByAuthor,
    UpdatePrice,
    ReadBack,
    Delete,
    VerifyDeletion,
    CompoundFilter,
    Projection,
    SortByPriceAscending,
    SortByPriceDescending,
    Paginate,
    AveragePriceByGenre,
    TopAuthor,
    BooksByDecade,
    CreateTitleIndex,
    CreateCompoundIndex,
    Explain,
}

impl Step {
    /// Every step, in the order the runner executes them.
    pub const ALL: [Step; 18] = [
        Step::FilterByGenre,
        Step::FilterByYear,
        Step::FilterByAuthor,
        Step::UpdatePrice,
        Step::ReadBack,
        Step::Delete,
        Step::VerifyDeletion,
        Step::CompoundFilter,
        Step::Projection,
        Step::SortByPriceAscending,
        Step::SortByPriceDescending,
        Step::Paginate,
        Step::AveragePriceByGenre,
        Step::TopAuthor,
        Step::BooksByDecade,
        Step::CreateTitleIndex,
        Step::CreateCompoundIndex,
        Step::Explain,
    ];

    /// Short machine-friendly name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::FilterByGenre => "filter_by_genre",
            Self::FilterByYear => "filter_by_year",
            Self::FilterByAuthor => "filter_by_author",
            Self::UpdatePrice => "update_price",
            Self::ReadBack => "read_back",
            Self::Delete => "delete",
            Self::VerifyDeletion => "verify_deletion",
            Self::CompoundFilter => "compound_filter",
            Self::Projection => "projection",
            Self::SortByPriceAscending => "sort_by_price_asc",
            Self::SortByPriceDescending => "sort_by_price_desc",
            Self::Paginate => "paginate",
            Self::AveragePriceByGenre => "average_price_by_genre",
            Self::TopAuthor => "top_author",
            Self::BooksByDecade => "books_by_decade",
            Self::CreateTitleIndex => "create_title_index",
            Self::CreateCompoundIndex => "create_compound_index",
            Self::Explain => "explain",
        }
    }
}

/// What a successful step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    Books(Vec<Book>),
    Book(Option<Book>),
    Summaries(Vec<BookSummary>),
    Updated(UpdateOutcome),
    Deleted(DeleteOutcome),
    GenrePrices(Vec<GenreAveragePrice>),
    TopAuthor(Option<AuthorCount>),
    Decades(Vec<DecadeGroup>),
    IndexCreated(String),
    Plan(serde_json::Value),
}

impl StepOutput {
    /// Converts the output into a printable block.
    pub fn to_block(&self) -> Block {
        match self {
            Self::Books(books) => Block::Lines(books.iter().map(Book::to_string).collect()),
            Self::Book(Some(book)) => Block::Lines(vec![book.to_string()]),
            Self::Book(None) => Block::info("Not found"),
            Self::Summaries(rows) => {
                Block::Lines(rows.iter().map(BookSummary::to_string).collect())
            }
            Self::Updated(outcome) => Block::info(format!(
                "{} document(s) updated ({} matched)",
                outcome.modified_count, outcome.matched_count
            )),
            Self::Deleted(outcome) => {
                Block::info(format!("{} document(s) deleted", outcome.deleted_count))
            }
            Self::GenrePrices(rows) => Block::table(
                &["Genre", "Average price"],
                rows.iter()
                    .map(|r| {
                        let average = r.average_price.map(|p| format!("{p:.2}"));
                        vec![display_key(&r.genre), display_key(&average)]
                    })
                    .collect(),
            ),
            Self::TopAuthor(top) => Block::table(
                &["Author", "Books"],
                top.iter()
                    .map(|r| vec![display_key(&r.author), r.total_books.to_string()])
                    .collect(),
            ),
            Self::Decades(groups) => Block::table(
                &["Decade", "Books", "Titles"],
                groups
                    .iter()
                    .map(|g| {
                        vec![
                            display_key(&g.decade.map(|d| format!("{d}s"))),
                            g.total_books.to_string(),
                            g.titles.join(", "),
                        ]
                    })
                    .collect(),
            ),
            Self::IndexCreated(name) => Block::info(format!("Index ready: {name}")),
            Self::Plan(stats) => Block::Json(stats.clone()),
        }
    }
}

fn display_key(key: &Option<String>) -> String {
    key.clone().unwrap_or_else(|| "(missing)".to_string())
}

/// Result of one executed step.
#[derive(Debug)]
pub struct StepOutcome {
    pub step: Step,
    pub result: Result<StepOutput>,
}

/// Everything a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Executed steps, in order. Steps skipped after a failure are absent.
    pub outcomes: Vec<StepOutcome>,
    /// Whether the store closed cleanly.
    pub closed: bool,
}

impl RunReport {
    /// True when every executed step succeeded and all steps ran.
    pub fn is_success(&self) -> bool {
        self.outcomes.len() == Step::ALL.len() && self.failures().next().is_none()
    }

    /// Steps that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (Step, &BookstoreError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.step, e)))
    }

    /// Output of a step, if it ran and succeeded.
    pub fn output(&self, step: Step) -> Option<&StepOutput> {
        self.outcomes
            .iter()
            .find(|o| o.step == step)
            .and_then(|o| o.result.as_ref().ok())
    }
}

/// Runs the step sequence with fixed parameters.
#[derive(Debug, Clone)]
pub struct Runner {
    queries: QueryConfig,
    page: Page,
    keep_going: bool,
}

impl Runner {
    /// Creates a runner, validating the page parameters up front.
    pub fn new(queries: QueryConfig) -> Result<Self> {
        let page = queries.page()?;
        Ok(Self {
            queries,
            page,
            keep_going: false,
        })
    }

    /// Continue with the remaining steps after a failure instead of stopping.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Runs every step against the store, then closes it.
    ///
    /// Step failures are recorded in the report rather than returned. An
    /// `Err` means the sink could not be written or the store failed to
    /// close; the store has been closed (or attempted) either way.
    pub async fn run<W: Write + ?Sized>(
        &self,
        store: Box<dyn BookStore>,
        out: &mut W,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();

        let steps_result = self.run_steps(store.as_ref(), out, &mut report).await;

        let close_result = store.close().await;
        match &close_result {
            Ok(()) => {
                info!("Connection closed");
                report.closed = true;
            }
            Err(e) => error!("Failed to close connection: {e}"),
        }

        steps_result?;
        close_result?;
        writeln!(out, "\nConnection closed")?;

        Ok(report)
    }

    async fn run_steps<W: Write + ?Sized>(
        &self,
        store: &dyn BookStore,
        out: &mut W,
        report: &mut RunReport,
    ) -> Result<()> {
        writeln!(out, "Connected to {}", store.describe())?;

        for step in Step::ALL {
            info!(step = step.name(), "Running step");
            let result = self.execute(step, store).await;
            let heading = self.heading(step);

            match &result {
                Ok(output) => {
                    self.warn_on_miss(step, output);
                    write_section(out, &heading, &output.to_block())?;
                }
                Err(e) => {
                    error!(step = step.name(), "{}: {}", e.category(), e);
                    write_section(out, &heading, &Block::info(format!("Error: {e}")))?;
                }
            }

            let failed = result.is_err();
            report.outcomes.push(StepOutcome { step, result });

            if failed && !self.keep_going {
                warn!("Aborting remaining steps");
                break;
            }
        }
        Ok(())
    }

    /// Executes one step.
    pub async fn execute(&self, step: Step, store: &dyn BookStore) -> Result<StepOutput> {
        let q = &self.queries;
        let output = match step {
            Step::FilterByGenre => StepOutput::Books(
                store
                    .find(&FindSpec::new(BookFilter::Genre(q.genre.clone())))
                    .await?,
            ),
            Step::FilterByYear => StepOutput::Books(
                store
                    .find(&FindSpec::new(BookFilter::PublishedAfter(q.published_after)))
                    .await?,
            ),
            Step::FilterByAuthor => StepOutput::Books(
                store
                    .find(&FindSpec::new(BookFilter::Author(q.author.clone())))
                    .await?,
            ),
            Step::UpdatePrice => {
                StepOutput::Updated(store.update_price(&q.update_title, q.new_price).await?)
            }
            Step::ReadBack => StepOutput::Book(
                store
                    .find_one(&BookFilter::Title(q.update_title.clone()))
                    .await?,
            ),
            Step::Delete => StepOutput::Deleted(store.delete_by_title(&q.delete_title).await?),
            Step::VerifyDeletion => StepOutput::Book(
                store
                    .find_one(&BookFilter::Title(q.delete_title.clone()))
                    .await?,
            ),
            Step::CompoundFilter => StepOutput::Books(
                store
                    .find(&FindSpec::new(BookFilter::InStockPublishedAfter(
                        q.in_stock_published_after,
                    )))
                    .await?,
            ),
            Step::Projection => {
                StepOutput::Summaries(store.find_summaries(&BookFilter::All).await?)
            }
            Step::SortByPriceAscending => {
                let spec =
                    FindSpec::new(BookFilter::All).sorted(SortSpec::ascending(SortField::Price));
                StepOutput::Books(store.find(&spec).await?)
            }
            Step::SortByPriceDescending => {
                let spec =
                    FindSpec::new(BookFilter::All).sorted(SortSpec::descending(SortField::Price));
                StepOutput::Books(store.find(&spec).await?)
            }
            Step::Paginate => StepOutput::Books(
                store
                    .find(
                        &FindSpec::new(BookFilter::All)
                            .sorted(SortSpec::ascending(SortField::Title))
                            .page(self.page),
                    )
                    .await?,
            ),
            Step::AveragePriceByGenre => {
                StepOutput::GenrePrices(store.average_price_by_genre().await?)
            }
            Step::TopAuthor => StepOutput::TopAuthor(store.top_author().await?),
            Step::BooksByDecade => StepOutput::Decades(store.books_by_decade().await?),
            Step::CreateTitleIndex => StepOutput::IndexCreated(
                store
                    .create_index(&IndexSpec::single("title", SortOrder::Ascending))
                    .await?,
            ),
            Step::CreateCompoundIndex => StepOutput::IndexCreated(
                store
                    .create_index(
                        &IndexSpec::single("author", SortOrder::Ascending)
                            .then("published_year", SortOrder::Descending),
                    )
                    .await?,
            ),
            Step::Explain => StepOutput::Plan(store.explain_title_lookup(&q.explain_title).await?),
        };
        Ok(output)
    }

    /// Heading printed above a step's section.
    pub fn heading(&self, step: Step) -> String {
        let q = &self.queries;
        match step {
            Step::FilterByGenre => format!("Books in genre \"{}\":", q.genre),
            Step::FilterByYear => format!("Books published after {}:", q.published_after),
            Step::FilterByAuthor => format!("Books by {}:", q.author),
            Step::UpdatePrice => {
                format!("Update price of \"{}\" to {:.2}:", q.update_title, q.new_price)
            }
            Step::ReadBack => format!("Updated book \"{}\":", q.update_title),
            Step::Delete => format!("Delete \"{}\":", q.delete_title),
            Step::VerifyDeletion => format!("Check if \"{}\" is deleted:", q.delete_title),
            Step::CompoundFilter => format!(
                "Books in stock & published after {}:",
                q.in_stock_published_after
            ),
            Step::Projection => "Books with only title, author, and price:".to_string(),
            Step::SortByPriceAscending => "Books sorted by price (ascending):".to_string(),
            Step::SortByPriceDescending => "Books sorted by price (descending):".to_string(),
            Step::Paginate => format!(
                "Page {} ({} books per page):",
                self.page.number(),
                self.page.size()
            ),
            Step::AveragePriceByGenre => "Average price of books by genre:".to_string(),
            Step::TopAuthor => "Author with the most books:".to_string(),
            Step::BooksByDecade => "Books grouped by publication decade:".to_string(),
            Step::CreateTitleIndex => "Index on title:".to_string(),
            Step::CreateCompoundIndex => {
                "Compound index on author + published_year:".to_string()
            }
            Step::Explain => format!("Explain plan for query on title \"{}\":", q.explain_title),
        }
    }

    fn warn_on_miss(&self, step: Step, output: &StepOutput) {
        match (step, output) {
            (Step::UpdatePrice, StepOutput::Updated(o)) if o.matched_count == 0 => {
                warn!("No book titled \"{}\" to update", self.queries.update_title)
            }
            (Step::Delete, StepOutput::Deleted(o)) if o.deleted_count == 0 => {
                warn!("No book titled \"{}\" to delete", self.queries.delete_title)
            }
            (Step::VerifyDeletion, StepOutput::Book(Some(_))) => {
                warn!("\"{}\" is still present after delete", self.queries.delete_title)
            }
            _ => {}
        }
    }
}
