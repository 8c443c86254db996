//! bookstore-queries - runs a fixed batch of MongoDB operations over a book collection.

use bookstore_queries::cli::Cli;
use bookstore_queries::config::Config;
use bookstore_queries::db::{self, BookStore, MemoryStore};
use bookstore_queries::error::Result;
use bookstore_queries::logging;
use bookstore_queries::runner::Runner;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    logging::init_stderr_logging();

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every step succeeded.
async fn run() -> Result<bool> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let mut queries = config.queries.clone();
    cli.apply_query_overrides(&mut queries);
    let runner = Runner::new(queries)?.keep_going(cli.keep_going);

    let store: Box<dyn BookStore> = if cli.mock_db {
        match &cli.seed {
            Some(path) => Box::new(MemoryStore::from_json_file(path)?),
            None => {
                warn!("Using an empty in-memory store; pass --seed to load records");
                Box::new(MemoryStore::new())
            }
        }
    } else {
        let connection = cli.resolve_connection(&config)?;
        info!("Connection: {}", connection.display_string());
        db::connect(&connection).await?
    };

    // Failed steps are already reported by the runner.
    let mut out = std::io::stdout();
    let report = runner.run(store, &mut out).await?;
    Ok(report.is_success())
}
