use anyhow::{Context, Result};
use std::sync::Arc;
use wikidice::db::{migrate, Db};
use wikidice::{CategoryService, Config, HttpServer, SqliteGraphStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    env_logger::Builder::new().parse_filters(&config.log_filter()).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("serve");

    match command {
        "verify" => run_schema_verification(config).await?,
        "serve" => run_http_server(config).await?,
        other => anyhow::bail!("Unknown command '{}'. Expected 'serve' or 'verify'.", other),
    }

    Ok(())
}

/// Open the pool and bring the schema up to date
async fn open_store(config: &Config) -> Result<Db> {
    let db = Db::with_limits(config.db_path(), &config.store);
    db.with_connection(migrate::run_migrations)
        .await
        .with_context(|| format!("Failed to migrate {}", config.db_path().display()))?;
    Ok(db)
}

/// Run the HTTP server until Ctrl-C
async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting wikidice v{}", env!("CARGO_PKG_VERSION"));

    let db = open_store(&config).await?;

    let store = Arc::new(SqliteGraphStore::new(db));
    let service = CategoryService::new(store, &config);

    // Refuse to start against a store that does not answer
    service
        .ping(config.store.ping_timeout())
        .await
        .context("unable to connect to database")?;
    log::info!("Database ready at {}", config.db_path().display());

    let server = HttpServer::new(service, config);
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    log::info!("Stopped");
    Ok(())
}

/// Verify that the category tables exist and hold data
async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Database path: {}", config.db_path().display());

    let db = open_store(&config).await?;
    let (missing, categories, links) = db
        .with_connection(|conn| {
            let missing = migrate::missing_tables(conn)?;
            if !missing.is_empty() {
                return Ok((missing, 0, 0));
            }
            let categories: i64 = conn.query_row(
                "SELECT COUNT(*) FROM page WHERE page_namespace = ?1",
                [wikidice::graph::CATEGORY_NAMESPACE],
                |row| row.get(0),
            )?;
            let links: i64 = conn.query_row("SELECT COUNT(*) FROM page_cat_ids", [], |row| row.get(0))?;
            Ok((missing, categories, links))
        })
        .await?;

    if !missing.is_empty() {
        anyhow::bail!("Missing tables: {}", missing.join(", "));
    }
    log::info!("✓ {} categories, {} category links", categories, links);
    if categories == 0 {
        log::warn!("The category graph is empty; load page and page_cat_ids before serving");
    }

    Ok(())
}
