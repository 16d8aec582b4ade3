use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use wikidice::db::Db;
use wikidice::{CategoryService, Config, SqliteGraphStore};

#[derive(Parser, Debug)]
#[command(name = "dice")]
#[command(about = "Query the wikidice category graph from the shell")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pick a random article under a category
    Random {
        category: String,
        /// Depth bound, clamped into the configured range
        #[arg(short, long)]
        levels: Option<i64>,
        /// Also print the categories the article was reached through
        #[arg(short, long)]
        explain: bool,
    },
    /// List the page ids under a category
    Members {
        category: String,
        #[arg(short, long)]
        levels: Option<i64>,
    },
    /// Complete a category name prefix
    Autocomplete { prefix: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    env_logger::Builder::new().parse_filters(&config.log_filter()).init();

    let db = Db::with_limits(config.db_path(), &config.store);
    let service = CategoryService::new(Arc::new(SqliteGraphStore::new(db)), &config);

    let levels_of = |requested: Option<i64>| match requested {
        Some(n) => service.clamp_levels(n),
        None => service.levels(None),
    };

    match args.command {
        Command::Random {
            category,
            levels,
            explain,
        } => {
            let page = service.lookup_random_page(&category, levels_of(levels)).await?;
            println!("{}", page.title);
            if explain {
                println!(
                    "  via {} (depth {}, 1 of {} pages)",
                    page.derivation.join(" > "),
                    page.depth,
                    page.candidates
                );
            }
        }
        Command::Members { category, levels } => {
            let levels = levels_of(levels);
            let members = service.enumerate_members(&category, levels).await?;
            for id in &members {
                println!("{}", id);
            }
            log::info!("{} members within {} levels", members.len(), levels.get());
        }
        Command::Autocomplete { prefix } => {
            for name in service.autocomplete_category(&prefix).await? {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
