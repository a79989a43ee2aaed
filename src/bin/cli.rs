//! MagicMirror CLI
//!
//! Crawl sites into a database directory, serve it, list its sites or run
//! the built-in self-test.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use magicmirror::{
    codec::{FoldIndex, PathCodec},
    error::{AppError, Result},
    models::Config,
    pipeline,
    router::Router,
    selftest, server,
    services::{MirrorWriter, PageFetcher, url_source},
    storage::{LocalStore, MirrorStore},
};

/// MagicMirror - Website Archiver and Mirror Server
#[derive(Parser, Debug)]
#[command(
    name = "magicmirror",
    version,
    about = "Crawl websites into a local archive and serve them under mirror host names"
)]
struct Cli {
    /// Path to config file (default: {db}/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one or more sites into the database
    Crawl {
        /// Database directory
        db: PathBuf,

        /// Start URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Serve the database under an archive domain
    Serve {
        /// Database directory
        db: PathBuf,

        /// Archive domain, e.g. my.archive.com
        suffix: String,

        /// Listen port (default: from config, else 80)
        port: Option<u16>,
    },

    /// List mirrored sites
    List {
        /// Database directory
        db: PathBuf,
    },

    /// Run the built-in codec self-test
    Test,
}

/// Initialize logging based on verbosity flag and config.
fn init_logging(verbose: bool, config_level: &str) {
    let level = if verbose { "debug" } else { config_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load and validate the config. A broken `{db}/config.toml` falls back to
/// defaults; its error is handed back so it can be logged once logging runs.
fn load_config(
    cli_path: Option<&Path>,
    db: Option<&Path>,
) -> Result<(Config, Option<AppError>)> {
    let (config, fallback) = match (cli_path, db) {
        // An explicitly named config must load.
        (Some(path), _) => (Config::load(path)?, None),
        (None, Some(db)) => match Config::load_if_exists(db.join("config.toml")) {
            Ok(config) => (config.unwrap_or_default(), None),
            Err(e) => (Config::default(), Some(e)),
        },
        (None, None) => (Config::default(), None),
    };
    config.validate()?;
    Ok((config, fallback))
}

fn db_of(command: &Command) -> Option<&Path> {
    match command {
        Command::Crawl { db, .. } | Command::Serve { db, .. } | Command::List { db } => {
            Some(db.as_path())
        }
        Command::Test => None,
    }
}

/// Open the store and a codec primed with its persisted fold index.
async fn open_store(db: &Path, config: &Config) -> Result<(Arc<LocalStore>, PathCodec)> {
    let store = Arc::new(LocalStore::new(db));
    let folds = store.load_folds().await?;
    log::debug!("Loaded {} fold entries from {}", folds.len(), db.display());
    let codec = PathCodec::with_index(&config.store, Arc::new(FoldIndex::from_entries(folds)));
    Ok((store, codec))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, fallback) = load_config(cli.config.as_deref(), db_of(&cli.command))?;
    init_logging(cli.verbose, &config.logging.level);
    if let Some(e) = fallback {
        log::warn!("Config load failed: {e}. Using defaults.");
    }

    match cli.command {
        Command::Crawl { db, urls } => {
            tokio::fs::create_dir_all(&db).await?;
            let (store, codec) = open_store(&db, &config).await?;

            let writer = MirrorWriter::new(codec, store, &config.crawler);
            let fetcher = PageFetcher::new(&config.crawler)?;
            let source = url_source(&config.crawler);

            let stats = pipeline::run_crawler(
                &config.crawler,
                source.as_ref(),
                &fetcher,
                &writer,
                &urls,
            )
            .await?;

            if stats.stored == 0 && stats.discovered > 0 {
                return Err(AppError::crawl(
                    urls.join(" "),
                    "no response could be stored",
                ));
            }
        }

        Command::Serve { db, suffix, port } => {
            let mut config = config;
            config.archive.suffix = suffix;
            if let Some(port) = port {
                config.archive.port = port;
            }
            config.validate_serve()?;

            if !db.is_dir() {
                return Err(AppError::config(format!(
                    "database directory {} does not exist",
                    db.display()
                )));
            }
            let (store, codec) = open_store(&db, &config).await?;
            let router = Router::new(&config.archive.suffix, codec, store);
            server::run_server(&config.archive, router).await?;
        }

        Command::List { db } => {
            let store = LocalStore::new(&db);
            let sites = store.list_sites().await?;
            if sites.is_empty() {
                log::info!("No sites mirrored in {}", db.display());
            }
            for site in sites {
                match site.updated {
                    Some(updated) => println!(
                        "{}\t{}",
                        site.root.origin(),
                        updated.format("%Y-%m-%d %H:%M UTC")
                    ),
                    None => println!("{}", site.root.origin()),
                }
            }
        }

        Command::Test => {
            let passed = selftest::run()?;
            log::info!("Self-test passed ({passed} checks)");
        }
    }

    Ok(())
}
