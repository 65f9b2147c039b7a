//! Thin CLI harness around the lookup subsystem

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};

use icdlookup::catalog::{seed_if_needed, CatalogStore, OfflineIndex};
use icdlookup::client::{RegistryClient, SearchQuery};
use icdlookup::config::RegistryConfig;
use icdlookup::error::Result;
use icdlookup::lookup::LookupService;

#[derive(Parser)]
#[command(name = "icdlookup", version, about = "Diagnostic-code lookup against the ICD-11 registry")]
struct Cli {
    /// Path to the config file (default: ~/.icdlookup/config.yaml)
    #[arg(long, global = true, env = "ICDLOOKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the offline catalog database
    #[arg(long, global = true, env = "ICDLOOKUP_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the registry (falls back to the offline catalog)
    Search {
        /// Free-text query
        query: String,

        /// Result offset for paging
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Maximum number of results
        #[arg(long, default_value_t = 30)]
        limit: u32,

        /// Language preference (overrides the configured one)
        #[arg(long)]
        lang: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import the bundled dataset into the offline catalog (runs at most once)
    Seed {
        /// Path to the seed dataset (overrides the configured one)
        #[arg(long)]
        dataset: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RegistryConfig::load_from(path.clone()),
        None => RegistryConfig::load(),
    }
    // A missing config file still allows seeding and offline search
    .unwrap_or_else(|err| {
        log::info!("running without registry configuration: {err}");
        RegistryConfig::default()
    });

    let catalog_path = match &cli.catalog {
        Some(path) => path.clone(),
        None => CatalogStore::default_db_path()?,
    };

    match cli.command {
        Commands::Search {
            query,
            offset,
            limit,
            lang,
            json,
        } => {
            let store = Arc::new(Mutex::new(CatalogStore::open_at(&catalog_path)?));

            // Seed alongside the search; a failed or partial seed only
            // degrades offline completeness and must never block lookups.
            let seed_handle = {
                let store = store.clone();
                let dataset = dataset_path(&config, None);
                tokio::task::spawn_blocking(move || seed_if_needed(&store, &dataset))
            };

            let remote = Arc::new(RegistryClient::from_config(&config)?);
            let lookup = LookupService::new(remote, OfflineIndex::new(store));

            let language = lang.unwrap_or_else(|| config.language.clone());
            let outcome = lookup
                .search(SearchQuery::new(&query, offset, limit, &language))
                .await?;

            if outcome.is_degraded() {
                eprintln!("Note: registry unavailable, showing offline catalog results");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&*outcome.results)?);
            } else if outcome.results.is_empty() {
                println!("No results for \"{}\"", query.trim());
            } else {
                for result in outcome.results.iter() {
                    let code = result.code.as_deref().unwrap_or("-");
                    println!("{code:<8} {}", result.title);
                }
            }

            match seed_handle.await {
                Ok(Ok(outcome)) if outcome.inserted > 0 => {
                    log::info!("seeded {} catalog entries", outcome.inserted);
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => log::warn!("catalog seeding failed: {err}"),
                Err(err) => log::warn!("catalog seeding task panicked: {err}"),
            }
        }

        Commands::Seed { dataset } => {
            let store = Mutex::new(CatalogStore::open_at(&catalog_path)?);
            let dataset = dataset_path(&config, dataset);
            let outcome = seed_if_needed(&store, &dataset)?;

            if outcome.inserted > 0 {
                println!(
                    "Seeded {} entries in {} batches",
                    outcome.inserted, outcome.batches
                );
            } else {
                println!("Catalog already seeded or dataset absent; nothing to do");
            }
        }
    }

    Ok(())
}

/// Resolve the seed dataset path: CLI flag, then config, then the bundled
/// default location next to the binary's data.
fn dataset_path(config: &RegistryConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| config.dataset.clone())
        .unwrap_or_else(|| PathBuf::from("data/icd11-catalog.json"))
}
