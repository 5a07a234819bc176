//! # Staking Indexer Service
//!
//! Continuous service that follows the chain and reconciles NFTX staking
//! events into the entity store.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin staking_indexer -- --config Config.toml
//! cargo run --bin staking_indexer -- --in-memory --from-block 12500000 --to-block 12510000
//! ```
//!
//! Press Ctrl+C to stop gracefully; the cursor always points at the last fully
//! processed chunk.

use anyhow::Result;
use clap::Parser;
use ethers::prelude::{Http, Provider};
use nftx_staking_indexer::{
    contract_reader::EthersContractReader,
    handlers::{seed_global, HandlerConfig, StakingHandlers},
    indexer::{load_data_sources, EthersLogSource, IndexerConfig, StakingIndexer},
    settings::Settings,
    store::{EntityStore, MemoryStore, PgEntityStore},
};
use std::sync::Arc;
use tokio::signal;
use tokio::time::{sleep, Duration};

#[derive(Parser, Debug)]
#[command(name = "staking_indexer", about = "NFTX staking event indexer")]
struct Args {
    /// Settings file
    #[arg(long, default_value = "Config.toml")]
    config: String,
    /// Start block; a persisted cursor further ahead still wins
    #[arg(long)]
    from_block: Option<u64>,
    /// Stop after this block instead of following the head
    #[arg(long)]
    to_block: Option<u64>,
    /// Run a single sync pass and exit
    #[arg(long)]
    once: bool,
    /// Keep entities in memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    // 1. Load settings
    let settings = Settings::from_path(&args.config)?;
    settings.validate()?;
    log::info!("Settings loaded from {}", args.config);

    // 2. Storage
    let store: Arc<dyn EntityStore> = match (args.in_memory, settings.database_url()) {
        (false, Some(url)) => {
            Arc::new(PgEntityStore::connect(url, settings.database.max_connections).await?)
        }
        (false, None) => {
            anyhow::bail!("no database configured: set database.url or DATABASE_URL, or pass --in-memory")
        }
        (true, _) => {
            log::warn!("Using in-memory store; entities are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    // 3. Provider
    let provider = Provider::<Http>::try_from(settings.rpc.http_url.as_str())?
        .interval(Duration::from_millis(500));
    let client = Arc::new(provider);

    // 4. Handlers and data sources
    let handler_config = HandlerConfig::new(settings.inventory_staking_address()?);
    seed_global(store.as_ref(), &handler_config).await?;

    let data_sources = Arc::new(load_data_sources(store.as_ref()).await?);
    let handlers = StakingHandlers::new(
        handler_config,
        Arc::new(EthersContractReader::new(Arc::clone(&client))),
        Arc::clone(&store),
        data_sources.clone(),
    );

    let indexer = StakingIndexer::new(
        IndexerConfig {
            lp_staking: settings.lp_staking_address()?,
            inventory_staking: settings.inventory_staking_address()?,
            chunk_size: settings.indexer.chunk_size,
        },
        Arc::new(EthersLogSource::new(
            client,
            settings.indexer.get_logs_max_retries,
            settings.indexer.retry_base_delay_ms,
        )),
        handlers,
        Arc::clone(&store),
        data_sources,
    );

    let start_block = args.from_block.unwrap_or(settings.indexer.start_block);

    // Bounded historical run
    if let Some(to_block) = args.to_block {
        let from = match args.from_block {
            Some(from) => from,
            None => indexer.next_block(start_block).await?,
        };
        let stats = indexer.run_range(from, to_block).await?;
        log::info!("Processed blocks {}..{}: {:?}", from, to_block, stats);
        return Ok(());
    }

    let poll_interval = Duration::from_secs(settings.indexer.poll_interval_seconds);
    loop {
        tokio::select! {
            result = indexer.sync_to_head(start_block, settings.indexer.confirmations) => {
                match result? {
                    Some((stats, block)) => log::info!("Synced to block {}: {:?}", block, stats),
                    None => log::debug!("No new blocks"),
                }
            }
            _ = signal::ctrl_c() => {
                log::info!("Shutdown requested, stopping");
                break;
            }
        }

        if args.once {
            break;
        }

        tokio::select! {
            _ = sleep(poll_interval) => {}
            _ = signal::ctrl_c() => {
                log::info!("Shutdown requested, stopping");
                break;
            }
        }
    }

    Ok(())
}
