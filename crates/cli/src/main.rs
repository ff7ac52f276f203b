mod config;
mod error;
mod session;
mod world;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, TimeZone};
use claims::{ClaimRegistry, Engine, RelationshipResolver, TokioScheduler};
use clap::{Parser, Subcommand};
use storage::{ClaimMapping, RIDABLES, ResourceStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use error::{Error, Result};
use session::{Input, Session};
use world::SimWorld;

const CONFIG_FILE: &str = "rideclaim.toml";

#[derive(Parser)]
#[command(name = "rideclaim")]
#[command(about = "Ownership and lease engine for shared rides", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "RIDECLAIM_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against JSON-lines events on stdin
    Run,
    /// List persisted claims
    Claims {
        /// Show only claims held by this actor
        #[arg(short, long)]
        owner: Option<u64>,
    },
    /// Clear all persisted claims
    Reset,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    init_tracing(config.debug, cli.json);
    config.upgrade(&cli.config)?;

    match cli.command {
        Some(Commands::Run) | None => cmd_run(&config).await,
        Some(Commands::Claims { owner }) => cmd_claims(&config, owner),
        Some(Commands::Reset) => cmd_reset(&config),
    }
}

fn init_tracing(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());

    // stdout carries replies, so logs go to stderr
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn cmd_run(config: &Config) -> Result<()> {
    let db_path = db_path(config)?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = ResourceStore::open(&db_path)?;
    info!(path = %db_path.display(), "claim store opened");

    let world = Arc::new(SimWorld::default().with_grants(config.grant_table()?));
    let scheduler = Arc::new(TokioScheduler::current()?);

    let registry = ClaimRegistry::builder(config.policy.clone(), store, world.clone(), scheduler)
        .permissions(world.clone())
        .build()?;
    let resolver = RelationshipResolver::new(config.policy.relationships)
        .with_friends(world.clone())
        .with_clans(world.clone())
        .with_teams(world.clone());
    let session = Session::new(Engine::new(registry, resolver, world.clone()), world);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut number = 0;
    while let Some(line) = lines.next_line().await? {
        number += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<Input>(line) {
            Ok(input) => println!("{}", session.apply(input)),
            Err(source) => {
                let e = Error::Input {
                    line: number,
                    source,
                };
                warn!("{e}");
                println!("error: {e}");
            }
        }
    }

    session.engine().shutdown();
    info!("shut down");
    Ok(())
}

fn cmd_claims(config: &Config, owner: Option<u64>) -> Result<()> {
    let store = open_store(config)?;
    let mapping = store.read_mapping(RIDABLES)?;
    let claims: Vec<_> = mapping
        .iter()
        .filter(|(_, o)| owner.is_none_or(|owner| **o == owner))
        .collect();

    if claims.is_empty() {
        println!("No claims found.");
        return Ok(());
    }

    if let Some(updated) = store.updated_at(RIDABLES)? {
        let updated = Local
            .from_utc_datetime(&updated.naive_utc())
            .format("%Y-%m-%d %H:%M");
        println!("Last written: {updated}\n");
    }

    println!("{:<20}  OWNER", "OBJECT");
    println!("{}", "-".repeat(44));
    for (object, owner) in claims {
        println!("{object:<20}  {owner}");
    }

    Ok(())
}

fn cmd_reset(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let cleared = store.read_mapping(RIDABLES)?.len();
    store.write_mapping(RIDABLES, &ClaimMapping::new())?;
    println!("Cleared {cleared} claims.");
    Ok(())
}

fn open_store(config: &Config) -> Result<ResourceStore> {
    let db_path = db_path(config)?;
    if !db_path.exists() {
        return Err(Error::DatabaseNotFound { path: db_path });
    }
    Ok(ResourceStore::open(&db_path)?)
}

fn db_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.store {
        return Ok(path.clone());
    }
    let data_dir = dirs_data_dir().ok_or(Error::NoDataDir)?;
    Ok(data_dir.join("claims.db"))
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/rideclaim"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("rideclaim"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("rideclaim"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
