//! Talent Hasher - Entry Point
//!
//! Resolves hero, class and spec talent strings into a loadout export string
//! and prints it. Repeated inputs are answered from the hash cache.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use talent_hasher::core::config::HasherConfig;
use talent_hasher::core::error::Result;
use talent_hasher::storage::FsLocker;
use talent_hasher::{HashCache, TalentHasher};
use tracing_subscriber::EnvFilter;

/// Generate a talent loadout export string
#[derive(Parser, Debug)]
#[command(name = "talent-hasher")]
#[command(about = "Turn name:rank talent strings into an in-game loadout code")]
struct Args {
    /// Hero talent string (name:rank/name:rank/...)
    #[arg(long)]
    hero_talents: String,

    /// Class talent string
    #[arg(long)]
    class_talents: String,

    /// Spec talent string
    #[arg(long)]
    spec_talents: String,

    /// Specialization name (e.g. Vengeance)
    #[arg(long)]
    spec: String,

    /// Clear the talent name and hash caches before running
    #[arg(long)]
    clear_cache: bool,

    /// Fetch a new talent tree dataset even if the cached one is fresh
    #[arg(long)]
    force_new: bool,

    /// TOML config file; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("talent_hasher=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(hash) => println!("{}", hash),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<String> {
    let config = match &args.config {
        Some(path) => HasherConfig::load(path)?,
        None => HasherConfig::default(),
    };

    let hasher = Arc::new(TalentHasher::from_config(config)?);
    let cache = HashCache::load(Arc::clone(&hasher), Arc::new(FsLocker));

    if args.clear_cache {
        hasher.clear_name_cache()?;
        cache.clear()?;
    }
    if args.force_new {
        hasher.request_metadata_refresh();
    }

    let hash = cache.get_or_compute(
        &args.hero_talents,
        &args.class_talents,
        &args.spec_talents,
        &args.spec,
    )?;
    cache.save()?;
    Ok(hash)
}
