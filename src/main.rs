//! Command line entry point for the tier ladder
//!
//! Loads the configured tiers and store, runs one command against them and
//! shuts the query worker down cleanly so every queued write is persisted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tier_ladder::config::AppConfig;
use tier_ladder::tier::{Tier, TierRegistry};
use tier_ladder::{Dex, PokeSlot, Team, TierError};
use tracing::{error, info};

/// Tier Ladder - format legality and rating ladders for battle tiers
#[derive(Parser)]
#[command(
    name = "tier-ladder",
    version,
    about = "Tier legality checks and Elo rating ladders",
    long_about = "Tier Ladder keeps a hierarchy of battle tiers, each banning species \
                 and held items and inheriting the bans of its parent, together with \
                 a per-tier Elo ladder persisted in a member store."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Store backend override
    #[arg(long, value_name = "BACKEND", help = "Override store backend (memory, json)")]
    store: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Load configuration and tiers, print them and exit")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print every tier definition
    Tiers,
    /// Print a member's rating in a tier
    Rating { tier: String, name: String },
    /// Print a member's ladder position in a tier
    Ranking { tier: String, name: String },
    /// Record a battle result
    Record {
        tier: String,
        winner: String,
        loser: String,
    },
    /// Check a team of `Species` or `Species@Item` members against a tier
    Check {
        tier: String,
        #[arg(required = true, num_args = 1..=6)]
        members: Vec<String>,
    },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Tier Ladder {}", tier_ladder::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Store: {} ({})", config.store.backend, config.store.data_dir.display());
    info!("   Seed dir: {}", config.store.seed_dir.display());
    info!("   Cache capacity: {}", config.cache.capacity);
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(backend) = &args.store {
        config.store.backend = backend.clone();
    }

    tier_ladder::config::validate_config(&config)?;
    Ok(config)
}

/// Parse `Species` or `Species@Item` into a team slot
fn parse_slot(dex: &Dex, member: &str) -> Result<PokeSlot> {
    let (species, item) = match member.split_once('@') {
        Some((species, item)) => (species.trim(), Some(item.trim())),
        None => (member.trim(), None),
    };

    let species_id = dex
        .species_id(species)
        .with_context(|| format!("Unknown species '{}'", species))?;
    let item_id = match item {
        Some(item) => dex
            .item_id(item)
            .with_context(|| format!("Unknown item '{}'", item))?,
        None => 0,
    };

    Ok(PokeSlot::new(species_id, item_id))
}

fn print_tiers(registry: &TierRegistry) {
    for line in registry.to_config_strings() {
        println!("{}", line);
    }
}

/// Run one command. Ladder queries block on the query worker, so this runs
/// off the async runtime.
fn run_command(registry: &mut TierRegistry, command: Command) -> Result<()> {
    match command {
        Command::Tiers => print_tiers(registry),
        Command::Rating { tier, name } => {
            let member = name.clone();
            registry.load_member(
                &tier,
                &name,
                Box::new(move |tier: &mut Tier| {
                    if tier.exists(&member) {
                        println!("{}: {}", member, tier.rating(&member));
                    } else {
                        println!("{}: unrated ({})", member, tier.rating(&member));
                    }
                }),
            )?;
            while registry.pending_loads() > 0 {
                if !registry.wait_for_completion() {
                    return Err(TierError::WorkerUnavailable.into());
                }
            }
        }
        Command::Ranking { tier, name } => {
            let rank = registry.ranking(&tier, &name)?;
            let total = registry.count(&tier)?;
            if rank < 0 {
                println!("{}: not ranked ({} members)", name, total);
            } else {
                println!("{}: #{} of {}", name, rank, total);
            }
        }
        Command::Record {
            tier,
            winner,
            loser,
        } => {
            let update = registry.change_rating(&tier, &winner, &loser)?;
            println!("{} -> {}", update.winner.name, update.winner.rating);
            println!("{} -> {}", update.loser.name, update.loser.rating);
        }
        Command::Check { tier, members } => {
            let slots = members
                .iter()
                .map(|member| parse_slot(registry.dex(), member))
                .collect::<Result<Vec<_>>>()?;

            for (member, slot) in members.iter().zip(&slots) {
                if registry.is_banned(&tier, slot)? {
                    println!("{}: banned in {}", member, tier);
                }
            }

            let team = Team::from_slots(slots);
            if registry.is_valid(&tier, &team)? {
                println!("Team is valid in {}", tier);
            } else {
                println!("Team is not valid in {}", tier);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    let mut registry = match TierRegistry::from_config(&config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to load tiers: {:#}", e);
            std::process::exit(1);
        }
    };

    if args.dry_run {
        info!("Configuration validation successful");
        print_tiers(&registry);
        info!("Dry run completed - {} tiers loaded", registry.len());
        return tokio::task::spawn_blocking(move || registry.shutdown()).await?;
    }

    let command = args.command.unwrap_or(Command::Tiers);
    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = run_command(&mut registry, command);
        // Persist queued writes even if the command failed
        registry.shutdown().and(outcome)
    })
    .await?;

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
