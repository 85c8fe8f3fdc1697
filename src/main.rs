use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use geomatch::cache::ResolutionCache;
use geomatch::config::{load_config, ResolverConfig, CONFIG_FILENAME};
use geomatch::resolution::Resolver;
use geomatch::types::*;

/// Location identifier resolution against local reference data.
#[derive(Parser)]
#[command(name = "geomatch", about = "Resolve location identifiers to geometries")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one identifier
    Resolve {
        /// Identifier such as L-450100 or L-RIVER-Wusi River>Pubei County reach
        identifier: String,
        /// Free-text context (geographic description)
        #[arg(long)]
        context: Option<String>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Show reference index and cache statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Manage the resolution cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove every entry
    Clear,
    /// Remove one entry by identifier key
    Invalidate {
        /// Canonical identifier, e.g. L-450123>SomeTownship
        key: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("geomatch=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load(path: &Path) -> geomatch::errors::Result<ResolverConfig> {
    let mut config = load_config(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> geomatch::errors::Result<()> {
    let config = load(&cli.config)?;

    match cli.command {
        Commands::Resolve {
            identifier,
            context,
            json,
        } => {
            let resolver = Resolver::from_config(&config);
            let result = resolver.resolve(&identifier, context.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&identifier, &result);
            }
        }
        Commands::Stats { json } => {
            let resolver = Resolver::from_config(&config);
            let stats = resolver.index().stats();
            let cache_entries = resolver.cache().len();
            if json {
                let value = serde_json::json!({
                    "index": stats,
                    "cache_entries": cache_entries,
                    "geocoding_enabled": resolver.has_geocoder(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Reference index");
                println!(
                    "  Administrative: {} province, {} city, {} county",
                    stats.admin_province, stats.admin_city, stats.admin_county
                );
                println!(
                    "  River:          {} province, {} city, {} county",
                    stats.river_province, stats.river_city, stats.river_county
                );
                println!("Cache entries:    {}", cache_entries);
                println!(
                    "Geocoding:        {}",
                    if resolver.has_geocoder() {
                        config.geocode.provider.as_str()
                    } else {
                        "disabled"
                    }
                );
            }
        }
        Commands::Cache { action } => {
            let cache = ResolutionCache::open(&config.cache_file);
            match action {
                CacheAction::Clear => {
                    let count = cache.len();
                    cache.clear()?;
                    println!("Cleared {} cache entries", count);
                }
                CacheAction::Invalidate { key } => {
                    if cache.invalidate(key.trim())? {
                        println!("Removed {}", key.trim());
                    } else {
                        println!("No cache entry for {}", key.trim());
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_result(identifier: &str, result: &MatchResult) {
    println!("{}: {}", identifier, result.status.as_str());
    if let Some(feature) = &result.matched_feature {
        println!("  Feature: {} ({} {})", feature.name, feature.domain, feature.tier);
        if let Some(code) = &feature.code {
            println!("  Code:    {}", code);
        }
        println!("  Source:  {}", feature.source);
        println!("  Type:    {}", feature.geometry_type);
    }
    if let Some(point) = &result.geocoded_point {
        println!("  Point:   {}", point.to_wkt());
    }
    println!("  Path:");
    for step in &result.fallback_path {
        let tier = step.tier.map(|t| t.as_str()).unwrap_or("-");
        let outcome = match &step.outcome {
            StepOutcome::Hit => "hit".to_string(),
            StepOutcome::Miss => "miss".to_string(),
            StepOutcome::Skipped { reason } => format!("skipped ({reason})"),
            StepOutcome::Failed { cause } => format!("failed ({cause})"),
        };
        println!(
            "    {:<13} {:<8} {:<30} {}",
            step.strategy.as_str(),
            tier,
            step.query,
            outcome
        );
    }
}
