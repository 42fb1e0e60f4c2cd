#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the listing harvester.
//!
//! `listing_harvest` (or `listing_harvest run`) fetches every configured
//! query and writes this month's Parquet partition. `configs` and
//! `district` are read-only helpers for checking a configuration and a
//! boundary file.
//!
//! Uses `indicatif-log-bridge` (via [`listing_harvest_cli_utils::init_logger`])
//! so log lines and the progress bar share the terminal cleanly.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use listing_harvest::HarvestConfig;
use listing_harvest_cli_utils::IndicatifProgress;
use listing_harvest_spatial::DistrictIndex;

#[derive(Parser)]
#[command(name = "listing_harvest", about = "Real-estate listings harvester")]
struct Cli {
    /// Path to the harvest configuration file
    #[arg(long, global = true, default_value = "harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured query and write the current month partition (default)
    Run(RunArgs),
    /// List the expanded query configurations without fetching anything
    Configs,
    /// Resolve one point against the district boundary file
    District {
        /// Latitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Boundary file (overrides `settings.boundaries_path`)
        #[arg(long)]
        boundaries: Option<PathBuf>,
    },
}

/// Overrides for `[settings]`.
#[derive(Args, Default)]
struct RunArgs {
    /// Output root directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// District boundary file
    #[arg(long)]
    boundaries: Option<PathBuf>,
    /// Rows per Parquet chunk file
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Maximum number of query configurations processed at once
    #[arg(long)]
    concurrency: Option<usize>,
    /// Pause after each listing, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

impl RunArgs {
    fn apply(self, config: &mut HarvestConfig) {
        let settings = &mut config.settings;
        if let Some(output_dir) = self.output_dir {
            settings.output_dir = output_dir;
        }
        if let Some(boundaries) = self.boundaries {
            settings.boundaries_path = boundaries;
        }
        if let Some(chunk_size) = self.chunk_size {
            settings.chunk_size = chunk_size;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(delay_ms) = self.delay_ms {
            settings.delay_ms = delay_ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = listing_harvest_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let mut config = HarvestConfig::load(&cli.config)?;
            args.apply(&mut config);
            config.validate()?;

            let progress = IndicatifProgress::configs_bar(&multi, "Harvesting");
            let summary = listing_harvest::run(&config, progress).await?;

            log::info!(
                "Wrote {} rows from {} query configuration(s) ({} failed)",
                summary.rows, summary.configs, summary.failed
            );
        }
        Commands::Configs => {
            let config = HarvestConfig::load(&cli.config)?;
            config.validate()?;

            for query in config.query_configs() {
                println!("{:<40} {}", query.label(), query.build_url());
            }
        }
        Commands::District {
            lat,
            lon,
            boundaries,
        } => {
            let path = match boundaries {
                Some(path) => path,
                None => HarvestConfig::load(&cli.config)?.settings.boundaries_path,
            };
            let index = DistrictIndex::load(&path)?;
            println!("{}", index.resolve(lat, lon));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_override_settings() {
        let cli = Cli::parse_from([
            "listing_harvest",
            "run",
            "--chunk-size",
            "10",
            "--delay-ms",
            "0",
            "--output-dir",
            "/tmp/out",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        let mut config = HarvestConfig::default();

        args.apply(&mut config);

        assert_eq!(config.settings.chunk_size, 10);
        assert_eq!(config.settings.delay_ms, 0);
        assert_eq!(config.settings.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.settings.concurrency, 4);
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::parse_from(["listing_harvest", "--config", "other.toml"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }
}
