//! Debian Mirror Selector CLI
//!
//! Builds a sources.list from the fastest mirrors in the Debian mirror
//! directory that match a release, architecture and protocol set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use mirror_selector::{
    error::Result,
    models::{Config, SelectionPolicy, SiteRecord, parse_protocols},
    pipeline,
    services::{DirectoryTokenizer, LatencyProber, SourcesListRenderer},
    utils::{arch, log as progress},
};
use serde::Serialize;

/// Config file looked up when `--config` is not given.
const DEFAULT_CONFIG: &str = "mirror-selector.toml";

/// Debian Mirror Selector
#[derive(Parser, Debug)]
#[command(
    name = "mirror-selector",
    version,
    about = "Creates a sources.list with the fastest Debian mirrors that fit the given criteria"
)]
struct Cli {
    /// Path to a TOML config file (default: ./mirror-selector.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe matching mirrors and write a sources.list
    Select {
        #[command(flatten)]
        criteria: Criteria,

        /// File to write [default: output.out_file from config]
        #[arg(short, long)]
        out_file: Option<PathBuf>,

        /// Include contrib, non-free and non-free-firmware
        #[arg(short, long)]
        nonfree: bool,

        /// Also write deb-src lines
        #[arg(short, long)]
        source_packages: bool,

        /// Write the full ranking as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List mirrors matching the criteria without probing them
    List {
        #[command(flatten)]
        criteria: Criteria,
    },

    /// Validate the configuration
    Validate,
}

#[derive(Args, Debug)]
struct Criteria {
    /// Saved copy of the mirror directory [default: fetch source.directory_url]
    infile: Option<PathBuf>,

    /// Protocols mirrors must serve on
    #[arg(short, long, default_value = "https", value_name = "P1,P2,...")]
    protocols: String,

    /// Architecture to look for [default: dpkg --print-architecture]
    #[arg(short, long)]
    architecture: Option<String>,

    /// Release to look for
    #[arg(short, long, default_value = "stable")]
    release: String,
}

impl Criteria {
    fn policy(&self) -> SelectionPolicy {
        let architecture = self
            .architecture
            .clone()
            .unwrap_or_else(arch::detect_architecture);
        SelectionPolicy::new(&self.release, &architecture, &parse_protocols(&self.protocols))
    }
}

/// Ranking entry written by `--report`.
#[derive(Serialize)]
struct ReportEntry<'a> {
    rank: usize,
    #[serde(flatten)]
    site: &'a SiteRecord,
    reachable: bool,
}

/// Initialize logging with the given default filter; `RUST_LOG` overrides it.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Read the config file named on the command line, or the default one if present.
fn read_config(explicit: Option<&Path>) -> Result<Option<Config>> {
    match explicit {
        Some(path) => Config::load(path).map(Some),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG).map(Some),
        None => Ok(None),
    }
}

fn write_report(path: &Path, ranked: &[SiteRecord]) -> Result<()> {
    let entries: Vec<ReportEntry<'_>> = ranked
        .iter()
        .enumerate()
        .map(|(i, site)| ReportEntry {
            rank: i + 1,
            site,
            reachable: site.is_reachable(),
        })
        .collect();
    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = read_config(cli.config.as_deref());
    let level = if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "warn".to_string()
    } else {
        loaded
            .as_ref()
            .ok()
            .and_then(|c| c.as_ref())
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|| "info".to_string())
    };
    init_logging(&level);

    let config = loaded?.unwrap_or_default();
    config.validate()?;

    match cli.command {
        Command::Select {
            criteria,
            out_file,
            nonfree,
            source_packages,
            report,
        } => {
            let policy = criteria
                .policy()
                .with_nonfree(nonfree)
                .with_source_packages(source_packages);
            policy.validate()?;
            let out_file = out_file.unwrap_or_else(|| PathBuf::from(&config.output.out_file));

            progress::header("Debian Mirror Selector");
            progress::step(1, 3, "Loading mirror directory");
            let tokens = pipeline::load_tokens(criteria.infile.as_deref(), &config).await?;

            progress::step(2, 3, "Probing matching mirrors");
            progress::sub_item(&format!(
                "release {}, architecture {}, protocols {}",
                policy.release,
                policy.architecture,
                policy.protocols.join(",")
            ));
            let prober = Arc::new(LatencyProber::new(&config.probe)?);
            let selection =
                pipeline::run_selection(tokens, policy.clone(), &config.probe, prober).await?;

            if let Some(path) = report {
                write_report(&path, &selection.ranked)?;
                log::info!("Ranking report saved to {}", path.display());
            }

            progress::step(3, 3, "Writing sources.list");
            let written = SourcesListRenderer::new(&policy, &config.output)
                .write(&selection.ranked, &out_file)
                .await?;
            log::info!("Wrote {} mirrors to {}", written, out_file.display());
        }

        Command::List { criteria } => {
            let policy = criteria.policy();
            let tokens = pipeline::load_tokens(criteria.infile.as_deref(), &config).await?;
            let candidates = pipeline::list_candidates(tokens, &policy)?;

            for site in &candidates {
                println!(
                    "{}\t{}\t{}",
                    site.canonical_host(),
                    site.country.as_deref().unwrap_or("-"),
                    site.endpoints
                        .values()
                        .map(|url| url.as_str())
                        .collect::<Vec<_>>()
                        .join(" ")
                );
            }
            log::info!(
                "{} mirrors serve {} over {}",
                candidates.len(),
                policy.architecture,
                policy.protocols.join(",")
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            DirectoryTokenizer::new()?;
            log::info!("✓ Config OK");
            log::info!("All validations passed!");
        }
    }

    Ok(())
}
