//! # VDataBProt CLI
//!
//! `vdbp` operates on a data directory directly: write and read vectors,
//! manage links, and run the auditor's passes once or on a schedule.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vdatabprot_core::types::{ContextType, VectorId};
use vdatabprot_core::utils::format_bytes;
use vdatabprot_core::Config;
use vdatabprot_storage::{AccessLayer, AuditSchedule, RecordStore};

#[derive(Parser)]
#[command(name = "vdbp")]
#[command(version, about = "VDataBProt - verified, compressed vector storage with link-driven prefetch")]
struct Cli {
    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file (or stdin) and print its id
    Write {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
        /// Id to store under; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Content type recorded in the metadata
        #[arg(long = "type")]
        content_type: Option<String>,
    },
    /// Print the original bytes of a vector
    Read {
        id: String,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Link two vectors
    Link {
        source: String,
        target: String,
        #[arg(long = "type", default_value = "causal")]
        context_type: ContextType,
        #[arg(long, default_value_t = 0.5)]
        strength: f32,
    },
    /// List the outgoing links of a vector
    Links { id: String },
    /// Verify every stored record; exits with status 2 on corruption
    Patrol,
    /// List vectors whose last access is older than the given age
    Stale {
        #[arg(long)]
        max_age_secs: u64,
    },
    /// Derive links from co-access in the access log
    Analyze {
        /// Co-access window; the configured window when omitted
        #[arg(long)]
        window_ms: Option<u64>,
    },
    /// Run the auditor on its schedule until interrupted
    Audit,
    /// Show store statistics
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {:?}", path))?,
        None => Config::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    init_tracing(&config, cli.verbose);

    let layer = AccessLayer::open(&config)
        .with_context(|| format!("opening data directory {:?}", config.storage.data_dir))?;

    match cli.command {
        Commands::Write {
            file,
            id,
            content_type,
        } => {
            let data = match file {
                Some(path) => std::fs::read(&path).with_context(|| format!("reading {:?}", path))?,
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            let id = id.map(VectorId::from);
            let id = match content_type {
                Some(content_type) => layer.write_typed(&data, &content_type, id)?,
                None => layer.write(&data, id)?,
            };
            println!("{}", id);
        }
        Commands::Read { id, out } => {
            let data = layer.read(&VectorId::from(id))?;
            match out {
                Some(path) => {
                    std::fs::write(&path, &data).with_context(|| format!("writing {:?}", path))?
                }
                None => std::io::stdout().write_all(&data)?,
            }
        }
        Commands::Link {
            source,
            target,
            context_type,
            strength,
        } => {
            layer.add_link(
                &VectorId::from(source),
                &VectorId::from(target),
                context_type,
                strength,
            )?;
        }
        Commands::Links { id } => {
            for link in layer.links_for(&VectorId::from(id)) {
                println!(
                    "{} -> {}\t{}\t{:.3}",
                    link.source_vector_id,
                    link.target_vector_id,
                    link.context_type,
                    link.strength_score
                );
            }
        }
        Commands::Patrol => {
            let report = layer.auditor(&config).run_integrity_patrol()?;
            println!("verified: {}", report.verified);
            println!("corrupted: {}", report.corrupted.len());
            for id in &report.corrupted {
                println!("  {}", id);
            }
            if !report.is_clean() {
                std::process::exit(2);
            }
        }
        Commands::Stale { max_age_secs } => {
            let stale = layer
                .auditor(&config)
                .run_anti_entropy_analysis(Duration::from_secs(max_age_secs))?;
            for id in stale {
                println!("{}", id);
            }
        }
        Commands::Analyze { window_ms } => {
            let window = window_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.auditor.co_access_window());
            let created = layer.auditor(&config).analyze_access_patterns(window)?;
            println!("links created: {}", created);
        }
        Commands::Audit => {
            let auditor = Arc::new(layer.auditor(&config));
            let handle = auditor.spawn(AuditSchedule::from(&config.auditor));
            info!(
                patrol_secs = config.auditor.patrol_interval_secs,
                analysis_secs = config.auditor.analysis_interval_secs,
                "Auditor running, Ctrl-C to stop"
            );
            tokio::signal::ctrl_c().await?;
            handle.shutdown().await;
            layer.sync()?;
        }
        Commands::Info => {
            let vectors_size = file_size(&config.storage.vectors_path());
            let links_size = file_size(&config.storage.links_path());
            let access_size = file_size(&config.storage.access_log_path());
            println!("data dir:   {}", config.storage.data_dir.display());
            println!("records:    {} ({})", layer.store().len(), format_bytes(vectors_size));
            println!("links:      {} ({})", layer.links().link_count(), format_bytes(links_size));
            println!("access log: {}", format_bytes(access_size));
            println!("codec:      {}", config.codec.algorithm);
        }
    }

    Ok(())
}

fn init_tracing(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
