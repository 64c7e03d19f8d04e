//! Flowextract CLI
//!
//! Extracts the packets of one flow from a pcap-log rotation.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowextract::{extract_pcap_file, ExtractConfig};

#[derive(Parser)]
#[command(name = "flowextract")]
#[command(about = "Extract the packets of one flow from a pcap-log rotation")]
struct Args {
    /// Output pcap file (overwritten)
    #[arg(short, long)]
    output: PathBuf,

    /// Event document describing the flow (EVE JSON)
    #[arg(short, long)]
    event: PathBuf,

    /// Directory holding the capture rotation
    #[arg(short = 'd', long)]
    pcap_dir: Option<PathBuf>,

    /// Rotation file name pattern (%n thread, %i thread id, %t timestamp)
    #[arg(short, long)]
    file_format: Option<String>,

    /// Don't filter while reading; match every packet against the flow
    #[arg(long)]
    skip_bpf: bool,

    /// Seconds after the flow's last packet before it is considered over
    #[arg(long, value_name = "SECS")]
    flow_timeout: Option<u64>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = ExtractConfig::load(&args.output, &args.event)
        .context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_filter(args.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(dir) = args.pcap_dir {
        config.pcap_log_dir = dir;
    }
    if let Some(format) = args.file_format {
        config.file_format = format;
    }
    if args.skip_bpf {
        config.skip_bpf = true;
    }
    if let Some(secs) = args.flow_timeout {
        config.flow_timeout = Duration::from_secs(secs);
    }

    let summary = extract_pcap_file(&config)
        .with_context(|| format!("Failed to extract flow from {}", config.event_path.display()))?;

    println!("{}: {}", config.output.display(), summary);
    Ok(())
}
