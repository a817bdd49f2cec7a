mod decode;
mod info;

use std::fs::File;
use std::io::{stderr, stdin, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vedirect::text::DecoderConfig;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Decode VE.Direct text blocks, writing one line per valid block.
    ///
    /// Input may be a capture file or a serial device that has already been
    /// configured (19200 baud, 8N1). Use - to read from stdin.
    Decode {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: Format,

        /// Also write a line for each rejected block.
        #[arg(short, long, action)]
        errors: bool,

        /// JSON file with decoder limits, e.g., {"max_fields": 32}.
        #[arg(short, long, value_name = "path")]
        config: Option<PathBuf>,

        /// Input path.
        input: PathBuf,
    },
    /// Decode an entire input and show a summary of the fields and errors seen.
    Info {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: Format,

        /// JSON file with decoder limits.
        #[arg(short, long, value_name = "path")]
        config: Option<PathBuf>,

        /// Input path.
        input: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<DecoderConfig> {
    let Some(path) = path else {
        return Ok(DecoderConfig::default());
    };
    let file = File::open(path).with_context(|| format!("opening config {path:?}"))?;
    let config: DecoderConfig =
        serde_json::from_reader(file).with_context(|| format!("parsing config {path:?}"))?;
    config.validate()?;
    debug!("using {config:?}");
    Ok(config)
}

fn open_input(input: &Path) -> Result<Box<dyn Read + Send>> {
    if input == Path::new("-") {
        return Ok(Box::new(stdin()));
    }
    let file = File::open(input).with_context(|| format!("opening input {input:?}"))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("VEDIRECT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Decode {
            format,
            errors,
            config,
            input,
        } => {
            let config = load_config(config.as_ref())?;
            decode::decode(open_input(input)?, config, format, *errors)
        }
        Commands::Info {
            format,
            config,
            input,
        } => {
            let config = load_config(config.as_ref())?;
            info::info(input, open_input(input)?, config, format)
        }
    }
}
