//! The `tradeflow` binary: recovery, generation, OCR and admin config from the shell.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tradeflow::commands::{self, GenerateOptions};
use tradeflow::config::AppConfig;
use tradeflow::errors::Error;
use tradeflow_recovery::Expect;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Admin retry config file (overrides TRADEFLOW_RETRY_CONFIG)
    #[arg(long, global = true)]
    retry_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recovers JSON from a model reply read from FILE or stdin
    Recover {
        /// Shape to recover
        #[arg(long, value_enum, default_value_t = Shape::Array)]
        expect: Shape,
        /// Reply file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Shows or initialises the admin retry config
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Asks the configured model for JSON records
    Generate {
        /// User prompt
        #[arg(long)]
        prompt: String,
        /// System prompt
        #[arg(long, default_value = "Reply with JSON only.")]
        system: String,
        /// Generate a single object instead of a list
        #[arg(long)]
        object: bool,
        /// JSON Schema file to validate against
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Runs a document through OCR
    Ocr {
        /// Document to recognise
        file: PathBuf,
        /// Estimated page count, used to size the timeout
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// The document is a clean, high-quality scan
        #[arg(long)]
        high_quality: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Prints the config in effect
    Show,
    /// Writes a default config file
    Init {
        /// Target file (defaults to the standard location)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Shape of the JSON to recover
#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    /// A list of records
    Array,
    /// A single object
    Object,
}

impl From<Shape> for Expect {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Array => Self::Array,
            Shape::Object => Self::Object,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env();
    if let Some(path) = cli.retry_config {
        config = config.with_retry_config_path(path);
    }

    match cli.command {
        Commands::Recover { expect, file } => commands::recover(file.as_deref(), expect.into())?,
        Commands::Config { action: ConfigAction::Show } => commands::config_show(&config)?,
        Commands::Config {
            action: ConfigAction::Init { path, force },
        } => {
            let path = match path {
                Some(path) => path,
                None => commands::default_config_path(&config)?,
            };
            commands::config_init(&path, force)?;
        }
        Commands::Generate {
            prompt,
            system,
            object,
            schema,
        } => {
            commands::generate(
                config,
                &GenerateOptions {
                    system,
                    prompt,
                    object,
                    schema,
                },
            )
            .await?;
        }
        Commands::Ocr {
            file,
            pages,
            high_quality,
        } => commands::ocr(config, &file, pages, high_quality).await?,
    }

    Ok(())
}
