use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use webstash::{Expiry, StashConfig, Storage};

#[derive(Parser, Debug)]
#[command(name = "webstash-cli")]
#[command(about = "webstash CLI - namespaced, expiring key-value storage", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Page URL keys are namespaced under (overrides the config)
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// Fragment override for the key namespace
    #[arg(short = 'f', long)]
    fragment: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a value
    Set {
        key: String,
        value: String,
        /// Expire after this many milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,
    },
    /// Read a value
    Get { key: String },
    /// Remove a value
    Remove { key: String },
    /// Remove every key of an origin (default: the page origin)
    Clear { origin: Option<String> },
    /// Remove every key of every origin
    ClearAll,
    /// List logical keys across all origins
    Index,
    /// Show the backend in use and the page namespace
    Info,
}

fn init_tracing(config: &StashConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(args: &Args) -> Result<StashConfig> {
    let mut config = match &args.config {
        Some(path) => StashConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StashConfig::default(),
    };

    if let Some(url) = &args.url {
        config.page.url = url.clone();
    }
    Ok(config)
}

fn execute(storage: &Storage, command: &Command, fragment: Option<&str>) -> Result<String> {
    let output = match command {
        Command::Set { key, value, ttl_ms } => {
            match ttl_ms {
                Some(ms) => {
                    storage.set_with_ttl(key, value.as_str(), Duration::from_millis(*ms), fragment)
                }
                None => storage.set_item(key, value.as_str(), Expiry::Never, fragment),
            }
            "OK".green().to_string()
        }
        Command::Get { key } => match storage.get_item(key, fragment) {
            Some(value) => format!("\"{}\"", value),
            None => "(nil)".dimmed().to_string(),
        },
        Command::Remove { key } => {
            storage.remove_item(key, fragment);
            "OK".green().to_string()
        }
        Command::Clear { origin } => {
            let count = storage.clear(origin.as_deref());
            format!("(integer) {}", count)
        }
        Command::ClearAll => {
            let count = storage.clear_all();
            format!("(integer) {}", count)
        }
        Command::Index => {
            let keys = storage.index();
            if keys.is_empty() {
                "(empty list)".dimmed().to_string()
            } else {
                keys.iter()
                    .enumerate()
                    .map(|(i, key)| format!("{}) \"{}\"", i + 1, key))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Command::Info => {
            let backend = storage
                .available()
                .map(|b| b.kind().as_str().to_string())
                .unwrap_or_else(|| "none".to_string());
            let page = storage.page();
            format!(
                "backend: {}\norigin: {}\npath: {}\nfragment: {}",
                backend.cyan(),
                page.origin,
                page.path,
                fragment.unwrap_or(&page.fragment)
            )
        }
    };

    Ok(output)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config);

    info!("Starting webstash-cli v{}", env!("CARGO_PKG_VERSION"));

    let page = config.to_page_context()?;
    let storage = Storage::with_options(page, &config.to_backend_options());
    if storage.available().is_none() {
        eprintln!("{}", "No storage backend available".yellow());
    }

    let start = Instant::now();
    let output = execute(&storage, &args.command, args.fragment.as_deref())?;
    debug!("Executed {:?} in {:.2?}", args.command, start.elapsed());

    println!("{}", output);
    Ok(())
}
