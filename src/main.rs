// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kvstack::config::{load_config_with_env, ConfigLoader, KvConfig};
use kvstack::{collect_keys, SharedStore};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// kvstack - Uniform key-value store access over pluggable backends
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store URL (overrides the config file)
    #[arg(short, long, env = "KVSTACK_URL")]
    url: Option<String>,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a value to stdout, or write it to a file
    Get {
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store a value given inline, from a file, or from stdin
    Put {
        key: String,
        value: Option<String>,
        #[arg(short, long, conflicts_with = "value")]
        file: Option<PathBuf>,
    },
    /// Remove a key
    Delete { key: String },
    /// Print whether a key exists
    Exists { key: String },
    /// List keys
    Keys {
        prefix: Option<String>,
        /// Print a JSON array instead of one key per line
        #[arg(long)]
        json: bool,
    },
    /// List distinct key prefixes up to the next delimiter
    Prefixes {
        prefix: Option<String>,
        #[arg(short, long, default_value_t = '/')]
        delimiter: char,
    },
    /// Copy a value to another key
    Copy { source: String, dest: String },
}

fn resolve_config(args: &Args) -> Result<KvConfig> {
    let mut config = match (&args.url, &args.config) {
        (Some(url), _) => {
            let mut config = match &args.config {
                Some(path) => load_config_with_env(path)?,
                None => KvConfig::default(),
            };
            config.store = None;
            config.url = Some(url.clone());
            config
        }
        (None, Some(path)) => load_config_with_env(path)?,
        (None, None) => bail!("Either --config or --url (or KVSTACK_URL) is required"),
    };

    // Apply CLI overrides
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    ConfigLoader::validate(&config)?;
    Ok(config)
}

fn init_logging(config: &KvConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so values on stdout stay clean
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr);

    match config.logging.format.as_str() {
        "compact" => tracing::subscriber::set_global_default(builder.compact().finish())?,
        _ => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

fn run(store: &SharedStore, command: Command) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::Get { key, output } => match output {
            Some(path) => {
                let mut file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let written = store.get_into(&key, &mut file)?;
                info!("Wrote {} bytes to {}", written, path.display());
            }
            None => {
                store.get_into(&key, &mut out)?;
            }
        },
        Command::Put { key, value, file } => {
            match (value, file) {
                (Some(value), _) => store.put(&key, value.as_bytes())?,
                (None, Some(path)) => {
                    let mut input = File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    store.put_stream(&key, &mut input)?;
                }
                (None, None) => store.put_stream(&key, &mut io::stdin().lock())?,
            }
            debug!("Stored '{}'", key);
        }
        Command::Delete { key } => store.delete(&key)?,
        Command::Exists { key } => writeln!(out, "{}", store.exists(&key)?)?,
        Command::Keys { prefix, json } => {
            if json {
                let keys = collect_keys(store.as_ref(), prefix.as_deref())?;
                serde_json::to_writer(&mut out, &keys)?;
                writeln!(out)?;
            } else {
                for key in store.keys(prefix.as_deref())? {
                    writeln!(out, "{}", key?)?;
                }
            }
        }
        Command::Prefixes { prefix, delimiter } => {
            for entry in store.iter_prefixes(delimiter, prefix.as_deref())? {
                writeln!(out, "{entry}")?;
            }
        }
        Command::Copy { source, dest } => store.copy(&source, &dest)?,
    }

    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let config = resolve_config(&args)?;
    init_logging(&config)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from: {:?}", path);
    }

    let store = config.build_store().context("Failed to create store")?;
    info!("Store ready: {}", store.backend_type());

    run(&store, args.command)
}
