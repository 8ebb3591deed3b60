//! Transit CMAC host
//!
//! Reads one JSON CMAC request (from a file or stdin), runs it against the
//! local encrypted policy store and prints the JSON response. Also offers
//! small key import/list helpers for local use.

use anyhow::{anyhow, bail, Context, Result};
use armoricore_config::{LogFormat, TransitConfig};
use armoricore_keys::{init_policy_store, KeyType, PolicyStore};
use armoricore_logging::{init_logging, Output};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use transit_cmac::{CmacHandler, CmacRequest};

#[derive(Parser)]
#[command(name = "transit-cmac", version, about = "Generate CMACs with named, versioned keys")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a JSON CMAC request
    Generate {
        /// Request file; stdin when omitted
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Register a key, or add a version to an existing key of the same type
    Import {
        name: String,
        key_type: KeyType,
        material_hex: String,
    },
    /// List stored key names
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TransitConfig::from_env().context("Failed to load configuration")?;
    let output = match config.log_format {
        LogFormat::Console => Output::Console,
        LogFormat::Json => Output::Json,
    };
    init_logging("transit-cmac", config.log_level(), output)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let store = init_policy_store(&config.storage_path, None)
        .await
        .context("Failed to open policy store")?;

    match cli.command {
        Command::Generate { request } => generate(store, &config, request).await,
        Command::Import {
            name,
            key_type,
            material_hex,
        } => {
            let material = hex::decode(material_hex.trim()).context("Key material must be hex")?;
            let version = store
                .import(&name, key_type, material, &CancellationToken::new())
                .await
                .with_context(|| format!("Failed to import key {}", name))?;
            println!("{} v{}", name, version);
            Ok(())
        }
        Command::List => {
            for name in store.list_keys().await? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

async fn generate(
    store: Arc<PolicyStore>,
    config: &TransitConfig,
    request_path: Option<PathBuf>,
) -> Result<()> {
    let raw = match &request_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    let request: CmacRequest = serde_json::from_str(&raw).context("Malformed CMAC request")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, cancelling request");
                    cancel.cancel();
                }
                Err(err) => error!(error = %err, "Unable to listen for shutdown signal"),
            }
        });
    }

    let handler = CmacHandler::new(store).with_parallelism(config.batch_parallelism);
    match handler.generate(&request, &cancel).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", json!({ "errors": [e.to_string()] }));
            bail!("CMAC request failed ({:?})", e.kind())
        }
    }
}
