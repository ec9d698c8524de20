//! Lit PKP client CLI
//!
//! Inspect configuration, the wallet and the stored PKP, preview the SIWE
//! challenge a session would sign, and drive the live client: run a Lit
//! Action, mint a PKP, or sign a digest with it.

use clap::{Parser, Subcommand};
use lit_pkp_client::auth::siwe::expiration_in;
use lit_pkp_client::auth::{default_resource_abilities, SiweChallenge};
use lit_pkp_client::{
    storage, CredentialStore, Error, LitClient, LitConfig, Result, WalletCredential,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lit-pkp")]
#[command(about = "Lit Protocol PKP client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Config,

    /// Show the address of the wallet in LIT_PRIVATE_KEY
    Address,

    /// Show the stored PKP record
    Pkp,

    /// Render the SIWE challenge the wallet would sign for a session
    Challenge {
        /// URI the session is requested for
        #[arg(long)]
        uri: String,

        /// Nonce (normally the latest Lit blockhash)
        #[arg(long)]
        nonce: String,

        /// Also sign the challenge and print the resulting auth sig
        #[arg(long)]
        sign: bool,
    },

    /// Run a Lit Action on the nodes
    Execute {
        /// JavaScript source of the action
        #[arg(required_unless_present = "file")]
        code: Option<String>,

        /// Read the action from a file instead
        #[arg(long, conflicts_with = "code")]
        file: Option<PathBuf>,

        /// JSON object passed to the action as `jsParams`
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Mint a PKP controlled by the wallet and store it
    Mint,

    /// Sign a hex-encoded 32-byte digest with the stored PKP
    Sign {
        /// Digest to sign, with or without 0x prefix
        digest: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load config
    let config = match &cli.config {
        Some(config_path) => {
            let content = std::fs::read_to_string(config_path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
            })?;
            serde_json::from_str::<LitConfig>(&content)
                .map_err(|e| Error::Config(e.to_string()))?
        }
        None => LitConfig::default(),
    };

    // Initialize logging
    let filter = if cli.verbose || config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = config.with_env_overrides()?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Address => {
            let wallet = load_wallet(&config)?;
            println!("{}", wallet.address_string());
        }
        Commands::Pkp => {
            show_pkp(&config).await?;
        }
        Commands::Challenge { uri, nonce, sign } => {
            render_challenge(&config, uri, nonce, sign)?;
        }
        Commands::Execute { code, file, params } => {
            let code = match (code, file) {
                (Some(code), _) => code,
                (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| {
                    Error::InvalidArgument(format!("Failed to read {}: {}", path.display(), e))
                })?,
                (None, None) => return Err(Error::InvalidArgument("No code provided".to_string())),
            };
            let params = serde_json::from_str(&params)
                .map_err(|e| Error::InvalidArgument(format!("Invalid --params JSON: {}", e)))?;

            let client = connect(config).await?;
            let result = client.execute_js(&code, params).await;
            finish(&client, result).await?;
        }
        Commands::Mint => {
            let client = connect(config).await?;
            let result = client.create_wallet().await;
            finish(&client, result).await?;
        }
        Commands::Sign { digest } => {
            let client = connect(config).await?;
            let result = client.sign_hex(&digest).await;
            finish(&client, result).await?;
        }
    }

    Ok(())
}

/// Open a client against the configured nodes and wait for them
async fn connect(config: LitConfig) -> Result<LitClient> {
    let client = LitClient::from_config(config)?;
    client.connect().await?;
    client.wait_until_ready().await?;
    Ok(client)
}

/// Print the result, then disconnect whether or not the call succeeded
async fn finish<T: Serialize>(client: &LitClient, result: Result<T>) -> Result<()> {
    let printed = result.and_then(|value| {
        println!("{}", serde_json::to_string_pretty(&value)?);
        Ok(())
    });
    client.disconnect().await?;
    printed
}

fn load_wallet(config: &LitConfig) -> Result<WalletCredential> {
    let key = config.private_key.as_ref().ok_or_else(|| {
        Error::Config(format!(
            "{} is not set",
            lit_pkp_client::config::env_vars::LIT_PRIVATE_KEY
        ))
    })?;
    WalletCredential::from_secret(key, &config.rpc_url)
}

async fn show_pkp(config: &LitConfig) -> Result<()> {
    let store = CredentialStore::new(storage::open(&config.storage)?);

    match store.get().await? {
        Some(pkp) => println!("{}", serde_json::to_string_pretty(&pkp)?),
        None => {
            tracing::info!(storage = ?config.storage, "No PKP stored");
            println!("null");
        }
    }
    Ok(())
}

fn render_challenge(config: &LitConfig, uri: String, nonce: String, sign: bool) -> Result<()> {
    let wallet = load_wallet(config)?;
    let expiration = expiration_in(config.session_ttl());

    let message = SiweChallenge::new(wallet.address_string(), uri, nonce, expiration)
        .with_config(&config.siwe)
        .with_resources(default_resource_abilities())
        .render()?;

    if sign {
        let auth_sig = wallet.auth_sig(&message)?;
        println!("{}", serde_json::to_string_pretty(&auth_sig)?);
    } else {
        println!("{}", message);
    }
    Ok(())
}
