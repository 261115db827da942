//! DDC CLI
//!
//! Command-line client for a DDC storage cluster.
//!
//! # Commands
//! - `upload` - Store a file, optionally encrypted and named
//! - `download` - Read a file by CID or name
//! - `share` - Grant a box key access to a key path
//! - `account` - Show this account's public keys
//! - `config` - Show or initialize configuration
//!
//! # Configuration
//! Config file: ~/.ddc/config.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddc_client::{ClientConfig, DdcClient};
use std::path::PathBuf;

mod commands;
mod config;
mod symbols;

use commands::{account, download, share, upload};
use config::DdcConfig;

#[derive(Parser)]
#[command(name = "ddc")]
#[command(about = "DDC decentralized storage CLI")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.ddc/config.toml)
    #[arg(long, global = true, env = "DDC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file
    Upload {
        /// Path to the file
        path: PathBuf,

        /// Target bucket (overrides config file)
        #[arg(short, long)]
        bucket_id: Option<u64>,

        /// Bind this CNS name to the stored CID
        #[arg(short, long)]
        name: Option<String>,

        /// Encrypt under the key derived for this path
        #[arg(short, long)]
        encrypt: Option<String>,

        /// Part size in bytes for large files
        #[arg(long)]
        part_size: Option<usize>,
    },

    /// Read a file by CID or CNS name
    Download {
        /// CID or name
        target: String,

        /// Bucket (overrides config file)
        #[arg(short, long)]
        bucket_id: Option<u64>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Decrypt with the key derived for this path
        #[arg(short, long, conflicts_with = "sealed_key")]
        decrypt: Option<String>,

        /// Decrypt with a key shared to us (CID of the sealed key piece)
        #[arg(long)]
        sealed_key: Option<String>,

        /// Path below the shared key
        #[arg(long, requires = "sealed_key")]
        sub_path: Option<String>,
    },

    /// Share the key for a path with another box key
    Share {
        /// Key path to share
        path: String,

        /// Recipient box public key (hex)
        #[arg(short, long)]
        recipient: String,

        /// Bucket (overrides config file)
        #[arg(short, long)]
        bucket_id: Option<u64>,
    },

    /// Show this account's keys
    Account,

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Create a config file with freshly generated keys
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Upload {
            path,
            bucket_id,
            name,
            encrypt,
            part_size,
        } => {
            let client = build_client(&cfg)?;
            let config = upload::UploadConfig {
                path,
                bucket_id: cfg.bucket(bucket_id)?,
                name,
                encrypt,
                part_size,
            };
            upload::run(&client, config).await?;
        }

        Commands::Download {
            target,
            bucket_id,
            output,
            decrypt,
            sealed_key,
            sub_path,
        } => {
            let client = build_client(&cfg)?;
            let config = download::DownloadConfig {
                target,
                bucket_id: cfg.bucket(bucket_id)?,
                output,
                decrypt,
                sealed_key,
                sub_path,
            };
            download::run(&client, config).await?;
        }

        Commands::Share {
            path,
            recipient,
            bucket_id,
        } => {
            let client = build_client(&cfg)?;
            let config = share::ShareConfig {
                path,
                recipient,
                bucket_id: cfg.bucket(bucket_id)?,
            };
            share::run(&client, config).await?;
        }

        Commands::Account => {
            account::run(&cfg)?;
        }

        Commands::Config { command } => {
            handle_config_command(command, cli.config, &cfg)?;
        }
    }

    Ok(())
}

fn build_client(cfg: &DdcConfig) -> Result<DdcClient> {
    if cfg.nodes.is_empty() {
        anyhow::bail!("No storage nodes configured. Add [[nodes]] to the config file.");
    }

    let client_config = ClientConfig::from_env();
    let mut client = DdcClient::connect(cfg.nodes.clone(), cfg.signing_key()?, &client_config)
        .context("Failed to set up client")?;
    if let Some(master) = cfg.master_key()? {
        client = client.with_master_key(master);
    }
    if let Some(box_keys) = cfg.box_keypair()? {
        client = client.with_box_keypair(box_keys);
    }
    Ok(client)
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    explicit_path: Option<PathBuf>,
    cfg: &DdcConfig,
) -> Result<()> {
    use console::style;

    let path = match explicit_path {
        Some(p) => p,
        None => config::config_file_path()?,
    };

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("{}", style("DDC Configuration").bold().underlined());
            println!();
            match cfg.bucket_id {
                Some(id) => println!("  bucket_id = {}", id),
                None => println!("  bucket_id = {}", style("(unset)").dim()),
            }
            println!();
            println!("{}", style("[keys]").cyan());
            for (name, value) in [
                ("signer_seed", &cfg.keys.signer_seed),
                ("master_secret", &cfg.keys.master_secret),
                ("box_seed", &cfg.keys.box_seed),
            ] {
                let shown = if value.is_some() { "(set)" } else { "(unset)" };
                println!("  {} = {}", name, style(shown).dim());
            }
            println!();
            println!("{}", style("[[nodes]]").cyan());
            for node in &cfg.nodes {
                println!("  {} ({}, {})", node.id, node.rpc_endpoint, node.mode);
            }
            println!();

            println!("{} {}", style("Config file:").dim(), path.display());
            if !path.exists() {
                println!(
                    "{} Run '{}' to create it",
                    style("(not created yet)").yellow(),
                    style("ddc config init").green()
                );
            }
        }

        Some(ConfigCommands::Path) => {
            println!("{}", path.display());
        }

        Some(ConfigCommands::Init { force }) => {
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config_to(&path, &DdcConfig::generate())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }
    }

    Ok(())
}
