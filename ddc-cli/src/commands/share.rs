//! Share Command

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use ddc_client::DdcClient;
use ddc_core::{BoxPublicKey, DekPath};

pub struct ShareConfig {
    pub path: String,
    pub recipient: String,
    pub bucket_id: u64,
}

/// Seal the key for a path to the recipient and store it
pub async fn run(client: &DdcClient, config: ShareConfig) -> Result<()> {
    let path = DekPath::parse(&config.path)?;
    let recipient =
        BoxPublicKey::from_hex(&config.recipient).context("Invalid recipient box key")?;

    let cid = client
        .share(config.bucket_id, &path, &recipient)
        .await
        .context("Failed to share key")?;

    println!(
        "{} Shared {} with {}\n  Sealed key: {}",
        style(symbols::CHECK).green(),
        style(&path).cyan(),
        recipient,
        cid
    );
    println!(
        "  The recipient reads with: ddc download <cid> --sealed-key {} [--sub-path <path>]",
        cid
    );
    Ok(())
}
