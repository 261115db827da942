//! Upload Command
//!
//! Stores a local file as a piece, split into parts when it is large.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use ddc_client::{DdcClient, StoreRequest};
use ddc_core::{DekPath, Piece};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Upload configuration
pub struct UploadConfig {
    pub path: PathBuf,
    pub bucket_id: u64,
    pub name: Option<String>,
    pub encrypt: Option<String>,
    pub part_size: Option<usize>,
}

/// Run upload command
pub async fn run(client: &DdcClient, config: UploadConfig) -> Result<()> {
    if !config.path.is_file() {
        anyhow::bail!("Not a file: {}", config.path.display());
    }

    let data = fs::read(&config.path)
        .await
        .with_context(|| format!("Failed to read {}", config.path.display()))?;
    let size = data.len();

    let mut request = StoreRequest::new(config.bucket_id, Piece::new(data));
    if let Some(name) = config.name {
        request = request.name(name);
    }
    if let Some(part_size) = config.part_size {
        request = request.part_size(part_size);
    }
    if let Some(path) = &config.encrypt {
        request = request.encrypt(DekPath::parse(path)?);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Uploading {} ({} bytes)", config.path.display(), size));

    let outcome = client.store(request).await;
    pb.finish_and_clear();
    let outcome = outcome.context("Failed to upload file")?;

    println!(
        "{} {}\n  CID:    {}\n  Size:   {} bytes\n  Bucket: {}",
        style(symbols::CHECK).green(),
        style("Uploaded").green().bold(),
        outcome.cid,
        size,
        config.bucket_id
    );
    if let Some(sealed) = outcome.sealed_key {
        println!(
            "  {} Encrypted under {}, sealed key: {}",
            symbols::LOCK,
            config.encrypt.unwrap_or_default(),
            sealed
        );
    }

    Ok(())
}
