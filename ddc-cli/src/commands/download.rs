//! Download Command
//!
//! Reads a piece by CID or CNS name and writes it to a file or stdout.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use ddc_client::{Decryption, DdcClient, ReadOptions};
use ddc_core::{Cid, ContentRef, DekPath};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Download configuration
pub struct DownloadConfig {
    pub target: String,
    pub bucket_id: u64,
    pub output: Option<PathBuf>,
    pub decrypt: Option<String>,
    pub sealed_key: Option<String>,
    pub sub_path: Option<String>,
}

impl DownloadConfig {
    fn decryption(&self) -> Result<Option<Decryption>> {
        if let Some(path) = &self.decrypt {
            return Ok(Some(Decryption::Derive(DekPath::parse(path)?)));
        }
        match &self.sealed_key {
            Some(cid) => Ok(Some(Decryption::Shared {
                sealed_key: Cid::parse(cid).context("Invalid sealed key CID")?,
                sub_path: self.sub_path.as_deref().map(DekPath::parse).transpose()?,
            })),
            None => Ok(None),
        }
    }
}

/// Run download command
pub async fn run(client: &DdcClient, config: DownloadConfig) -> Result<()> {
    let target = ContentRef::parse(&config.target);
    let decryption = config.decryption()?;

    let data = client
        .read(config.bucket_id, target, ReadOptions::default(), decryption)
        .await
        .with_context(|| format!("Failed to download {}", config.target))?;

    match &config.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(path, &data).await?;
            eprintln!(
                "{} Downloaded {} ({} bytes) to {}",
                style(symbols::CHECK).green(),
                config.target,
                data.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
