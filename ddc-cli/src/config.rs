//! CLI configuration
//!
//! Config file (~/.ddc/config.toml):
//! ```toml
//! bucket_id = 42
//!
//! [keys]
//! signer_seed = "<64 hex chars>"
//! master_secret = "<hex>"
//! box_seed = "<64 hex chars>"
//!
//! [[nodes]]
//! id = "node-1"
//! rpc_endpoint = "node-1.example.com:9090"
//! http_endpoint = "https://node-1.example.com:8080"
//! secure = true
//! mode = "full"
//! ```

use anyhow::{Context, Result};
use ddc_client::NodeDescriptor;
use ddc_core::{BoxKeypair, MasterKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DdcConfig {
    /// Bucket used when a command gives none
    #[serde(default)]
    pub bucket_id: Option<u64>,

    #[serde(default)]
    pub keys: KeysConfig,

    /// Static node list
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
}

/// Key material, hex encoded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Ed25519 seed of the account signing tokens and CNS records
    #[serde(default)]
    pub signer_seed: Option<String>,
    /// Root secret of the data-encryption-key hierarchy
    #[serde(default)]
    pub master_secret: Option<String>,
    /// X25519 seed for sealed keys
    #[serde(default)]
    pub box_seed: Option<String>,
}

impl DdcConfig {
    /// Fresh config with newly generated keys
    pub fn generate() -> Self {
        let seed = |len: usize| {
            let mut bytes = vec![0u8; len];
            OsRng.fill_bytes(&mut bytes);
            Some(hex::encode(bytes))
        };
        Self {
            bucket_id: None,
            keys: KeysConfig {
                signer_seed: seed(32),
                master_secret: seed(32),
                box_seed: seed(32),
            },
            nodes: Vec::new(),
        }
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        let seed = self
            .keys
            .signer_seed
            .as_deref()
            .context("No signer seed configured. Run 'ddc config init' first.")?;
        Ok(SigningKey::from_bytes(&seed32(seed, "signer_seed")?))
    }

    pub fn master_key(&self) -> Result<Option<MasterKey>> {
        self.keys
            .master_secret
            .as_deref()
            .map(|s| MasterKey::from_hex(s).context("Invalid master_secret"))
            .transpose()
    }

    pub fn box_keypair(&self) -> Result<Option<BoxKeypair>> {
        self.keys
            .box_seed
            .as_deref()
            .map(|s| Ok(BoxKeypair::from_seed(seed32(s, "box_seed")?)))
            .transpose()
    }

    /// Explicit bucket, else the configured one
    pub fn bucket(&self, explicit: Option<u64>) -> Result<u64> {
        explicit
            .or(self.bucket_id)
            .context("No bucket given. Pass --bucket-id or set bucket_id in the config file.")
    }
}

fn seed32(s: &str, field: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim()).with_context(|| format!("{field} is not hex"))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("{field} must be 32 bytes, got {}", bytes.len()))
}

/// Get the config directory path (~/.ddc/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".ddc"))
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config_from(path: &Path) -> Result<DdcConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse config file")
}

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(path: Option<&Path>) -> Result<DdcConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if path.exists() {
        load_config_from(&path)
    } else {
        Ok(DdcConfig::default())
    }
}

pub fn save_config_to(path: &Path, config: &DdcConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    // the file holds secrets
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, &content).context("Failed to write config file")?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, content).context("Failed to write config file")?;
    }

    Ok(())
}
