//! On-disk configuration: the ledger file and the asset book.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use indexvest_core::{FixedLedgerConfig, SupplyLedgerConfig};
use indexvest_state::{AssetBook, MemoryAssets};
use serde::{Deserialize, Serialize};

/// File name of the asset book inside the data directory.
pub const ASSETS_FILE: &str = "assets.json";

/// Name of the sled database directory inside the data directory.
pub const DB_DIR: &str = "db";

/// Ledger configuration as stored in the `--config` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LedgerFile {
    Fixed(FixedLedgerConfig),
    Supply(SupplyLedgerConfig),
}

impl LedgerFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            LedgerFile::Fixed(c) => c.validate()?,
            LedgerFile::Supply(c) => c.validate()?,
        }
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading ledger config {}", path.display()))?;
        let file: LedgerFile = serde_json::from_str(&json)
            .with_context(|| format!("parsing ledger config {}", path.display()))?;
        file.validate()
            .with_context(|| format!("validating ledger config {}", path.display()))?;
        Ok(file)
    }

    /// Write a fresh config. An existing file is never overwritten.
    pub fn create(&self, path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            bail!(
                "Ledger config {} already exists. Delete it first to start a new ledger.",
                path.display()
            );
        }
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing ledger config {}", path.display()))?;
        Ok(())
    }
}

/// Load the asset book from `data_dir`, or start an empty one.
pub fn load_assets(data_dir: &Path) -> anyhow::Result<MemoryAssets> {
    let path = data_dir.join(ASSETS_FILE);
    if !path.exists() {
        return Ok(MemoryAssets::new());
    }
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading asset book {}", path.display()))?;
    let book: AssetBook = serde_json::from_str(&json)
        .with_context(|| format!("parsing asset book {}", path.display()))?;
    Ok(MemoryAssets::from_book(book))
}

pub fn save_assets(data_dir: &Path, assets: &MemoryAssets) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let path = data_dir.join(ASSETS_FILE);
    let json = serde_json::to_string_pretty(&assets.book())?;
    std::fs::write(&path, json).with_context(|| format!("writing asset book {}", path.display()))?;
    Ok(())
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
