//! Registry persistence layer
//!
//! Saves and loads the wallet registry as pretty JSON, writing through a
//! temporary file and keeping rotated backups of earlier saves.

use crate::authority::RegistrySnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub wallets_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            wallets_file: "wallets.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Registry storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager, creating the data directory if needed
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn wallets_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.wallets_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.wallets_file, index))
    }

    /// Save the registry to disk
    pub fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), StorageError> {
        let path = self.wallets_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        let temp_path = self
            .config
            .data_dir
            .join(format!("{}.tmp", self.config.wallets_file));
        save_to_file(snapshot, &temp_path)?;
        fs::rename(&temp_path, &path)?;

        log::debug!(
            "Saved {} wallets to {}",
            snapshot.wallets.len(),
            path.display()
        );
        Ok(())
    }

    /// Load the registry, or an empty one when nothing was saved yet
    pub fn load(&self) -> Result<RegistrySnapshot, StorageError> {
        let path = self.wallets_path();
        if !path.exists() {
            return Ok(RegistrySnapshot::default());
        }
        load_from_file(&path)
    }

    pub fn exists(&self) -> bool {
        self.wallets_path().exists()
    }

    /// Delete the saved registry
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.wallets_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a backup; 0 is the most recent
    pub fn restore_backup(&self, backup_index: usize) -> Result<RegistrySnapshot, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        load_from_file(&backup_path)
    }

    /// Indices of the backups present on disk
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }
}

/// Write a registry snapshot to a specific file
pub fn save_to_file(snapshot: &RegistrySnapshot, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot)?;
    Ok(())
}

/// Read a registry snapshot from a specific file
pub fn load_from_file(path: &Path) -> Result<RegistrySnapshot, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
