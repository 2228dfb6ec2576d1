//! Store management for capaian
//!
//! The store is a directory holding `capaian.toml` and the SQLite database.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::{CapaianError, Result};

/// Configuration file name inside the store root
pub const CONFIG_FILE: &str = "capaian.toml";

/// Default store directory name
pub const DEFAULT_STORE_DIR: &str = ".capaian";

/// The capaian store
#[derive(Debug)]
pub struct Store {
    /// Root path of the store
    root: PathBuf,
    /// Store configuration
    config: StoreConfig,
    /// Engine database
    db: Database,
}

impl Store {
    /// Create a new store at `root/.capaian`
    pub fn init(root: &Path) -> Result<Self> {
        let store_root = root.join(DEFAULT_STORE_DIR);
        if store_root.join(CONFIG_FILE).exists() {
            return Err(CapaianError::StoreAlreadyExists { path: store_root });
        }
        fs::create_dir_all(&store_root)?;

        let config = StoreConfig::default();
        config.save(&store_root.join(CONFIG_FILE))?;

        let db = Database::open(&store_root)?;
        Ok(Store {
            root: store_root,
            config,
            db,
        })
    }

    /// Open an existing store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(CapaianError::StoreNotFound {
                search_root: path.to_path_buf(),
            });
        }

        let config_path = path.join(CONFIG_FILE);
        let config = if config_path.exists() {
            StoreConfig::load(&config_path)?
        } else {
            StoreConfig::default()
        };

        let db = Database::open(path)?;
        Ok(Store {
            root: path.to_path_buf(),
            config,
            db,
        })
    }

    /// Discover a store by walking up from the given directory
    pub fn discover(root: &Path) -> Result<Self> {
        let mut current = Some(root);
        while let Some(dir) = current {
            let candidate = dir.join(DEFAULT_STORE_DIR);
            if candidate.join(CONFIG_FILE).exists() {
                return Self::open(&candidate);
            }
            current = dir.parent();
        }
        Err(CapaianError::StoreNotFound {
            search_root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }
}
