use crate::models::config::TransmissionConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// On-disk layout: `{ "config": <TransmissionConfig | null> }`
#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    config: Option<TransmissionConfig>,
}

/// Connection config persisted as a small JSON file
pub struct ConfigStore {
    path: PathBuf,
    db: Mutex<Database>,
}

impl ConfigStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: PathBuf) -> Result<Self> {
        let db = if path.exists() {
            let content = fs::read_to_string(&path)
                .context(format!("Failed to read config store: {}", path.display()))?;
            serde_json::from_str(&content)
                .context(format!("Failed to parse config store: {}", path.display()))?
        } else {
            Database::default()
        };

        info!(
            path = %path.display(),
            has_config = db.config.is_some(),
            "Config store opened"
        );

        Ok(Self {
            path,
            db: Mutex::new(db),
        })
    }

    pub fn get(&self) -> Option<TransmissionConfig> {
        self.lock().config.clone()
    }

    pub fn save(&self, config: TransmissionConfig) -> Result<TransmissionConfig> {
        let mut db = self.lock();
        let previous = db.config.replace(config.clone());
        if let Err(e) = self.persist(&db) {
            db.config = previous;
            return Err(e);
        }
        info!(url = %config.url, port = config.port, "Connection config stored");
        Ok(config)
    }

    pub fn clear(&self) -> Result<()> {
        let mut db = self.lock();
        let previous = db.config.take();
        if let Err(e) = self.persist(&db) {
            db.config = previous;
            return Err(e);
        }
        info!("Connection config cleared");
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the store
    fn persist(&self, db: &Database) -> Result<()> {
        let content = serde_json::to_string_pretty(db).context("Failed to serialize config store")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content).context(format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .context(format!("Failed to replace config store: {}", self.path.display()))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
