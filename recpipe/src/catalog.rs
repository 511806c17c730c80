//! The recording catalog seam.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Recording, RecordingInfo};
use crate::{Error, Result};

/// Source of recordings and of the system-wide "recorder busy" state.
#[async_trait]
pub trait RecordingCatalog: Send + Sync {
    /// Every recording the catalog knows about.
    async fn recordings(&self) -> Vec<Arc<Recording>>;

    /// Whether any recorder is currently writing.
    async fn any_recorder_active(&self) -> bool;
}

/// Catalog kept in memory, optionally seeded from a JSON file.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    recordings: RwLock<Vec<Arc<Recording>>>,
    recorder_active: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of recordings.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io_path("reading catalog", path, e))?;
        let infos: Vec<RecordingInfo> = serde_json::from_str(&text)?;
        let catalog = Self::new();
        for info in infos {
            catalog.add(Arc::new(Recording::from(info)));
        }
        Ok(catalog)
    }

    pub fn add(&self, recording: Arc<Recording>) {
        self.recordings.write().push(recording);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Recording>> {
        self.recordings.read().iter().find(|r| r.id() == id).cloned()
    }

    pub fn set_recorder_active(&self, active: bool) {
        self.recorder_active.store(active, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordingCatalog for InMemoryCatalog {
    async fn recordings(&self) -> Vec<Arc<Recording>> {
        self.recordings.read().clone()
    }

    async fn any_recorder_active(&self) -> bool {
        self.recorder_active.load(Ordering::SeqCst)
            || self.recordings.read().iter().any(|r| r.is_recording())
    }
}
