//! In-memory catalog store
//!
//! Keeps devices, media and layouts in `RwLock`-guarded maps, with
//! optional JSON persistence so standalone CLI invocations share state
//! across runs.

use crate::channel::{STATUS_EEXIST, STATUS_ENOENT};
use crate::error::{Error, Result};
use crate::layout::LayoutRecord;
use crate::resource::{DeviceInfo, MediaInfo, ResourceFamily, ResourceId};
use crate::store::CatalogStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

// =============================================================================
// Snapshot
// =============================================================================

/// Serializable image of the whole catalog.
///
/// Tables flatten to record vectors; structured identifiers cannot be
/// JSON map keys. The maps are rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub devices: Vec<DeviceInfo>,
    pub media: Vec<MediaInfo>,
    pub layouts: Vec<LayoutRecord>,
}

// =============================================================================
// Memory Catalog
// =============================================================================

/// In-memory catalog of devices, media and layouts
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    devices: RwLock<BTreeMap<ResourceId, DeviceInfo>>,
    media: RwLock<BTreeMap<ResourceId, MediaInfo>>,
    layouts: RwLock<Vec<LayoutRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a snapshot
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        let devices = snapshot
            .devices
            .into_iter()
            .map(|d| (d.id(), d))
            .collect();
        let media = snapshot
            .media
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        Self {
            devices: RwLock::new(devices),
            media: RwLock::new(media),
            layouts: RwLock::new(snapshot.layouts),
        }
    }

    /// Load a catalog from a JSON state file. A missing file yields an
    /// empty catalog.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("catalog file {} not found, starting empty", path.display());
            return Ok(Self::new());
        }
        let data = tokio::fs::read(path).await?;
        let snapshot: CatalogSnapshot = serde_json::from_slice(&data)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Persist the catalog to a JSON state file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.snapshot().await;
        let data = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = path.as_ref().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path.as_ref(), data).await?;
        Ok(())
    }

    /// Capture the current catalog contents
    pub async fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            devices: self.devices.read().await.values().cloned().collect(),
            media: self.media.read().await.values().cloned().collect(),
            layouts: self.layouts.read().await.clone(),
        }
    }

    /// Run a mutation on a media record under the write lock
    pub async fn with_media_mut<F>(&self, id: &ResourceId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut MediaInfo),
    {
        let mut media = self.media.write().await;
        match media.get_mut(id) {
            Some(info) => {
                mutate(info);
                Ok(())
            }
            None => Err(Error::OperationFailed {
                code: STATUS_ENOENT,
                context: format!("medium '{}' not found", id),
            }),
        }
    }

    /// Run a mutation on a device record under the write lock
    pub async fn with_device_mut<F>(&self, id: &ResourceId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut DeviceInfo),
    {
        let mut devices = self.devices.write().await;
        match devices.get_mut(id) {
            Some(info) => {
                mutate(info);
                Ok(())
            }
            None => Err(Error::OperationFailed {
                code: STATUS_ENOENT,
                context: format!("device '{}' not found", id),
            }),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn query_layouts(
        &self,
        pattern: Option<&str>,
        medium: Option<&str>,
    ) -> Result<Vec<LayoutRecord>> {
        let matcher = match pattern {
            Some(p) => Some(
                glob::Pattern::new(p)
                    .map_err(|e| Error::InvalidPattern(format!("'{}': {}", p, e)))?,
            ),
            None => None,
        };

        let layouts = self.layouts.read().await;
        let records = layouts
            .iter()
            .filter(|rec| match &matcher {
                Some(m) => m.matches(&rec.object),
                None => true,
            })
            .filter(|rec| match medium {
                Some(m) => rec.on_medium(m),
                None => true,
            })
            .cloned()
            .collect();
        Ok(records)
    }

    async fn insert_layout(&self, record: LayoutRecord) -> Result<()> {
        self.layouts.write().await.push(record);
        Ok(())
    }

    async fn get_device(&self, id: &ResourceId) -> Result<Option<DeviceInfo>> {
        Ok(self.devices.read().await.get(id).cloned())
    }

    async fn list_devices(&self, family: Option<ResourceFamily>) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .devices
            .read()
            .await
            .values()
            .filter(|d| family.map_or(true, |f| d.family == f))
            .cloned()
            .collect())
    }

    async fn insert_device(&self, device: DeviceInfo) -> Result<()> {
        self.insert_devices(vec![device]).await
    }

    async fn insert_devices(&self, batch: Vec<DeviceInfo>) -> Result<()> {
        let mut devices = self.devices.write().await;
        for device in &batch {
            if devices.contains_key(&device.id()) {
                return Err(Error::OperationFailed {
                    code: STATUS_EEXIST,
                    context: format!("device '{}' already exists", device.id()),
                });
            }
        }
        for device in batch {
            devices.insert(device.id(), device);
        }
        Ok(())
    }

    async fn update_device(&self, device: DeviceInfo) -> Result<()> {
        let id = device.id();
        self.with_device_mut(&id, |info| *info = device).await
    }

    async fn get_media(&self, id: &ResourceId) -> Result<Option<MediaInfo>> {
        Ok(self.media.read().await.get(id).cloned())
    }

    async fn list_media(&self, family: Option<ResourceFamily>) -> Result<Vec<MediaInfo>> {
        Ok(self
            .media
            .read()
            .await
            .values()
            .filter(|m| family.map_or(true, |f| m.id.family == f))
            .cloned()
            .collect())
    }

    async fn insert_media(&self, media: MediaInfo) -> Result<()> {
        let mut table = self.media.write().await;
        if table.contains_key(&media.id) {
            return Err(Error::OperationFailed {
                code: STATUS_EEXIST,
                context: format!("medium '{}' already exists", media.id),
            });
        }
        table.insert(media.id.clone(), media);
        Ok(())
    }

    async fn update_media(&self, media: MediaInfo) -> Result<()> {
        let id = media.id.clone();
        self.with_media_mut(&id, |info| *info = media).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
