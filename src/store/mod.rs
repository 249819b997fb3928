//! Metadata catalog boundary
//!
//! The catalog persists devices, media and object layouts. This module
//! defines the store port; [`memory::MemoryCatalog`] provides the
//! in-process implementation used by standalone deployments and tests.
//! Query results are plain owned vectors, so release is automatic and
//! exactly-once.

pub mod memory;

pub use memory::MemoryCatalog;

use crate::error::Result;
use crate::layout::LayoutRecord;
use crate::resource::{DeviceInfo, MediaInfo, ResourceFamily, ResourceId};
use async_trait::async_trait;

/// Port for catalog access.
///
/// Reads may run concurrently across sessions; write consistency is the
/// store's concern.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Layouts
    // =========================================================================

    /// Query layout records by object-name glob pattern and optional
    /// medium. `pattern` absent means match all; the medium filter keeps
    /// records with at least one extent on a medium whose name contains
    /// the given string.
    async fn query_layouts(
        &self,
        pattern: Option<&str>,
        medium: Option<&str>,
    ) -> Result<Vec<LayoutRecord>>;

    /// Record the placement of one object
    async fn insert_layout(&self, record: LayoutRecord) -> Result<()>;

    // =========================================================================
    // Devices
    // =========================================================================

    async fn get_device(&self, id: &ResourceId) -> Result<Option<DeviceInfo>>;

    async fn list_devices(&self, family: Option<ResourceFamily>) -> Result<Vec<DeviceInfo>>;

    /// Insert a new device. Fails with an "already exists" status when
    /// the identifier is taken.
    async fn insert_device(&self, device: DeviceInfo) -> Result<()>;

    /// Insert a batch of devices atomically: either every identifier is
    /// free and all are inserted, or nothing is.
    async fn insert_devices(&self, batch: Vec<DeviceInfo>) -> Result<()>;

    /// Update an existing device record
    async fn update_device(&self, device: DeviceInfo) -> Result<()>;

    // =========================================================================
    // Media
    // =========================================================================

    async fn get_media(&self, id: &ResourceId) -> Result<Option<MediaInfo>>;

    async fn list_media(&self, family: Option<ResourceFamily>) -> Result<Vec<MediaInfo>>;

    /// Insert a new medium. Fails with an "already exists" status when
    /// the identifier is taken.
    async fn insert_media(&self, media: MediaInfo) -> Result<()>;

    /// Update an existing media record
    async fn update_media(&self, media: MediaInfo) -> Result<()>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Check the catalog connection is usable
    async fn health_check(&self) -> Result<bool>;
}
