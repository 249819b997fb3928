//! Standalone daemon channel
//!
//! Applies administrative requests directly to a shared in-memory
//! catalog, standing in for the resident daemon in daemon-less
//! deployments and tests. Replies carry the same errno-style status
//! codes a real daemon would return.

use crate::channel::{
    DaemonChannel, DaemonReply, DaemonRequest, STATUS_EBUSY, STATUS_EINVAL, STATUS_ENOENT,
    STATUS_EPERM,
};
use crate::error::{Error, Result};
use crate::resource::{AdmStatus, FsStatus, FsType, ResourceId, ResourceLock};
use crate::store::{CatalogStore, MemoryCatalog};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Channel that executes requests against a local catalog
pub struct MemoryChannel {
    catalog: Arc<MemoryCatalog>,
    online: AtomicBool,
}

impl MemoryChannel {
    pub fn new(catalog: Arc<MemoryCatalog>) -> Self {
        Self {
            catalog,
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the daemon going away (tests and drain scenarios)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    async fn apply_format(
        &self,
        medium: &ResourceId,
        fs_type: FsType,
        unlock: bool,
    ) -> Result<DaemonReply> {
        let mut info = match self.catalog.get_media(medium).await? {
            Some(info) => info,
            None => {
                return Ok(DaemonReply::error(
                    STATUS_ENOENT,
                    format!("medium '{}' not found", medium),
                ))
            }
        };

        if info.fs_type != fs_type {
            return Ok(DaemonReply::error(
                STATUS_EINVAL,
                format!(
                    "medium '{}' expects filesystem '{}', not '{}'",
                    medium, info.fs_type, fs_type
                ),
            ));
        }
        if info.fs_status != FsStatus::Blank {
            return Ok(DaemonReply::error(
                STATUS_EINVAL,
                format!("cannot format non-blank medium '{}'", medium),
            ));
        }

        info.fs_status = FsStatus::Empty;
        info.fs_label = medium.name.clone();
        info.stats.nb_load += 1;
        info.stats.last_load = chrono::Utc::now().timestamp();
        if unlock {
            info.adm_status = AdmStatus::Unlocked;
        }
        self.catalog.update_media(info).await?;

        debug!("formatted medium '{}' as {}", medium, fs_type);
        Ok(DaemonReply::ok())
    }

    async fn apply_device_add(&self, devices: &[ResourceId]) -> Result<DaemonReply> {
        // Registration happens in the catalog before the notify; the
        // scheduler only verifies it can see the new devices.
        for id in devices {
            if self.catalog.get_device(id).await?.is_none() {
                return Ok(DaemonReply::error(
                    STATUS_ENOENT,
                    format!("device '{}' not found in catalog", id),
                ));
            }
        }
        Ok(DaemonReply::ok())
    }

    async fn apply_device_lock(
        &self,
        devices: &[ResourceId],
        owner: &str,
        force: bool,
    ) -> Result<DaemonReply> {
        // Check the whole batch before touching anything.
        for id in devices {
            match self.catalog.get_device(id).await? {
                None => {
                    return Ok(DaemonReply::error(
                        STATUS_ENOENT,
                        format!("device '{}' not found", id),
                    ))
                }
                Some(info) => {
                    if info.lock.is_held() && info.lock.owner != owner && !force {
                        return Ok(DaemonReply::error(
                            STATUS_EBUSY,
                            format!("device '{}' is locked by '{}'", id, info.lock.owner),
                        ));
                    }
                }
            }
        }

        let now = chrono::Utc::now().timestamp();
        for id in devices {
            self.catalog
                .with_device_mut(id, |info| {
                    info.adm_status = AdmStatus::Locked;
                    info.lock = ResourceLock {
                        owner: owner.to_string(),
                        timestamp: now,
                    };
                })
                .await?;
        }
        Ok(DaemonReply::ok())
    }

    async fn apply_device_unlock(
        &self,
        devices: &[ResourceId],
        owner: Option<&str>,
    ) -> Result<DaemonReply> {
        for id in devices {
            match self.catalog.get_device(id).await? {
                None => {
                    return Ok(DaemonReply::error(
                        STATUS_ENOENT,
                        format!("device '{}' not found", id),
                    ))
                }
                Some(info) => {
                    // An absent owner means the release is forced.
                    if let Some(owner) = owner {
                        if info.lock.is_held() && info.lock.owner != owner {
                            return Ok(DaemonReply::error(
                                STATUS_EPERM,
                                format!(
                                    "device '{}' is locked by '{}', not '{}'",
                                    id, info.lock.owner, owner
                                ),
                            ));
                        }
                    }
                }
            }
        }

        for id in devices {
            self.catalog
                .with_device_mut(id, |info| {
                    info.adm_status = AdmStatus::Unlocked;
                    info.lock = ResourceLock::default();
                })
                .await?;
        }
        Ok(DaemonReply::ok())
    }
}

#[async_trait]
impl DaemonChannel for MemoryChannel {
    async fn send_request(&self, request: DaemonRequest) -> Result<DaemonReply> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Communication("daemon is not running".into()));
        }

        match &request {
            DaemonRequest::Ping => Ok(DaemonReply::ok()),
            DaemonRequest::Format {
                medium,
                fs_type,
                unlock,
            } => self.apply_format(medium, *fs_type, *unlock).await,
            DaemonRequest::DeviceAdd { devices, .. } => self.apply_device_add(devices).await,
            DaemonRequest::DeviceLock {
                devices,
                owner,
                force,
            } => self.apply_device_lock(devices, owner, *force).await,
            DaemonRequest::DeviceUnlock { devices, owner } => {
                self.apply_device_unlock(devices, owner.as_deref()).await
            }
        }
    }

    async fn is_daemon_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::STATUS_OK;
    use crate::resource::{DeviceInfo, MediaInfo, MediaStats, ResourceFamily};
    use assert_matches::assert_matches;

    fn tape(name: &str) -> MediaInfo {
        MediaInfo {
            id: ResourceId::new(ResourceFamily::Tape, name).unwrap(),
            model: None,
            adm_status: AdmStatus::Locked,
            fs_type: FsType::Ltfs,
            fs_status: FsStatus::Blank,
            fs_label: String::new(),
            stats: MediaStats::default(),
            tags: vec![],
            lock: ResourceLock::default(),
        }
    }

    fn drive(name: &str) -> DeviceInfo {
        DeviceInfo {
            family: ResourceFamily::Tape,
            path: name.into(),
            model: None,
            host: "localhost".into(),
            serial: None,
            adm_status: AdmStatus::Unlocked,
            lock: ResourceLock::default(),
        }
    }

    async fn setup() -> (Arc<MemoryCatalog>, MemoryChannel) {
        let catalog = Arc::new(MemoryCatalog::new());
        let channel = MemoryChannel::new(catalog.clone());
        (catalog, channel)
    }

    #[tokio::test]
    async fn test_format_blank_medium_with_unlock() {
        let (catalog, channel) = setup().await;
        catalog.insert_media(tape("TAPE001")).await.unwrap();

        let id = ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap();
        let reply = channel
            .send_request(DaemonRequest::Format {
                medium: id.clone(),
                fs_type: FsType::Ltfs,
                unlock: true,
            })
            .await
            .unwrap();
        assert_eq!(reply.status, STATUS_OK);

        let info = catalog.get_media(&id).await.unwrap().unwrap();
        assert_eq!(info.fs_status, FsStatus::Empty);
        assert_eq!(info.fs_label, "TAPE001");
        assert_eq!(info.adm_status, AdmStatus::Unlocked);
    }

    #[tokio::test]
    async fn test_format_non_blank_medium_fails() {
        let (catalog, channel) = setup().await;
        catalog.insert_media(tape("TAPE001")).await.unwrap();

        let id = ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap();
        let format = DaemonRequest::Format {
            medium: id,
            fs_type: FsType::Ltfs,
            unlock: false,
        };
        assert_eq!(
            channel.send_request(format.clone()).await.unwrap().status,
            STATUS_OK
        );
        // Second format sees a non-blank medium.
        assert_eq!(
            channel.send_request(format).await.unwrap().status,
            STATUS_EINVAL
        );
    }

    #[tokio::test]
    async fn test_format_unknown_medium() {
        let (_catalog, channel) = setup().await;
        let reply = channel
            .send_request(DaemonRequest::Format {
                medium: ResourceId::new(ResourceFamily::Tape, "NOPE").unwrap(),
                fs_type: FsType::Ltfs,
                unlock: false,
            })
            .await
            .unwrap();
        assert_eq!(reply.status, STATUS_ENOENT);
    }

    #[tokio::test]
    async fn test_lock_conflict_and_force() {
        let (catalog, channel) = setup().await;
        catalog.insert_device(drive("/dev/st0")).await.unwrap();
        let devices = vec![drive("/dev/st0").id()];

        let lock = |owner: &str, force| DaemonRequest::DeviceLock {
            devices: devices.clone(),
            owner: owner.into(),
            force,
        };

        assert_eq!(
            channel.send_request(lock("host-a:1", false)).await.unwrap().status,
            STATUS_OK
        );
        // Another owner is refused without force.
        assert_eq!(
            channel.send_request(lock("host-b:2", false)).await.unwrap().status,
            STATUS_EBUSY
        );
        // Force steals the lock.
        assert_eq!(
            channel.send_request(lock("host-b:2", true)).await.unwrap().status,
            STATUS_OK
        );

        let info = catalog
            .get_device(&devices[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.lock.owner, "host-b:2");
    }

    #[tokio::test]
    async fn test_unlock_ownership_check() {
        let (catalog, channel) = setup().await;
        catalog.insert_device(drive("/dev/st0")).await.unwrap();
        let devices = vec![drive("/dev/st0").id()];

        channel
            .send_request(DaemonRequest::DeviceLock {
                devices: devices.clone(),
                owner: "host-a:1".into(),
                force: false,
            })
            .await
            .unwrap();

        // Wrong owner is refused.
        let reply = channel
            .send_request(DaemonRequest::DeviceUnlock {
                devices: devices.clone(),
                owner: Some("host-b:2".into()),
            })
            .await
            .unwrap();
        assert_eq!(reply.status, STATUS_EPERM);

        // Forced release passes no owner.
        let reply = channel
            .send_request(DaemonRequest::DeviceUnlock {
                devices: devices.clone(),
                owner: None,
            })
            .await
            .unwrap();
        assert_eq!(reply.status, STATUS_OK);

        let info = catalog.get_device(&devices[0]).await.unwrap().unwrap();
        assert_eq!(info.adm_status, AdmStatus::Unlocked);
        assert!(!info.lock.is_held());
    }

    #[tokio::test]
    async fn test_offline_channel_is_communication_error() {
        let (_catalog, channel) = setup().await;
        channel.set_online(false);
        assert!(!channel.is_daemon_online().await);
        assert_matches!(
            channel.send_request(DaemonRequest::Ping).await,
            Err(Error::Communication(_))
        );
    }
}
