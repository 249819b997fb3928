//! Admin session
//!
//! The session coordinates one daemon channel and one catalog store and
//! exposes the administrative operations: device registration, lock and
//! unlock, medium format, and layout queries. It holds either both
//! collaborators or neither; a failed open leaves nothing behind, and
//! close is idempotent.
//!
//! A session is not reentrant: at most one logical operation in flight
//! at a time. Exclusivity across sessions (and hosts) comes from the
//! daemon-mediated device locks, not from in-process synchronization.

use crate::channel::{DaemonChannel, DaemonRequest};
use crate::error::{Error, Result};
use crate::layout::LayoutRecord;
use crate::resource::{
    AdmStatus, DeviceInfo, FsType, MediaInfo, ResourceFamily, ResourceId, ResourceLock,
};
use crate::store::CatalogStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for an admin session
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Daemon socket path
    pub socket_path: PathBuf,
    /// Per-request timeout on the daemon channel
    pub request_timeout: Duration,
    /// Lock-owner identity override; generated from host/pid when unset
    pub lock_owner: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(crate::channel::socket::DEFAULT_SOCKET_PATH),
            request_timeout: crate::channel::socket::DEFAULT_REQUEST_TIMEOUT,
            lock_owner: None,
        }
    }
}

/// Resolve the local host name: `HOSTNAME` when set, `/etc/hostname`
/// otherwise, `localhost` as a last resort.
fn hostname() -> String {
    if let Ok(host) = std::env::var("HOSTNAME") {
        if !host.is_empty() {
            return host;
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".into())
}

/// Build a lock-owner identity unique across hosts, processes and
/// sessions: `<host>:<pid>:<epoch>:<seq>`.
fn generate_lock_owner(host: &str) -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    format!(
        "{}:{:08x}:{:016x}:{:016x}",
        host,
        std::process::id(),
        chrono::Utc::now().timestamp(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

// =============================================================================
// Session
// =============================================================================

/// Channel and store are held together: the session is all-or-nothing.
struct SessionInner {
    channel: Arc<dyn DaemonChannel>,
    store: Arc<dyn CatalogStore>,
    daemon_online: bool,
}

/// Administrative session against one daemon and one catalog.
///
/// Lifecycle: `Closed -> Open -> Closed`, re-enterable. [`open`] on an
/// already-open session closes it first, so the previous channel is
/// never leaked. Operations on a closed session fail with
/// [`Error::SessionClosed`].
///
/// [`open`]: AdminSession::open
pub struct AdminSession {
    inner: Option<SessionInner>,
    lock_owner: String,
    host: String,
}

impl AdminSession {
    /// Create a closed session. The host name is resolved once; the
    /// lock-owner identity and registered device records share it.
    pub fn new(config: &AdminConfig) -> Self {
        let host = hostname();
        let lock_owner = config
            .lock_owner
            .clone()
            .unwrap_or_else(|| generate_lock_owner(&host));
        Self {
            inner: None,
            lock_owner,
            host,
        }
    }

    /// Open the session: probe the daemon and check the store.
    ///
    /// With `require_daemon`, an unreachable daemon fails the open and
    /// nothing is retained. Without it, the session comes up degraded
    /// (store-only): layout queries work, daemon operations fail with a
    /// communication error. If the session is already open it is closed
    /// first.
    pub async fn open(
        &mut self,
        channel: Arc<dyn DaemonChannel>,
        store: Arc<dyn CatalogStore>,
        require_daemon: bool,
    ) -> Result<()> {
        if self.inner.is_some() {
            debug!("re-opening an open session, closing previous state first");
            self.close();
        }

        let daemon_online = channel.is_daemon_online().await;
        if !daemon_online {
            if require_daemon {
                return Err(Error::Initialization(
                    "daemon is required but unreachable".into(),
                ));
            }
            warn!("cannot contact the daemon, but not required: will continue");
        }

        store
            .health_check()
            .await
            .map_err(|e| Error::Initialization(format!("catalog store check failed: {}", e)))?;

        self.inner = Some(SessionInner {
            channel,
            store,
            daemon_online,
        });
        info!(
            daemon_online,
            lock_owner = %self.lock_owner,
            "admin session opened"
        );
        Ok(())
    }

    /// Convenience: create and open in one step
    pub async fn connect(
        config: &AdminConfig,
        channel: Arc<dyn DaemonChannel>,
        store: Arc<dyn CatalogStore>,
        require_daemon: bool,
    ) -> Result<Self> {
        let mut session = Self::new(config);
        session.open(channel, store, require_daemon).await?;
        Ok(session)
    }

    /// Close the session, releasing channel and store. Idempotent and
    /// infallible; teardown problems are logged, never propagated.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("admin session closed");
        }
    }

    /// Whether the session holds an open channel and store
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Daemon reachability as observed at open time. Not re-evaluated
    /// until the next [`open`](AdminSession::open); after a timed-out
    /// operation, prefer closing and reopening the session.
    pub fn daemon_online(&self) -> bool {
        self.inner.as_ref().map_or(false, |i| i.daemon_online)
    }

    /// Lock-owner identity used for holds acquired through this session
    pub fn lock_owner(&self) -> &str {
        &self.lock_owner
    }

    fn inner(&self) -> Result<&SessionInner> {
        self.inner.as_ref().ok_or(Error::SessionClosed)
    }

    fn online_inner(&self) -> Result<&SessionInner> {
        let inner = self.inner()?;
        if !inner.daemon_online {
            return Err(Error::Communication(
                "operation requires the daemon, but the session is store-only".into(),
            ));
        }
        Ok(inner)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Format a medium with the given filesystem, optionally releasing
    /// its administrative lock on success.
    ///
    /// An unsupported family/filesystem combination is rejected before
    /// any request is sent. A nonzero daemon status surfaces verbatim.
    pub async fn format_medium(&self, id: &ResourceId, fs_type: FsType, unlock: bool) -> Result<()> {
        if fs_type.family() != id.family {
            return Err(Error::UnsupportedOperation(format!(
                "filesystem '{}' is not valid for {} media",
                fs_type, id.family
            )));
        }

        let inner = self.online_inner()?;
        let reply = inner
            .channel
            .send_request(DaemonRequest::Format {
                medium: id.clone(),
                fs_type,
                unlock,
            })
            .await?;
        reply.into_result(&format!("format of medium '{}'", id))?;
        info!("medium '{}' formatted as {}", id, fs_type);
        Ok(())
    }

    /// Register a batch of devices of one family.
    ///
    /// The batch goes into the catalog first, then the daemon is
    /// notified so the scheduler picks the devices up. With
    /// `keep_locked`, new devices stay administratively locked and out
    /// of scheduling. On a store-only session the notify is skipped.
    pub async fn add_devices(
        &self,
        family: ResourceFamily,
        names: &[String],
        keep_locked: bool,
    ) -> Result<()> {
        let inner = self.inner()?;

        let mut batch = Vec::with_capacity(names.len());
        for name in names {
            let id = ResourceId::new(family, name.clone())?;
            batch.push(DeviceInfo {
                family,
                path: id.name,
                model: None,
                host: self.host.clone(),
                serial: None,
                adm_status: if keep_locked {
                    AdmStatus::Locked
                } else {
                    AdmStatus::Unlocked
                },
                lock: ResourceLock::default(),
            });
        }
        let ids: Vec<ResourceId> = batch.iter().map(|d| d.id()).collect();

        inner.store.insert_devices(batch).await?;

        if !inner.daemon_online {
            debug!("daemon offline, skipping device add notification");
            return Ok(());
        }

        let reply = inner
            .channel
            .send_request(DaemonRequest::DeviceAdd {
                devices: ids,
                keep_locked,
            })
            .await?;
        reply.into_result("device add")?;
        info!(
            "{} {} device(s) added ({})",
            names.len(),
            family,
            if keep_locked { "locked" } else { "unlocked" }
        );
        Ok(())
    }

    /// Take an administrative hold on the named devices. With `force`,
    /// holds owned by other sessions are stolen; forcing past a lock a
    /// live session depends on is the caller's responsibility.
    pub async fn lock_devices(
        &self,
        family: ResourceFamily,
        names: &[String],
        force: bool,
    ) -> Result<()> {
        let inner = self.online_inner()?;
        let devices = Self::ids(family, names)?;

        let reply = inner
            .channel
            .send_request(DaemonRequest::DeviceLock {
                devices,
                owner: self.lock_owner.clone(),
                force,
            })
            .await?;
        reply.into_result("device lock")
    }

    /// Release the administrative hold on the named devices. With
    /// `force`, ownership checks are bypassed (e.g. to clear a lock left
    /// by a crashed session).
    pub async fn unlock_devices(
        &self,
        family: ResourceFamily,
        names: &[String],
        force: bool,
    ) -> Result<()> {
        let inner = self.online_inner()?;
        let devices = Self::ids(family, names)?;

        let reply = inner
            .channel
            .send_request(DaemonRequest::DeviceUnlock {
                devices,
                owner: if force {
                    None
                } else {
                    Some(self.lock_owner.clone())
                },
            })
            .await?;
        reply.into_result("device unlock")
    }

    fn ids(family: ResourceFamily, names: &[String]) -> Result<Vec<ResourceId>> {
        names
            .iter()
            .map(|name| ResourceId::new(family, name.clone()))
            .collect()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Query layout records by object-name glob pattern and optional
    /// medium. The returned records are owned by the caller; degroup
    /// them with [`crate::layout::degroup`] while they are alive.
    pub async fn list_layouts(
        &self,
        pattern: Option<&str>,
        medium: Option<&str>,
    ) -> Result<Vec<LayoutRecord>> {
        self.inner()?.store.query_layouts(pattern, medium).await
    }

    /// List device catalog records, optionally restricted to a family
    pub async fn list_devices(&self, family: Option<ResourceFamily>) -> Result<Vec<DeviceInfo>> {
        self.inner()?.store.list_devices(family).await
    }

    /// List media catalog records, optionally restricted to a family
    pub async fn list_media(&self, family: Option<ResourceFamily>) -> Result<Vec<MediaInfo>> {
        self.inner()?.store.list_media(family).await
    }

    /// Look up one medium
    pub async fn get_media(&self, id: &ResourceId) -> Result<Option<MediaInfo>> {
        self.inner()?.store.get_media(id).await
    }

    /// Register a medium in the catalog so it can be formatted and
    /// scheduled. New media start administratively locked unless
    /// `unlocked` is set.
    pub async fn add_media(
        &self,
        id: ResourceId,
        fs_type: FsType,
        tags: Vec<String>,
        unlocked: bool,
    ) -> Result<()> {
        if fs_type.family() != id.family {
            return Err(Error::UnsupportedOperation(format!(
                "filesystem '{}' is not valid for {} media",
                fs_type, id.family
            )));
        }
        let inner = self.inner()?;
        inner
            .store
            .insert_media(MediaInfo {
                id,
                model: None,
                adm_status: if unlocked {
                    AdmStatus::Unlocked
                } else {
                    AdmStatus::Locked
                },
                fs_type,
                fs_status: crate::resource::FsStatus::Blank,
                fs_label: String::new(),
                stats: Default::default(),
                tags,
                lock: ResourceLock::default(),
            })
            .await
    }
}

impl Drop for AdminSession {
    fn drop(&mut self) {
        // Scoped teardown: a session dropped mid-error still releases
        // its channel and store.
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DaemonReply, MemoryChannel, STATUS_EEXIST};
    use crate::resource::FsStatus;
    use crate::store::MemoryCatalog;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    fn harness() -> (Arc<MemoryCatalog>, Arc<MemoryChannel>) {
        let catalog = Arc::new(MemoryCatalog::new());
        let channel = Arc::new(MemoryChannel::new(catalog.clone()));
        (catalog, channel)
    }

    async fn open_session(
        catalog: &Arc<MemoryCatalog>,
        channel: &Arc<MemoryChannel>,
    ) -> AdminSession {
        AdminSession::connect(
            &AdminConfig::default(),
            channel.clone(),
            catalog.clone(),
            true,
        )
        .await
        .unwrap()
    }

    /// Channel that reports online but fails every request with a fixed
    /// status code.
    struct FailingChannel(i32);

    #[async_trait]
    impl DaemonChannel for FailingChannel {
        async fn send_request(&self, _request: DaemonRequest) -> crate::error::Result<DaemonReply> {
            Ok(DaemonReply::error(self.0, "injected failure"))
        }

        async fn is_daemon_online(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_open_requires_daemon() {
        let (catalog, channel) = harness();
        channel.set_online(false);

        // Required daemon unreachable: no session state retained.
        let mut session = AdminSession::new(&AdminConfig::default());
        let err = session
            .open(channel.clone(), catalog.clone(), true)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Initialization(_));
        assert!(!session.is_open());
        assert_matches!(
            session.list_layouts(None, None).await,
            Err(Error::SessionClosed)
        );

        // Not required: degraded session, store operations work.
        session
            .open(channel.clone(), catalog.clone(), false)
            .await
            .unwrap();
        assert!(session.is_open());
        assert!(!session.daemon_online());
        assert!(session.list_layouts(None, None).await.unwrap().is_empty());

        // Daemon operations on a store-only session fail cleanly.
        let id = ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap();
        assert_matches!(
            session.format_medium(&id, FsType::Ltfs, false).await,
            Err(Error::Communication(_))
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (catalog, channel) = harness();
        let mut session = open_session(&catalog, &channel).await;

        session.close();
        session.close();
        assert!(!session.is_open());
        assert_matches!(
            session.list_layouts(None, None).await,
            Err(Error::SessionClosed)
        );
    }

    #[tokio::test]
    async fn test_reopen_closes_previous_state() {
        let (catalog, channel) = harness();
        let mut session = open_session(&catalog, &channel).await;
        assert!(session.daemon_online());

        channel.set_online(false);
        session
            .open(channel.clone(), catalog.clone(), false)
            .await
            .unwrap();
        assert!(session.is_open());
        assert!(!session.daemon_online());
    }

    #[tokio::test]
    async fn test_format_rejects_bad_combination_without_daemon_call() {
        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        // Daemon offline: an UnsupportedOperation error (not a
        // Communication error) proves the channel was never invoked.
        channel.set_online(false);

        let tape = ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap();
        assert_matches!(
            session.format_medium(&tape, FsType::Posix, false).await,
            Err(Error::UnsupportedOperation(_))
        );

        let dir = ResourceId::new(ResourceFamily::Dir, "/tmp/m1").unwrap();
        assert_matches!(
            session.format_medium(&dir, FsType::Ltfs, false).await,
            Err(Error::UnsupportedOperation(_))
        );
    }

    #[tokio::test]
    async fn test_format_unlocks_medium() {
        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        let id = ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap();
        session
            .add_media(id.clone(), FsType::Ltfs, vec![], false)
            .await
            .unwrap();
        assert!(session.get_media(&id).await.unwrap().unwrap().is_locked());

        session.format_medium(&id, FsType::Ltfs, true).await.unwrap();

        let info = session.get_media(&id).await.unwrap().unwrap();
        assert_eq!(info.adm_status, AdmStatus::Unlocked);
        assert_eq!(info.fs_status, FsStatus::Empty);
    }

    #[tokio::test]
    async fn test_add_devices_then_duplicate_fails() {
        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        let names = vec!["/tmp/d1".to_string()];
        session
            .add_devices(ResourceFamily::Dir, &names, false)
            .await
            .unwrap();

        let devices = session.list_devices(Some(ResourceFamily::Dir)).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].adm_status, AdmStatus::Unlocked);

        // The identical call reports "already exists" with the code
        // intact.
        let err = session
            .add_devices(ResourceFamily::Dir, &names, false)
            .await
            .unwrap_err();
        assert_matches!(err, Error::OperationFailed { code, .. } if code == STATUS_EEXIST);
    }

    #[tokio::test]
    async fn test_add_devices_keep_locked() {
        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        session
            .add_devices(ResourceFamily::Tape, &["/dev/st0".to_string()], true)
            .await
            .unwrap();
        let devices = session.list_devices(None).await.unwrap();
        assert_eq!(devices[0].adm_status, AdmStatus::Locked);
    }

    #[tokio::test]
    async fn test_host_identity_is_consistent() {
        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        session
            .add_devices(ResourceFamily::Tape, &["/dev/st0".to_string()], false)
            .await
            .unwrap();
        let devices = session.list_devices(None).await.unwrap();

        // The registered host and the lock-owner prefix come from one
        // resolution.
        assert_eq!(devices[0].host, hostname());
        assert!(session.lock_owner().starts_with(&devices[0].host));
    }

    #[tokio::test]
    async fn test_daemon_status_code_fidelity() {
        // Daemon returns 17 on add: the caller sees exactly that code.
        let catalog = Arc::new(MemoryCatalog::new());
        let channel = Arc::new(FailingChannel(17));
        let session = AdminSession::connect(
            &AdminConfig::default(),
            channel,
            catalog,
            true,
        )
        .await
        .unwrap();

        let err = session
            .add_devices(ResourceFamily::Dir, &["/tmp/d1".to_string()], false)
            .await
            .unwrap_err();
        assert_matches!(err, Error::OperationFailed { code: 17, .. });
    }

    #[tokio::test]
    async fn test_lock_unlock_cycle() {
        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        let names = vec!["/dev/st0".to_string()];
        session
            .add_devices(ResourceFamily::Tape, &names, false)
            .await
            .unwrap();

        session
            .lock_devices(ResourceFamily::Tape, &names, false)
            .await
            .unwrap();
        let info = &session.list_devices(None).await.unwrap()[0];
        assert_eq!(info.adm_status, AdmStatus::Locked);
        assert_eq!(info.lock.owner, session.lock_owner());

        session
            .unlock_devices(ResourceFamily::Tape, &names, false)
            .await
            .unwrap();
        let info = &session.list_devices(None).await.unwrap()[0];
        assert_eq!(info.adm_status, AdmStatus::Unlocked);
        assert!(!info.lock.is_held());
    }

    #[tokio::test]
    async fn test_forced_unlock_clears_foreign_lock() {
        let (catalog, channel) = harness();
        let names = vec!["/dev/st0".to_string()];

        let session_a = open_session(&catalog, &channel).await;
        session_a
            .add_devices(ResourceFamily::Tape, &names, false)
            .await
            .unwrap();
        session_a
            .lock_devices(ResourceFamily::Tape, &names, false)
            .await
            .unwrap();

        let config = AdminConfig {
            lock_owner: Some("other-host:1:1:1".into()),
            ..Default::default()
        };
        let session_b =
            AdminSession::connect(&config, channel.clone(), catalog.clone(), true)
                .await
                .unwrap();

        // Plain unlock from the other session is refused.
        let err = session_b
            .unlock_devices(ResourceFamily::Tape, &names, false)
            .await
            .unwrap_err();
        assert_matches!(err, Error::OperationFailed { code: 1, .. });

        // Forced unlock clears it.
        session_b
            .unlock_devices(ResourceFamily::Tape, &names, true)
            .await
            .unwrap();
        let info = &session_b.list_devices(None).await.unwrap()[0];
        assert!(!info.lock.is_held());
    }

    #[tokio::test]
    async fn test_layout_listing_end_to_end() {
        use crate::layout::{degroup, Extent};

        let (catalog, channel) = harness();
        let session = open_session(&catalog, &channel).await;

        let mut rec1 = LayoutRecord::new("obj1", "simple");
        rec1.extents = vec![
            Extent {
                layout_index: 0,
                medium: ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap(),
                address: "a0".into(),
                size: 100,
            },
            Extent {
                layout_index: 1,
                medium: ResourceId::new(ResourceFamily::Tape, "TAPE002").unwrap(),
                address: "a1".into(),
                size: 200,
            },
        ];
        let mut rec2 = LayoutRecord::new("obj2", "simple");
        rec2.extents = vec![Extent {
            layout_index: 0,
            medium: ResourceId::new(ResourceFamily::Tape, "TAPE002").unwrap(),
            address: "b0".into(),
            size: 300,
        }];
        catalog.insert_layout(rec1).await.unwrap();
        catalog.insert_layout(rec2).await.unwrap();

        // Unfiltered listing, degrouped: one view per extent, order
        // preserved.
        let records = session.list_layouts(Some("*"), None).await.unwrap();
        let total: usize = records.iter().map(|r| r.extent_count()).sum();
        let views = degroup(&records, None);
        assert_eq!(views.len(), total);

        // Medium-filtered listing and degroup: only TAPE001 extents,
        // records without any TAPE001 extent absent entirely.
        let records = session
            .list_layouts(Some("*"), Some("TAPE001"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let views = degroup(&records, Some("TAPE001"));
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].object(), "obj1");
        assert_eq!(views[0].extent.medium.name, "TAPE001");
    }
}
