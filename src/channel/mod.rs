//! Daemon communication channel
//!
//! Administrative requests are executed by the resident scheduler daemon,
//! which owns the physical drives. This module defines the request/reply
//! protocol and the channel abstraction, with two implementations:
//! - [`SocketChannel`]: JSON frames over the daemon's Unix socket
//! - [`MemoryChannel`]: standalone daemon applying requests to a local
//!   catalog, for daemon-less deployments and tests

pub mod memory;
pub mod socket;

pub use memory::MemoryChannel;
pub use socket::SocketChannel;

use crate::error::{Error, Result};
use crate::resource::{FsType, ResourceId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Status Codes
// =============================================================================

/// Daemon status codes follow errno conventions. 0 is success; nonzero
/// codes are surfaced verbatim to callers.
pub const STATUS_OK: i32 = 0;
/// Operation not permitted (lock held by another owner)
pub const STATUS_EPERM: i32 = 1;
/// Resource not known to the catalog
pub const STATUS_ENOENT: i32 = 2;
/// Resource busy (already locked)
pub const STATUS_EBUSY: i32 = 16;
/// Resource already exists
pub const STATUS_EEXIST: i32 = 17;
/// Request invalid for the resource's current state
pub const STATUS_EINVAL: i32 = 22;

// =============================================================================
// Protocol
// =============================================================================

/// Administrative request sent to the resident daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DaemonRequest {
    /// Liveness probe
    Ping,
    /// Format a medium with the given filesystem; optionally release its
    /// administrative lock on success
    Format {
        medium: ResourceId,
        fs_type: FsType,
        unlock: bool,
    },
    /// Notify the scheduler of newly registered devices
    DeviceAdd {
        devices: Vec<ResourceId>,
        keep_locked: bool,
    },
    /// Take an administrative hold on devices
    DeviceLock {
        devices: Vec<ResourceId>,
        owner: String,
        force: bool,
    },
    /// Release an administrative hold on devices. `owner` is absent when
    /// the release is forced past ownership checks.
    DeviceUnlock {
        devices: Vec<ResourceId>,
        owner: Option<String>,
    },
}

impl DaemonRequest {
    /// Short operation name for logging and error context
    pub fn op_name(&self) -> &'static str {
        match self {
            DaemonRequest::Ping => "ping",
            DaemonRequest::Format { .. } => "format",
            DaemonRequest::DeviceAdd { .. } => "device_add",
            DaemonRequest::DeviceLock { .. } => "device_lock",
            DaemonRequest::DeviceUnlock { .. } => "device_unlock",
        }
    }
}

/// Daemon reply: a status code plus optional context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonReply {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DaemonReply {
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK,
            message: None,
        }
    }

    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }

    /// Map a nonzero status to [`Error::OperationFailed`], preserving the
    /// code verbatim.
    pub fn into_result(self, context: &str) -> Result<()> {
        if self.status == STATUS_OK {
            return Ok(());
        }
        Err(Error::OperationFailed {
            code: self.status,
            context: match self.message {
                Some(msg) => format!("{}: {}", context, msg),
                None => context.to_string(),
            },
        })
    }
}

// =============================================================================
// Channel Port
// =============================================================================

/// Port for the daemon request/reply exchange.
///
/// One logical request in flight at a time; each exchange is subject to a
/// timeout owned by the implementation, surfacing as
/// [`Error::Communication`].
#[async_trait]
pub trait DaemonChannel: Send + Sync {
    /// Send a request and wait for the daemon's reply
    async fn send_request(&self, request: DaemonRequest) -> Result<DaemonReply>;

    /// Probe whether the daemon is reachable and answering
    async fn is_daemon_online(&self) -> bool;
}
