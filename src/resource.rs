//! Resource identifiers and catalog record types
//!
//! A resource is a device (drive) or a medium (tape cartridge or
//! directory-backed volume), identified by a (family, name) pair. The
//! name is unique within a family; uniqueness is enforced by the catalog
//! store, not here.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Families
// =============================================================================

/// Resource families managed by the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceFamily {
    Tape,
    Dir,
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceFamily::Tape => write!(f, "tape"),
            ResourceFamily::Dir => write!(f, "dir"),
        }
    }
}

impl FromStr for ResourceFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tape" => Ok(ResourceFamily::Tape),
            "dir" | "directory" => Ok(ResourceFamily::Dir),
            other => Err(Error::InvalidResource(format!(
                "unknown resource family '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Typed (family, name) identifier for a device or medium.
///
/// Constructed ad hoc for each operation; immutable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub family: ResourceFamily,
    pub name: String,
}

impl ResourceId {
    /// Create a new identifier. The name must not be empty.
    pub fn new(family: ResourceFamily, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidResource("empty resource name".into()));
        }
        Ok(Self { family, name })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.name)
    }
}

// =============================================================================
// Filesystem Types
// =============================================================================

/// Filesystem a medium can be formatted with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    /// Tape-oriented filesystem (tape media only)
    Ltfs,
    /// Local filesystem (directory media only)
    Posix,
}

impl FsType {
    /// The only resource family this filesystem type is valid for.
    pub fn family(&self) -> ResourceFamily {
        match self {
            FsType::Ltfs => ResourceFamily::Tape,
            FsType::Posix => ResourceFamily::Dir,
        }
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsType::Ltfs => write!(f, "ltfs"),
            FsType::Posix => write!(f, "posix"),
        }
    }
}

impl FromStr for FsType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ltfs" => Ok(FsType::Ltfs),
            "posix" => Ok(FsType::Posix),
            other => Err(Error::UnsupportedOperation(format!(
                "unknown filesystem type '{}'",
                other
            ))),
        }
    }
}

/// Filesystem state of a medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsStatus {
    /// Never formatted
    Blank,
    /// Formatted, no data
    Empty,
    /// Holds data
    Used,
}

impl fmt::Display for FsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsStatus::Blank => write!(f, "blank"),
            FsStatus::Empty => write!(f, "empty"),
            FsStatus::Used => write!(f, "used"),
        }
    }
}

// =============================================================================
// Administrative Status
// =============================================================================

/// Administrative status of a device or medium.
///
/// A locked resource is held out of scheduling until explicitly unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmStatus {
    Locked,
    Unlocked,
    Failed,
}

impl fmt::Display for AdmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmStatus::Locked => write!(f, "locked"),
            AdmStatus::Unlocked => write!(f, "unlocked"),
            AdmStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Locks
// =============================================================================

/// Concurrency lock on a catalog resource, as held by a session owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLock {
    /// Lock holder identity (empty when unlocked)
    pub owner: String,
    /// Acquisition timestamp (epoch seconds, 0 when unlocked)
    pub timestamp: i64,
}

impl ResourceLock {
    pub fn is_held(&self) -> bool {
        !self.owner.is_empty()
    }
}

// =============================================================================
// Device Records
// =============================================================================

/// Catalog record for a device (drive)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub family: ResourceFamily,
    /// Device path or identifier (e.g. /dev/st0, /tmp/d1)
    pub path: String,
    /// Hardware model, when known
    pub model: Option<String>,
    /// Host the device is attached to
    pub host: String,
    /// Hardware serial, when known
    pub serial: Option<String>,
    pub adm_status: AdmStatus,
    pub lock: ResourceLock,
}

impl DeviceInfo {
    pub fn id(&self) -> ResourceId {
        ResourceId {
            family: self.family,
            name: self.path.clone(),
        }
    }
}

// =============================================================================
// Media Records
// =============================================================================

/// Usage counters for a medium
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MediaStats {
    /// Number of objects with extents on this medium
    pub nb_obj: i64,
    /// Logical space used in bytes
    pub logc_spc_used: u64,
    /// Physical space used in bytes
    pub phys_spc_used: u64,
    /// Physical space free in bytes
    pub phys_spc_free: u64,
    /// Number of mounts/loads
    pub nb_load: i64,
    /// Number of errors encountered
    pub nb_errors: i64,
    /// Last load timestamp (epoch seconds)
    pub last_load: i64,
}

/// Catalog record for a medium
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: ResourceId,
    pub model: Option<String>,
    pub adm_status: AdmStatus,
    pub fs_type: FsType,
    pub fs_status: FsStatus,
    /// Filesystem label, set at format time
    pub fs_label: String,
    pub stats: MediaStats,
    pub tags: Vec<String>,
    pub lock: ResourceLock,
}

impl MediaInfo {
    pub fn is_locked(&self) -> bool {
        self.adm_status == AdmStatus::Locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_family_roundtrip() {
        assert_eq!(format!("{}", ResourceFamily::Tape), "tape");
        assert_eq!(format!("{}", ResourceFamily::Dir), "dir");
        assert_eq!("tape".parse::<ResourceFamily>().unwrap(), ResourceFamily::Tape);
        assert_eq!("directory".parse::<ResourceFamily>().unwrap(), ResourceFamily::Dir);
        assert_matches!(
            "floppy".parse::<ResourceFamily>(),
            Err(Error::InvalidResource(_))
        );
    }

    #[test]
    fn test_resource_id_rejects_empty_name() {
        assert_matches!(
            ResourceId::new(ResourceFamily::Tape, ""),
            Err(Error::InvalidResource(_))
        );
        let id = ResourceId::new(ResourceFamily::Tape, "TAPE001").unwrap();
        assert_eq!(id.to_string(), "tape:TAPE001");
    }

    #[test]
    fn test_fs_type_family() {
        assert_eq!(FsType::Ltfs.family(), ResourceFamily::Tape);
        assert_eq!(FsType::Posix.family(), ResourceFamily::Dir);
        assert_matches!(
            "ext4".parse::<FsType>(),
            Err(Error::UnsupportedOperation(_))
        );
    }

    #[test]
    fn test_lock_held() {
        assert!(!ResourceLock::default().is_held());
        let lock = ResourceLock {
            owner: "host:1234".into(),
            timestamp: 1700000000,
        };
        assert!(lock.is_held());
    }
}
