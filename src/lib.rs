//! Media Library Admin - administrative control plane for tiered
//! tape/directory storage libraries.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Admin Session                         │
//! │  device add/lock/unlock · format · layout list/degroup       │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │        Daemon Channel        │        Catalog Store          │
//! │  ┌─────────────┐ ┌────────┐  │  ┌─────────────────────────┐  │
//! │  │ Unix socket │ │ Memory │  │  │  devices/media/layouts  │  │
//! │  │ (JSON/UDS)  │ │(stand- │  │  │  (in-memory + JSON      │  │
//! │  │             │ │ alone) │  │  │   persistence)          │  │
//! │  └─────────────┘ └────────┘  │  └─────────────────────────┘  │
//! ├──────────────────────────────┴───────────────────────────────┤
//! │          Output pipeline: display dicts → human/json/        │
//! │                         yaml/csv                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`admin`]: session lifecycle and resource operations
//! - [`channel`]: daemon request/reply protocol and transports
//! - [`store`]: metadata catalog port and in-memory implementation
//! - [`layout`]: layout records and the degrouping transformation
//! - [`resource`]: families, identifiers and catalog record types
//! - [`output`]: display dictionaries and rendering
//! - [`error`]: error types and exit-code mapping

pub mod admin;
pub mod channel;
pub mod error;
pub mod layout;
pub mod output;
pub mod resource;
pub mod store;

// Re-export commonly used types
pub use admin::{AdminConfig, AdminSession};
pub use channel::{
    DaemonChannel, DaemonReply, DaemonRequest, MemoryChannel, SocketChannel,
};
pub use error::{Error, Result};
pub use layout::{degroup, DegroupedLayout, Extent, LayoutRecord};
pub use output::{bytes2human, project, render, DisplayDict, DisplayRow, OutputFormat};
pub use resource::{
    AdmStatus, DeviceInfo, FsStatus, FsType, MediaInfo, MediaStats, ResourceFamily, ResourceId,
    ResourceLock,
};
pub use store::{CatalogStore, MemoryCatalog};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
