//! Layout records and the degrouping transformation
//!
//! A layout is the ordered collection of extents that together
//! reconstruct one stored object. Degrouping flattens multi-extent
//! layouts into one view per extent, optionally filtered to a single
//! medium, so placement can be inspected medium by medium.

use crate::resource::ResourceId;
use serde::{Deserialize, Serialize};

// =============================================================================
// Extents
// =============================================================================

/// One contiguous placement of part of an object's data on a medium.
///
/// An extent belongs to exactly one layout record; its storage is owned
/// by the parent record's `extents` vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    /// Index of this extent within its parent layout
    pub layout_index: usize,
    /// Medium holding the extent
    pub medium: ResourceId,
    /// Address of the extent on the medium (opaque to this layer)
    pub address: String,
    /// Extent size in bytes
    pub size: u64,
}

// =============================================================================
// Layout Records
// =============================================================================

/// Placement of one stored object across media.
///
/// Extent order is significant: extents are listed in placement order.
/// A record with no extents is valid but degenerate (nothing placed yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRecord {
    /// Logical object name/path this layout describes
    pub object: String,
    /// Layout module that produced the placement (e.g. "simple")
    pub layout_type: String,
    pub extents: Vec<Extent>,
}

impl LayoutRecord {
    pub fn new(object: impl Into<String>, layout_type: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            layout_type: layout_type.into(),
            extents: Vec::new(),
        }
    }

    /// Number of extents in this layout. Always consistent with
    /// `extents.len()` since it is derived rather than stored.
    pub fn extent_count(&self) -> usize {
        self.extents.len()
    }

    /// Whether any extent of this layout lives on a medium whose name
    /// contains `medium` as a substring.
    pub fn on_medium(&self, medium: &str) -> bool {
        self.extents.iter().any(|e| e.medium.name.contains(medium))
    }
}

// =============================================================================
// Degrouped View
// =============================================================================

/// Read-only, singleton-extent view into a layout record.
///
/// Borrows the parent record and one of its extents; the backing record
/// slice must outlive every view produced from it, which the lifetime
/// parameter enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegroupedLayout<'a> {
    pub record: &'a LayoutRecord,
    pub extent: &'a Extent,
}

impl<'a> DegroupedLayout<'a> {
    /// Object name of the parent record
    pub fn object(&self) -> &str {
        &self.record.object
    }

    /// A singleton view always carries exactly one extent.
    pub fn extent_count(&self) -> usize {
        1
    }
}

/// Flatten layout records into one view per (record, extent) pair.
///
/// Pure and total. Emission order is the outer order of `records`
/// followed by each record's extent order, independent of filtering.
/// When `medium` is given, only extents whose medium name contains it as
/// a substring are emitted; callers needing exact matching must
/// pre-validate uniqueness themselves. Zero-extent records contribute
/// nothing.
pub fn degroup<'a>(
    records: &'a [LayoutRecord],
    medium: Option<&str>,
) -> Vec<DegroupedLayout<'a>> {
    let mut views = Vec::new();
    for record in records {
        for extent in &record.extents {
            match medium {
                Some(m) if !extent.medium.name.contains(m) => continue,
                _ => views.push(DegroupedLayout { record, extent }),
            }
        }
    }
    views
}
