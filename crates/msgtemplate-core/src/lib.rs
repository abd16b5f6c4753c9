use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Monotonic version of a document snapshot
///
/// Every edit produces a new snapshot with a strictly larger version. Cache keys
/// carry the version so answers computed for one snapshot are never served
/// for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVersion(pub u64);

impl SnapshotVersion {
    pub const INITIAL: SnapshotVersion = SnapshotVersion(0);

    pub fn next(self) -> Self {
        SnapshotVersion(self.0 + 1)
    }
}

impl std::fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Notification that classification of a range of the current snapshot changed
///
/// The host re-requests classification for exactly this range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationChanged {
    /// Snapshot the range refers to
    pub version: SnapshotVersion,
    /// Byte range, extended to full line boundaries
    pub range: Range<usize>,
}

pub mod config;
pub mod region;
pub mod template;
