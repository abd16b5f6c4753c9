//! Caches owned by a document's classifier
//!
//! All caches are bounded and cleared wholesale when full. None of them is
//! a source of truth: a miss only costs a recomputation.

use crate::primitives::template_parser::parse_template;
use msgtemplate_core::region::ClassifiedRegion;
use msgtemplate_core::template::TemplateProperty;
use msgtemplate_core::SnapshotVersion;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, RwLock};

struct SpanCacheState {
    version: SnapshotVersion,
    entries: HashMap<(usize, usize), Arc<[ClassifiedRegion]>>,
}

/// Classified regions per requested span, for one snapshot version at a time
pub struct SpanCache {
    state: RwLock<SpanCacheState>,
    capacity: usize,
}

impl SpanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(SpanCacheState {
                version: SnapshotVersion::INITIAL,
                entries: HashMap::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(
        &self,
        version: SnapshotVersion,
        span: &Range<usize>,
    ) -> Option<Arc<[ClassifiedRegion]>> {
        let state = self.state.read().ok()?;
        if state.version != version {
            return None;
        }
        state.entries.get(&(span.start, span.end)).cloned()
    }

    /// Store a result; results for a version older than the cache's are dropped
    pub fn insert(
        &self,
        version: SnapshotVersion,
        span: &Range<usize>,
        regions: Arc<[ClassifiedRegion]>,
    ) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        if version < state.version {
            tracing::trace!("dropping stale span result for {}", version);
            return;
        }
        if version > state.version {
            state.version = version;
            state.entries.clear();
        }
        if state.entries.len() >= self.capacity {
            tracing::debug!("span cache full ({} entries), clearing", state.entries.len());
            state.entries.clear();
        }
        state.entries.insert((span.start, span.end), regions);
    }

    /// Move the cache to snapshot `new`, dropping every entry
    ///
    /// A span's regions can depend on lines outside it (the call that owns a
    /// literal, the opener of a multi-line literal), so nothing is carried
    /// across an edit. Returns the number of entries dropped; a cache
    /// already at `new` or later is left alone.
    pub fn advance(&self, new: SnapshotVersion) -> usize {
        let Ok(mut state) = self.state.write() else {
            return 0;
        };
        if new <= state.version {
            return 0;
        }
        let dropped = state.entries.len();
        state.version = new;
        state.entries.clear();
        dropped
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parsed templates keyed by literal content
///
/// Content-keyed, so entries stay valid across edits.
pub struct TemplateCache {
    entries: RwLock<HashMap<String, Arc<[TemplateProperty]>>>,
    capacity: usize,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Parse `content`, reusing an earlier parse of identical text
    pub fn get_or_parse(&self, content: &str) -> Arc<[TemplateProperty]> {
        if let Ok(entries) = self.entries.read() {
            if let Some(properties) = entries.get(content) {
                return properties.clone();
            }
        }

        let properties: Arc<[TemplateProperty]> = parse_template(content).into();

        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.capacity {
                entries.clear();
            }
            entries.insert(content.to_string(), properties.clone());
        }
        properties
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
