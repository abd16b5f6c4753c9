use std::ops::Range;

/// One change reported by the host editor
///
/// `old_range` is expressed in the pre-edit snapshot, `new_range` in the
/// post-edit snapshot. A pure insertion has an empty `old_range`, a pure
/// deletion an empty `new_range`. When several changes arrive together they
/// are non-overlapping and sorted by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChange {
    pub old_range: Range<usize>,
    pub new_range: Range<usize>,
}

impl TextChange {
    /// Create a new insert change
    pub fn insert(offset: usize, len: usize) -> Self {
        Self {
            old_range: offset..offset,
            new_range: offset..offset + len,
        }
    }

    /// Create a new delete change
    pub fn delete(offset: usize, len: usize) -> Self {
        Self {
            old_range: offset..offset + len,
            new_range: offset..offset,
        }
    }

    /// Create a replacement of `old_range` by `new_len` bytes
    pub fn replace(old_range: Range<usize>, new_len: usize) -> Self {
        let start = old_range.start;
        Self {
            old_range,
            new_range: start..start + new_len,
        }
    }

    /// Signed change in document length
    pub fn delta(&self) -> isize {
        self.new_range.len() as isize - self.old_range.len() as isize
    }
}
