//! Multi-line literal boundary detection
//!
//! Hosts classify one line (or a few) at a time, so a line in the middle of
//! a `@"...` or `"""...` literal carries no call site of its own. This
//! module answers "is line L inside a literal opened on an earlier line of a
//! recognized call?" with bounded scans:
//!
//! - **Verbatim phase**: look back up to `verbatim_lookback_lines` for a line
//!   holding an unterminated `@"` literal that is still open on the line
//!   before L.
//! - **Fenced phase**: start `fenced_lookback_lines` above L and walk
//!   forward, pairing each opener with the next fence at least as wide. The
//!   literal still open when the walk reaches L decides, after a forward
//!   scan of at most `fenced_lookahead_lines` for its closer.
//!
//! A candidate only counts when its opening line passes the call-site
//! prefilter. A bare fence line (`"""` alone) closes the open literal if
//! there is one; otherwise it opens a literal when the code before it ends
//! an expression lead-in such as `(` or `,`, and then the line above it is
//! checked instead. Interpolated fences are paired but never qualify.
//!
//! Answers are cached per line and stamped with the snapshot version.

use crate::model::DocumentSnapshot;
use crate::primitives::literal::{
    quote_run, skip_interpolated, try_parse_literal, LiteralEncoding,
};
use crate::services::call_site::CallSitePrefilter;
use msgtemplate_core::config::ClassifierConfig;
use msgtemplate_core::SnapshotVersion;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::RwLock;

/// A literal that starts on an earlier line and is still open at the queried line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiLineLiteral {
    pub open_line: usize,
    /// Document offset of the literal's first delimiter character
    pub literal_start: usize,
    pub encoding: LiteralEncoding,
    /// Line holding the closing delimiter, when found within the scan window
    pub close_line: Option<usize>,
}

/// How one line relates to fenced literals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceLine {
    None,
    /// A fence ending a line of code; `column` is its byte offset in the line
    Opener {
        width: usize,
        column: usize,
        interpolated: bool,
    },
    /// A fence alone on its line: opens or closes depending on what is open
    Bare { width: usize, column: usize },
    /// A fence starting a line that continues with code, as in `""", a);`
    Leading(usize),
}

/// A fenced literal opened at or after the start of the scan window
#[derive(Debug, Clone, Copy)]
struct OpenFence {
    line: usize,
    width: usize,
    column: usize,
    bare: bool,
    interpolated: bool,
}

fn fence_line(text: &str) -> FenceLine {
    let trimmed = text.trim_start();
    let indent = text.len() - trimmed.len();

    let run = quote_run(trimmed.as_bytes(), 0);
    if run >= 3 {
        let rest = trimmed[run..].trim();
        if rest.is_empty() {
            return FenceLine::Bare { width: run, column: indent };
        }
        // `"""text"""` on one line is a complete literal
        let rest_bytes = rest.as_bytes();
        let reopens = (0..rest_bytes.len()).any(|i| quote_run(rest_bytes, i) >= run);
        return if reopens { FenceLine::None } else { FenceLine::Leading(run) };
    }

    let Some(column) = text.find("\"\"\"") else {
        return FenceLine::None;
    };
    let width = quote_run(text.as_bytes(), column);
    if text[column + width..].trim().is_empty() {
        FenceLine::Opener {
            width,
            column,
            interpolated: column > 0 && text.as_bytes()[column - 1] == b'$',
        }
    } else {
        FenceLine::None
    }
}

/// Line moved by an edit, in old-snapshot line numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineShift {
    pub old_first: usize,
    pub old_last: usize,
    /// Change in line count produced by the edit
    pub delta: isize,
}

struct LineCacheState {
    version: SnapshotVersion,
    lines: HashMap<usize, bool>,
}

/// Version-stamped per-line membership answers
pub struct LineMembershipCache {
    state: RwLock<LineCacheState>,
    capacity: usize,
}

impl LineMembershipCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(LineCacheState {
                version: SnapshotVersion::INITIAL,
                lines: HashMap::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, version: SnapshotVersion, line: usize) -> Option<bool> {
        let state = self.state.read().ok()?;
        if state.version != version {
            return None;
        }
        state.lines.get(&line).copied()
    }

    pub fn insert(&self, version: SnapshotVersion, line: usize, inside: bool) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        if version < state.version {
            return;
        }
        if version > state.version {
            state.version = version;
            state.lines.clear();
        }
        if state.lines.len() >= self.capacity {
            state.lines.clear();
        }
        state.lines.insert(line, inside);
    }

    /// Carry answers from `old` to `new` across an edit
    ///
    /// Lines touched by an edit are dropped, lines after it are renumbered,
    /// then every line in `invalidate` (new numbering) is dropped. If the
    /// cache is not at `old` it is simply reset.
    pub fn rebase(
        &self,
        old: SnapshotVersion,
        new: SnapshotVersion,
        shifts: &[LineShift],
        invalidate: &[RangeInclusive<usize>],
    ) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        if state.version != old {
            state.version = new;
            state.lines.clear();
            return;
        }

        let lines = std::mem::take(&mut state.lines);
        state.lines = lines
            .into_iter()
            .filter_map(|(line, inside)| {
                if shifts.iter().any(|s| (s.old_first..=s.old_last).contains(&line)) {
                    return None;
                }
                let delta: isize = shifts
                    .iter()
                    .filter(|s| s.old_last < line)
                    .map(|s| s.delta)
                    .sum();
                let moved = line.checked_add_signed(delta)?;
                if invalidate.iter().any(|r| r.contains(&moved)) {
                    return None;
                }
                Some((moved, inside))
            })
            .collect();
        state.version = new;
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.lines.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a line's code ends with something that can precede an expression
fn ends_expression_lead_in(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.is_empty()
        || trimmed.ends_with('(')
        || trimmed.ends_with(',')
        || trimmed.ends_with('=')
        || trimmed.ends_with('+')
        || trimmed.ends_with("=>")
        || trimmed.ends_with('?')
        || trimmed.ends_with(':')
        || trimmed.ends_with("return")
}

/// Byte column of an unterminated `@"` literal that runs past the end of the line
fn open_verbatim_column(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => return None,
            b'\'' => {
                // Skip a char literal such as '"'
                i += if bytes.get(i + 1) == Some(&b'\\') { 4 } else { 3 };
                continue;
            }
            b'$' => {
                i = skip_interpolated(line, i).unwrap_or(i + 1);
                continue;
            }
            b'@' if bytes.get(i + 1) != Some(&b'"') => {}
            b'@' | b'"' => match try_parse_literal(line, i) {
                Some(literal) if literal.terminated => {
                    i = literal.end;
                    continue;
                }
                Some(literal) if literal.encoding == LiteralEncoding::BackslashFree => {
                    return Some(i)
                }
                // `@"` with nothing typed after it yet
                None if bytes[i] == b'@' => return Some(i),
                _ => return None,
            },
            _ => {}
        }
        i += 1;
    }
    None
}

/// Multi-line literal boundary detector for one document
pub struct MultiLineDetector {
    verbatim_lookback: usize,
    fenced_lookback: usize,
    fenced_lookahead: usize,
    cache: LineMembershipCache,
}

impl MultiLineDetector {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            verbatim_lookback: config.verbatim_lookback_lines,
            fenced_lookback: config.fenced_lookback_lines,
            fenced_lookahead: config.fenced_lookahead_lines,
            cache: LineMembershipCache::new(config.line_cache_capacity),
        }
    }

    pub fn cache(&self) -> &LineMembershipCache {
        &self.cache
    }

    /// Whether `line` lies inside a multi-line literal of a recognized call
    pub fn is_inside(&self, snapshot: &DocumentSnapshot, line: usize) -> bool {
        let version = snapshot.version();
        if let Some(inside) = self.cache.get(version, line) {
            return inside;
        }
        let inside = self.enclosing_literal(snapshot, line).is_some();
        self.cache.insert(version, line, inside);
        inside
    }

    /// The qualifying literal that encloses `line`, if any
    pub fn enclosing_literal(
        &self,
        snapshot: &DocumentSnapshot,
        line: usize,
    ) -> Option<MultiLineLiteral> {
        if line >= snapshot.line_count() {
            return None;
        }
        self.verbatim_opener(snapshot, line)
            .or_else(|| self.fenced_opener(snapshot, line))
    }

    fn verbatim_opener(
        &self,
        snapshot: &DocumentSnapshot,
        line: usize,
    ) -> Option<MultiLineLiteral> {
        let lowest = line.saturating_sub(self.verbatim_lookback);
        for candidate in (lowest..line).rev() {
            let text = snapshot.line_text(candidate);
            if !text.contains("@\"") || !CallSitePrefilter::has_call_marker(text) {
                continue;
            }
            let column = open_verbatim_column(text)?;
            let literal_start = snapshot.line_start(candidate) + column;

            // Only look as far as the end of the queried line
            let window_end = snapshot.line_extent(line).end;
            let window = snapshot.slice(0..window_end)?;
            let literal = try_parse_literal(window, literal_start)?;
            let close_line = literal
                .terminated
                .then(|| snapshot.line_of_offset(literal.end.saturating_sub(1)));
            if close_line.is_some_and(|close| close < line) {
                return None;
            }
            return Some(MultiLineLiteral {
                open_line: candidate,
                literal_start,
                encoding: LiteralEncoding::BackslashFree,
                close_line,
            });
        }
        None
    }

    fn find_closer(
        &self,
        snapshot: &DocumentSnapshot,
        opener: usize,
        width: usize,
    ) -> Option<usize> {
        let last = opener
            .saturating_add(self.fenced_lookahead)
            .min(snapshot.line_count().saturating_sub(1));
        (opener + 1..=last).find(|&line| {
            let trimmed = snapshot.line_text(line).trim_start();
            quote_run(trimmed.as_bytes(), 0) >= width
        })
    }

    fn fenced_opener(&self, snapshot: &DocumentSnapshot, line: usize) -> Option<MultiLineLiteral> {
        let lowest = line.saturating_sub(self.fenced_lookback);

        // Pair fences front to back: a bare fence is only an opener when no
        // literal is open, otherwise it closes the literal
        let mut open: Option<OpenFence> = None;
        for candidate in lowest..line {
            match (open, fence_line(snapshot.line_text(candidate))) {
                (None, FenceLine::Opener { width, column, interpolated }) => {
                    open = Some(OpenFence {
                        line: candidate,
                        width,
                        column,
                        bare: false,
                        interpolated,
                    });
                }
                (None, FenceLine::Bare { width, column }) => {
                    let previous = if candidate > 0 {
                        snapshot.line_text(candidate - 1)
                    } else {
                        ""
                    };
                    if ends_expression_lead_in(previous) {
                        open = Some(OpenFence {
                            line: candidate,
                            width,
                            column,
                            bare: true,
                            interpolated: false,
                        });
                    }
                }
                (Some(fence), FenceLine::Bare { width, .. } | FenceLine::Leading(width))
                    if width >= fence.width =>
                {
                    open = None;
                }
                _ => {}
            }
        }

        let fence = open?;
        if fence.interpolated {
            return None;
        }
        let close_line = self.find_closer(snapshot, fence.line, fence.width);
        if close_line.is_some_and(|close| close <= line) {
            return None;
        }
        let qualifies = CallSitePrefilter::has_call_marker(snapshot.line_text(fence.line))
            || (fence.bare
                && fence.line > 0
                && CallSitePrefilter::has_call_marker(snapshot.line_text(fence.line - 1)));
        qualifies.then(|| MultiLineLiteral {
            open_line: fence.line,
            literal_start: snapshot.line_start(fence.line) + fence.column,
            encoding: LiteralEncoding::Fenced(fence.width),
            close_line,
        })
    }
}
