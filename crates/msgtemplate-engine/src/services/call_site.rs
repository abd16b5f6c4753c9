//! Textual call-site recognition
//!
//! This is the cheap first tier of call-site classification:
//! - `CallSitePrefilter` rejects lines that cannot hold a recognized call
//! - `find_call_sites` locates recognized call shapes in a piece of text
//! - `fallback_accepts` is the heuristic used when no syntax tree is available
//!
//! The prefilter is a pure speed optimization. It may accept lines the
//! structural check later rejects, but every line holding a call the
//! structural check would accept contains one of its markers.

use crate::model::DocumentSnapshot;
use msgtemplate_core::region::ExpressionRole;
use once_cell::sync::Lazy;
use regex::Regex;

/// Serilog-style level methods
pub const LEVEL_METHODS: &[&str] = &[
    "Verbose",
    "Debug",
    "Information",
    "Warning",
    "Error",
    "Fatal",
    "Write",
];

/// Microsoft.Extensions.Logging-style methods
pub const LOGGER_METHODS: &[&str] = &[
    "Log",
    "LogTrace",
    "LogDebug",
    "LogInformation",
    "LogWarning",
    "LogError",
    "LogCritical",
    "BeginScope",
];

/// Substrings, besides a case-insensitive "log", that mark a possible call site
const CALL_MARKERS: &[&str] = &[
    "Filter",
    "Enrich",
    "WriteTo",
    "ExpressionTemplate",
    "outputTemplate",
];

static LOG_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        concat!(
            r"\.\s*(?P<method>Verbose|Debug|Information|Warning|Error|Fatal|Write",
            r"|LogTrace|LogDebug|LogInformation|LogWarning|LogError|LogCritical|Log|BeginScope)",
            r"\s*(?:<[^<>()]*(?:<[^<>()]*>[^<>()]*)*>)?\s*\(",
        ),
    )
    .expect("log call pattern is valid")
});

static CONFIG_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        concat!(
            r"\b(?:(?P<section>Filter|Enrich|WriteTo)\s*\.\s*",
            r"(?P<method>ByExcluding|ByIncludingOnly|WithComputed|When|Conditional)",
            r"|new\s+(?:[A-Za-z_][\w.]*\.)?(?P<ctor>ExpressionTemplate))\s*\(",
        ),
    )
    .expect("configuration call pattern is valid")
});

static OUTPUT_TEMPLATE_ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\boutputTemplate\s*:\s*").expect("output template pattern is valid"));

/// Configuration methods whose string arguments use the expression language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigMethod {
    FilterByExcluding,
    FilterByIncludingOnly,
    EnrichWithComputed,
    EnrichWhen,
    WriteToConditional,
    ExpressionTemplate,
}

impl ConfigMethod {
    /// Resolve a `Section.Method` pair
    pub fn from_member(section: &str, method: &str) -> Option<Self> {
        match (section, method) {
            ("Filter", "ByExcluding") => Some(Self::FilterByExcluding),
            ("Filter", "ByIncludingOnly") => Some(Self::FilterByIncludingOnly),
            ("Enrich", "WithComputed") => Some(Self::EnrichWithComputed),
            ("Enrich", "When") => Some(Self::EnrichWhen),
            ("WriteTo", "Conditional") => Some(Self::WriteToConditional),
            _ => None,
        }
    }

    /// Role of the literal passed as the given argument, if that argument is expression text
    pub fn role_for_argument(&self, argument_index: usize) -> Option<ExpressionRole> {
        match (self, argument_index) {
            (Self::FilterByExcluding | Self::FilterByIncludingOnly, 0) => {
                Some(ExpressionRole::FilterPredicate)
            }
            (Self::EnrichWithComputed, 0) => Some(ExpressionRole::ComputedPropertyName),
            (Self::EnrichWithComputed, 1) => Some(ExpressionRole::ComputedPropertyExpression),
            (Self::EnrichWhen | Self::WriteToConditional, 0) => {
                Some(ExpressionRole::ConditionalPredicate)
            }
            (Self::ExpressionTemplate, 0) => Some(ExpressionRole::ExpressionTemplate),
            _ => None,
        }
    }
}

/// Recognized shape of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// `Log.Information(...)` on the static root
    Static,
    /// `logger.Information(...)`, `_logger.LogInformation(...)`, `Log.ForContext<T>().Debug(...)`
    Instance,
    Configuration(ConfigMethod),
    /// `outputTemplate: "..."` named argument of any call
    OutputTemplate,
}

impl CallShape {
    pub fn role_for_argument(&self, argument_index: usize) -> Option<ExpressionRole> {
        match self {
            Self::Configuration(method) => method.role_for_argument(argument_index),
            _ => None,
        }
    }

    /// Whether the call's literals are message templates (not expressions)
    pub fn is_logging(&self) -> bool {
        matches!(self, Self::Static | Self::Instance)
    }
}

/// Whether a receiver expression names something that logs
///
/// `Log` (optionally namespace-qualified) is the static root; anything else
/// qualifies when its text contains "log" in any case.
pub fn receiver_shape(receiver: &str) -> Option<CallShape> {
    let receiver = receiver.trim();
    if receiver.is_empty() {
        return None;
    }
    if receiver == "Log" || receiver.ends_with(".Log") && !receiver.contains('(') {
        return Some(CallShape::Static);
    }
    if contains_log_hint(receiver) {
        return Some(CallShape::Instance);
    }
    None
}

fn contains_log_hint(text: &str) -> bool {
    text.as_bytes()
        .windows(3)
        .any(|w| w.eq_ignore_ascii_case(b"log"))
}

/// Tier-1 textual pre-filter
pub struct CallSitePrefilter;

impl CallSitePrefilter {
    /// Whether text may contain a recognized call
    pub fn has_call_marker(text: &str) -> bool {
        contains_log_hint(text) || CALL_MARKERS.iter().any(|marker| text.contains(marker))
    }

    /// Whether text may be part of a template at all (a call marker or a brace)
    pub fn may_contain_template(text: &str) -> bool {
        text.contains('{') || Self::has_call_marker(text)
    }
}

/// A recognized call found by text matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteMatch {
    pub shape: CallShape,
    /// Offset of the call's `(`; for `OutputTemplate` the offset of the literal
    pub anchor: usize,
    /// Offset where the matched call text starts (receiver included)
    pub start: usize,
}

impl CallSiteMatch {
    pub fn shifted(mut self, base: usize) -> Self {
        self.anchor += base;
        self.start += base;
        self
    }
}

/// Scan backward from `dot` over a receiver expression
///
/// Accepts identifiers, member access, generic arguments and balanced call
/// parentheses (`Log.ForContext<T>()`), giving up after `max_chars` bytes.
fn receiver_before(text: &str, dot: usize, max_chars: usize) -> &str {
    let bytes = text.as_bytes();
    let floor = dot.saturating_sub(max_chars);
    let mut i = dot;
    let mut parens = 0usize;
    let mut angles = 0usize;
    while i > floor {
        let b = bytes[i - 1];
        match b {
            b')' => parens += 1,
            b'(' if parens > 0 => parens -= 1,
            b'>' => angles += 1,
            b'<' if angles > 0 => angles -= 1,
            _ if parens > 0 || angles > 0 => {}
            b'.' | b'_' | b'?' => {}
            _ if b.is_ascii_alphanumeric() => {}
            _ => break,
        }
        i -= 1;
    }
    // Trim an unbalanced prefix left by the scan budget
    let receiver = &text[i..dot];
    receiver.trim_start_matches(|c: char| c == '.' || c == '?')
}

/// Find recognized call sites in text
///
/// Offsets are relative to `text`. Results are sorted by anchor.
pub fn find_call_sites(text: &str, max_receiver_chars: usize) -> Vec<CallSiteMatch> {
    let mut sites = Vec::new();

    for caps in LOG_CALL.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let receiver = receiver_before(text, whole.start(), max_receiver_chars);
        if let Some(shape) = receiver_shape(receiver) {
            sites.push(CallSiteMatch {
                shape,
                anchor: whole.end() - 1,
                start: whole.start() - receiver.len(),
            });
        }
    }

    for caps in CONFIG_CALL.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let method = if caps.name("ctor").is_some() {
            Some(ConfigMethod::ExpressionTemplate)
        } else {
            match (caps.name("section"), caps.name("method")) {
                (Some(section), Some(method)) => {
                    ConfigMethod::from_member(section.as_str(), method.as_str())
                }
                _ => None,
            }
        };
        if let Some(method) = method {
            sites.push(CallSiteMatch {
                shape: CallShape::Configuration(method),
                anchor: whole.end() - 1,
                start: whole.start(),
            });
        }
    }

    for found in OUTPUT_TEMPLATE_ARGUMENT.find_iter(text) {
        let literal_at = found.end();
        if matches!(text.as_bytes().get(literal_at), Some(b'"') | Some(b'@')) {
            sites.push(CallSiteMatch {
                shape: CallShape::OutputTemplate,
                anchor: literal_at,
                start: found.start(),
            });
        }
    }

    sites.sort_by_key(|site| site.anchor);
    sites
}

/// Textual fallback used when no syntax tree is available
///
/// Accepts when the line or any line within `window` lines of it carries a
/// call marker. Errs toward accepting: the output is purely cosmetic.
pub fn fallback_accepts(snapshot: &DocumentSnapshot, line: usize, window: usize) -> bool {
    let first = line.saturating_sub(window);
    let last = (line + window).min(snapshot.line_count().saturating_sub(1));
    (first..=last).any(|l| CallSitePrefilter::has_call_marker(snapshot.line_text(l)))
}
