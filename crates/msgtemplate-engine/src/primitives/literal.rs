//! String literal locator
//!
//! Recognizes the three literal encodings that can carry a message template:
//! - plain `"..."` with backslash escapes (single line)
//! - backslash-free `@"..."` where `""` is an escaped quote (may span lines)
//! - fenced `"""..."""` delimited by three or more quotes (may span lines)
//!
//! Interpolated literals (`$"..."`, `$@"..."`, `$"""..."""`) are recognized
//! only so they can be skipped: they are never templates.
//!
//! Every scan tolerates truncated input. The host calls into the engine while
//! the user is typing, so an unterminated literal yields a best-effort span
//! ending where the scan stopped instead of nothing.

use std::ops::Range;

/// How a literal is delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralEncoding {
    Plain,
    BackslashFree,
    /// Fenced by a run of this many quotes
    Fenced(usize),
}

/// A located string literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralSpan {
    /// Offset of the first delimiter character (`"` or `@`)
    pub start: usize,
    /// Offset just past the closing delimiter, or where the scan stopped
    pub end: usize,
    /// Raw text between the delimiters
    pub content: String,
    pub encoding: LiteralEncoding,
    /// False when the scan ran out of input before a closing delimiter
    pub terminated: bool,
}

impl LiteralSpan {
    /// Offset from `start` to the first content byte
    pub fn quote_skip(&self) -> usize {
        match self.encoding {
            LiteralEncoding::Plain => 1,
            LiteralEncoding::BackslashFree => 2,
            LiteralEncoding::Fenced(width) => width,
        }
    }

    /// Offset of the first content byte
    pub fn content_start(&self) -> usize {
        self.start + self.quote_skip()
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Move the span by `base` bytes (to turn slice offsets into document offsets)
    pub fn shifted(mut self, base: usize) -> Self {
        self.start += base;
        self.end += base;
        self
    }

    pub fn is_multi_line_capable(&self) -> bool {
        !matches!(self.encoding, LiteralEncoding::Plain)
    }
}

/// A literal found among a call's arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralArgument {
    pub literal: LiteralSpan,
    /// Zero-based index of the top-level argument containing the literal
    pub argument_index: usize,
}

/// Length of the run of `"` starting at `index`
pub fn quote_run(bytes: &[u8], index: usize) -> usize {
    bytes
        .get(index..)
        .map(|rest| rest.iter().take_while(|&&b| b == b'"').count())
        .unwrap_or(0)
}

/// Try to parse a string literal starting exactly at `index`
///
/// Dispatch order: backslash-free marker (`@"`), then fenced (three or more
/// quotes), then plain. Returns `None` when no literal starts at `index`, or
/// when an unterminated literal has no content at all.
pub fn try_parse_literal(text: &str, index: usize) -> Option<LiteralSpan> {
    let bytes = text.as_bytes();
    match (bytes.get(index)?, bytes.get(index + 1)) {
        (b'@', Some(b'"')) => parse_backslash_free(text, index),
        (b'"', _) => {
            let run = quote_run(bytes, index);
            if run >= 3 {
                parse_fenced(text, index, run)
            } else {
                parse_plain(text, index)
            }
        }
        _ => None,
    }
}

fn unterminated(
    text: &str,
    start: usize,
    content_start: usize,
    stop: usize,
    encoding: LiteralEncoding,
) -> Option<LiteralSpan> {
    let content = text.get(content_start..stop)?;
    if content.is_empty() {
        return None;
    }
    Some(LiteralSpan {
        start,
        end: stop,
        content: content.to_string(),
        encoding,
        terminated: false,
    })
}

fn terminated(
    text: &str,
    start: usize,
    content: Range<usize>,
    end: usize,
    encoding: LiteralEncoding,
) -> Option<LiteralSpan> {
    Some(LiteralSpan {
        start,
        end,
        content: text.get(content)?.to_string(),
        encoding,
        terminated: true,
    })
}

fn parse_plain(text: &str, index: usize) -> Option<LiteralSpan> {
    let bytes = text.as_bytes();
    let content_start = index + 1;
    let mut escaped = false;
    let mut i = content_start;
    while i < bytes.len() {
        let b = bytes[i];
        if escaped {
            escaped = false;
        } else {
            match b {
                b'\\' => escaped = true,
                b'"' => {
                    return terminated(text, index, content_start..i, i + 1, LiteralEncoding::Plain)
                }
                // Regular literals cannot span lines
                b'\n' | b'\r' => break,
                _ => {}
            }
        }
        i += 1;
    }
    unterminated(text, index, content_start, i, LiteralEncoding::Plain)
}

fn parse_backslash_free(text: &str, index: usize) -> Option<LiteralSpan> {
    let bytes = text.as_bytes();
    let content_start = index + 2;
    let mut i = content_start;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return terminated(
                text,
                index,
                content_start..i,
                i + 1,
                LiteralEncoding::BackslashFree,
            );
        }
        i += 1;
    }
    unterminated(text, index, content_start, i, LiteralEncoding::BackslashFree)
}

fn parse_fenced(text: &str, index: usize, width: usize) -> Option<LiteralSpan> {
    let bytes = text.as_bytes();
    let content_start = index + width;
    let mut i = content_start;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            let run = quote_run(bytes, i);
            if run >= width {
                // Only the opening width is consumed; extra quotes belong to the next scan
                return terminated(
                    text,
                    index,
                    content_start..i,
                    i + width,
                    LiteralEncoding::Fenced(width),
                );
            }
            i += run;
            continue;
        }
        i += 1;
    }
    unterminated(text, index, content_start, i, LiteralEncoding::Fenced(width))
}

/// Skip an interpolated literal starting at `index`, returning the offset past it
///
/// Returns `None` if no interpolated literal starts at `index`.
pub fn skip_interpolated(text: &str, index: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = index;
    let mut dollars = 0;
    let mut verbatim = false;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'$' => dollars += 1,
            b'@' if !verbatim => verbatim = true,
            _ => break,
        }
        i += 1;
    }
    if dollars == 0 || bytes.get(i) != Some(&b'"') {
        return None;
    }

    let run = quote_run(bytes, i);
    let fence = if run >= 3 { run } else { 1 };
    i += fence;
    let mut depth = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        if depth == 0 {
            match b {
                b'\\' if fence == 1 && !verbatim => {
                    i += 2;
                    continue;
                }
                b'\n' if fence == 1 && !verbatim => return Some(i),
                b'{' if bytes.get(i + 1) == Some(&b'{') && dollars <= 1 => {
                    i += 2;
                    continue;
                }
                b'{' => depth = 1,
                b'"' if fence == 1 => {
                    if verbatim && bytes.get(i + 1) == Some(&b'"') {
                        i += 2;
                        continue;
                    }
                    return Some(i + 1);
                }
                b'"' => {
                    let closing = quote_run(bytes, i);
                    if closing >= fence {
                        return Some(i + fence);
                    }
                    i += closing;
                    continue;
                }
                _ => {}
            }
        } else {
            match b {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                b'"' | b'@' | b'$' => {
                    if let Some(end) = skip_interpolated(text, i) {
                        i = end;
                        continue;
                    }
                    if let Some(literal) = try_parse_literal(text, i) {
                        i = literal.end;
                        continue;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    Some(bytes.len())
}

/// Skip a character literal such as `'"'` or `'\''`, returning the offset past it
fn skip_char_literal(bytes: &[u8], index: usize) -> usize {
    let mut i = index + 1;
    if bytes.get(i) == Some(&b'\\') {
        i += 2;
    } else {
        i += 1;
    }
    // Escapes like '\u0022' are longer; look a few bytes ahead for the closer
    let limit = (i + 8).min(bytes.len());
    while i < limit {
        match bytes[i] {
            b'\'' => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    i.min(bytes.len())
}

/// Find every literal passed directly to the call whose `(` is at `open_paren`
///
/// Tracks nesting so literals inside nested calls, lambdas or initializers are
/// skipped, and stops at the matching `)`, at an unterminated literal, or
/// after `max_chars` bytes.
pub fn find_literal_arguments(
    text: &str,
    open_paren: usize,
    max_chars: usize,
) -> Vec<LiteralArgument> {
    let bytes = text.as_bytes();
    let mut arguments = Vec::new();
    if bytes.get(open_paren) != Some(&b'(') {
        return arguments;
    }

    let limit = open_paren.saturating_add(max_chars).min(bytes.len());
    let mut depth = 1usize;
    let mut argument_index = 0;
    let mut i = open_paren + 1;

    while i < limit {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            b',' if depth == 1 => argument_index += 1,
            b'\'' => {
                i = skip_char_literal(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < limit && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..]
                    .find("*/")
                    .map(|p| i + 2 + p + 2)
                    .unwrap_or(limit);
                continue;
            }
            b'$' | b'@' | b'"' => {
                if let Some(end) = skip_interpolated(text, i) {
                    i = end;
                    continue;
                }
                match try_parse_literal(text, i) {
                    Some(literal) => {
                        let stop = !literal.terminated;
                        i = literal.end;
                        if depth == 1 {
                            arguments.push(LiteralArgument {
                                literal,
                                argument_index,
                            });
                        }
                        if stop {
                            break;
                        }
                        continue;
                    }
                    None if bytes[i] == b'"' => break,
                    None => {}
                }
            }
            _ => {}
        }
        i += 1;
    }

    arguments
}

/// Offsets of the literals starting in `text` that could be templates
///
/// Comments, character literals and interpolated literals are skipped. An
/// unterminated literal ends the scan.
pub fn literal_starts(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut starts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                i = skip_char_literal(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = text[i + 2..]
                    .find("*/")
                    .map(|p| i + 2 + p + 2)
                    .unwrap_or(bytes.len());
                continue;
            }
            b'$' | b'@' | b'"' => {
                if let Some(end) = skip_interpolated(text, i) {
                    i = end;
                    continue;
                }
                if let Some(literal) = try_parse_literal(text, i) {
                    starts.push(i);
                    if !literal.terminated {
                        break;
                    }
                    i = literal.end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    starts
}
