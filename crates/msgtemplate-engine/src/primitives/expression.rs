//! Tokenizer for the filter/expression sub-language
//!
//! Configuration calls such as `Filter.ByExcluding(...)` take predicate
//! text rather than message templates, and `new ExpressionTemplate(...)`
//! takes a template whose holes contain expressions and directives:
//!
//! ```text
//! RequestPath like '/health%' and StatusCode < 400
//! {#if @l = 'Error'}[{@t:HH:mm:ss}] {@m}{#end}
//! ```
//!
//! The tokenizer is lenient. Unknown characters are skipped, unterminated
//! string literals run to the end of the input.

use msgtemplate_core::region::{ClassificationKind, ClassifiedRegion};

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "like", "in", "is", "if", "then", "else", "ci",
];

const LITERAL_WORDS: &[&str] = &["true", "false", "null"];

/// Names usable after `@`
const BUILTINS: &[&str] = &["t", "m", "mt", "l", "x", "p", "i", "r", "tr", "sp"];

/// Operators, longest first so `<=` wins over `<`
const OPERATORS: &[&str] = &[
    "[?]", "[*]", "<>", "<=", ">=", "=", "<", ">", "+", "-", "*", "/", "%", "^",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionTokenKind {
    Property,
    Operator,
    Function,
    Keyword,
    Literal,
    Directive,
    Builtin,
    /// Hole delimiter in an expression template
    Brace,
    /// Format text after `:` in an expression template hole
    Format,
}

impl ExpressionTokenKind {
    pub fn classification(&self) -> ClassificationKind {
        match self {
            Self::Property => ClassificationKind::ExpressionProperty,
            Self::Operator => ClassificationKind::ExpressionOperator,
            Self::Function => ClassificationKind::ExpressionFunction,
            Self::Keyword => ClassificationKind::ExpressionKeyword,
            Self::Literal => ClassificationKind::ExpressionLiteral,
            Self::Directive => ClassificationKind::ExpressionDirective,
            Self::Builtin => ClassificationKind::ExpressionBuiltin,
            Self::Brace => ClassificationKind::Brace,
            Self::Format => ClassificationKind::FormatSpecifier,
        }
    }
}

/// A token, with offsets relative to the tokenized text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpressionToken {
    pub kind: ExpressionTokenKind,
    pub start: usize,
    pub length: usize,
}

impl ExpressionToken {
    fn new(kind: ExpressionTokenKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            start,
            length: end - start,
        }
    }
}

fn is_word_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_word_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn word_end(bytes: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && is_word_char(bytes[i]) {
        i += 1;
    }
    i
}

/// Advance past the character at `i` (which may be multi-byte)
fn next_char(text: &str, i: usize) -> usize {
    text[i..]
        .chars()
        .next()
        .map(|c| i + c.len_utf8())
        .unwrap_or(text.len())
}

/// Tokenize a predicate or computed-property expression
pub fn tokenize_expression(text: &str) -> Vec<ExpressionToken> {
    let mut tokens = Vec::new();
    tokenize_range(text, 0, text.len(), &mut tokens);
    tokens
}

fn tokenize_range(text: &str, start: usize, end: usize, out: &mut Vec<ExpressionToken>) {
    let bytes = text.as_bytes();
    let mut i = start;

    while i < end {
        let b = bytes[i];

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // 'string' with '' as the escaped quote
        if b == b'\'' {
            let mut j = i + 1;
            while j < end {
                if bytes[j] == b'\'' {
                    if j + 1 < end && bytes[j + 1] == b'\'' {
                        j += 2;
                        continue;
                    }
                    j += 1;
                    break;
                }
                j += 1;
            }
            let j = j.min(end);
            out.push(ExpressionToken::new(ExpressionTokenKind::Literal, i, j));
            i = j;
            continue;
        }

        if b.is_ascii_digit() {
            let mut j = i + 1;
            if b == b'0' && j < end && (bytes[j] == b'x' || bytes[j] == b'X') {
                j += 1;
                while j < end && bytes[j].is_ascii_hexdigit() {
                    j += 1;
                }
            } else {
                while j < end && (bytes[j].is_ascii_digit() || bytes[j] == b'.') {
                    j += 1;
                }
            }
            out.push(ExpressionToken::new(ExpressionTokenKind::Literal, i, j));
            i = j;
            continue;
        }

        if b == b'@' && i + 1 < end && is_word_start(bytes[i + 1]) {
            let j = word_end(bytes, i + 1, end);
            let kind = if BUILTINS.contains(&&text[i + 1..j]) {
                ExpressionTokenKind::Builtin
            } else {
                ExpressionTokenKind::Property
            };
            out.push(ExpressionToken::new(kind, i, j));
            i = j;
            continue;
        }

        if is_word_start(b) {
            let j = word_end(bytes, i, end);
            let word = text[i..j].to_ascii_lowercase();
            let kind = if LITERAL_WORDS.contains(&word.as_str()) {
                ExpressionTokenKind::Literal
            } else if KEYWORDS.contains(&word.as_str()) {
                ExpressionTokenKind::Keyword
            } else if text[j..end].trim_start().starts_with('(') {
                ExpressionTokenKind::Function
            } else {
                ExpressionTokenKind::Property
            };
            out.push(ExpressionToken::new(kind, i, j));
            i = j;
            continue;
        }

        if let Some(op) = OPERATORS
            .iter()
            .find(|op| text[i..end].starts_with(**op))
        {
            out.push(ExpressionToken::new(
                ExpressionTokenKind::Operator,
                i,
                i + op.len(),
            ));
            i += op.len();
            continue;
        }

        // Punctuation: . , ( ) [ ] and anything unrecognized
        i = next_char(text, i);
    }
}

/// Find the `}` closing the hole opened at `open`, skipping quoted text and nested braces
fn hole_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            if b == b'\'' {
                in_quote = false;
            }
        } else {
            match b {
                b'\'' => in_quote = true,
                b'{' => depth += 1,
                b'}' if depth == 0 => return Some(i),
                b'}' => depth -= 1,
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Offset of the first `:` at nesting depth zero, outside quotes
fn format_colon(bytes: &[u8], start: usize, end: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, &b) in bytes.iter().enumerate().take(end).skip(start) {
        if in_quote {
            if b == b'\'' {
                in_quote = false;
            }
            continue;
        }
        match b {
            b'\'' => in_quote = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Tokenize an expression template
///
/// The template is literal text with `{expr[:format]}` holes and
/// `{#directive ...}` blocks.
///
/// `{{` and `}}` are escaped braces. An unterminated hole ends tokenization.
pub fn tokenize_expression_template(text: &str) -> Vec<ExpressionToken> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => i += 2,
            b'}' if bytes.get(i + 1) == Some(&b'}') => i += 2,
            b'{' => {
                let Some(close) = hole_end(bytes, i) else {
                    break;
                };
                tokens.push(ExpressionToken::new(ExpressionTokenKind::Brace, i, i + 1));

                let body = i + 1;
                if bytes.get(body) == Some(&b'#') {
                    let directive_end = word_end(bytes, body + 1, close);
                    tokens.push(ExpressionToken::new(
                        ExpressionTokenKind::Directive,
                        body,
                        directive_end,
                    ));
                    tokenize_range(text, directive_end, close, &mut tokens);
                } else if let Some(colon) = format_colon(bytes, body, close) {
                    tokenize_range(text, body, colon, &mut tokens);
                    if colon + 1 < close {
                        tokens.push(ExpressionToken::new(
                            ExpressionTokenKind::Format,
                            colon + 1,
                            close,
                        ));
                    }
                } else {
                    tokenize_range(text, body, close, &mut tokens);
                }

                tokens.push(ExpressionToken::new(
                    ExpressionTokenKind::Brace,
                    close,
                    close + 1,
                ));
                i = close + 1;
            }
            _ => i = next_char(text, i),
        }
    }

    tokens
}

/// Convert tokens to document regions
///
/// `base` is the document offset of `text`'s first byte. Tokens whose
/// offsets do not fall on character boundaries are dropped.
pub fn expression_regions(
    tokens: &[ExpressionToken],
    text: &str,
    base: usize,
) -> Vec<ClassifiedRegion> {
    tokens
        .iter()
        .filter(|token| token.length > 0)
        .filter_map(|token| {
            let slice = text.get(token.start..token.start + token.length)?;
            Some(ClassifiedRegion::new(
                token.kind.classification(),
                base + token.start,
                slice,
            ))
        })
        .collect()
}
