//! Template property types shared between the parser and its consumers

use serde::{Deserialize, Serialize};

/// How a placeholder asks for its value to be captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// `{Name}`
    Standard,
    /// `{@Name}`: capture the structure of the value
    Destructured,
    /// `{$Name}`: force the value to a string
    Stringified,
    /// `{0}`: bound to an argument by position
    Positional,
}

/// One placeholder recognized in a template
///
/// All offsets are byte offsets into the template text the property was
/// parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateProperty {
    pub name: String,
    pub kind: PropertyKind,
    /// Offset of the name
    pub start: usize,
    /// Length of the name
    pub length: usize,
    /// Offset of the opening `{`
    pub brace_start: usize,
    /// Offset of the closing `}`
    pub brace_end: usize,
    /// Offset of the `@` or `$` operator, if any
    pub operator_index: Option<usize>,
    pub alignment: Option<String>,
    /// Offset of the alignment text (just after the `,`)
    pub alignment_start: Option<usize>,
    pub format_specifier: Option<String>,
    /// Offset of the format text (just after the `:`)
    pub format_start: Option<usize>,
}

impl TemplateProperty {
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_positional(&self) -> bool {
        self.kind == PropertyKind::Positional
    }

    /// Operator character for destructured/stringified properties
    pub fn operator(&self) -> Option<char> {
        match self.kind {
            PropertyKind::Destructured => Some('@'),
            PropertyKind::Stringified => Some('$'),
            _ => None,
        }
    }
}
