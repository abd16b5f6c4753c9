//! Classified regions produced by the engine
//!
//! A region is a byte range of the document tagged with what it is inside a
//! message template or a filter expression. Mapping kinds to colors is left
//! to the host's presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// What a classified region represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationKind {
    /// Named property inside a template placeholder
    PropertyName,
    /// Numeric placeholder name (`{0}`)
    PositionalIndex,
    /// `@` structure-capture operator
    CaptureOperator,
    /// `$` force-string operator
    StringifyOperator,
    /// Text after `:` in a placeholder
    FormatSpecifier,
    /// Text after `,` in a placeholder
    Alignment,
    /// Placeholder delimiter `{` or `}`
    Brace,
    ExpressionProperty,
    ExpressionOperator,
    ExpressionFunction,
    ExpressionKeyword,
    ExpressionLiteral,
    ExpressionDirective,
    ExpressionBuiltin,
}

impl ClassificationKind {
    /// Stable name used by hosts when mapping kinds to theme entries
    pub fn name(&self) -> &'static str {
        match self {
            Self::PropertyName => "property-name",
            Self::PositionalIndex => "positional-index",
            Self::CaptureOperator => "capture-operator",
            Self::StringifyOperator => "stringify-operator",
            Self::FormatSpecifier => "format-specifier",
            Self::Alignment => "alignment",
            Self::Brace => "brace",
            Self::ExpressionProperty => "expression-property",
            Self::ExpressionOperator => "expression-operator",
            Self::ExpressionFunction => "expression-function",
            Self::ExpressionKeyword => "expression-keyword",
            Self::ExpressionLiteral => "expression-literal",
            Self::ExpressionDirective => "expression-directive",
            Self::ExpressionBuiltin => "expression-builtin",
        }
    }

    /// Whether this kind belongs to the expression sub-language
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::ExpressionProperty
                | Self::ExpressionOperator
                | Self::ExpressionFunction
                | Self::ExpressionKeyword
                | Self::ExpressionLiteral
                | Self::ExpressionDirective
                | Self::ExpressionBuiltin
        )
    }
}

impl fmt::Display for ClassificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified byte range of the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifiedRegion {
    pub kind: ClassificationKind,
    /// Absolute byte offset in the document
    pub start: usize,
    pub length: usize,
    /// Document text covered by the region
    pub text: String,
}

impl ClassifiedRegion {
    pub fn new(kind: ClassificationKind, start: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            kind,
            start,
            length: text.len(),
            text,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Check if this region overlaps a byte range
    ///
    /// Empty regions are treated as a point and overlap a range containing it.
    pub fn overlaps(&self, range: &Range<usize>) -> bool {
        if self.length == 0 {
            return range.start <= self.start && self.start < range.end.max(range.start + 1);
        }
        self.start < range.end && self.end() > range.start
    }
}

/// Role of a string literal that belongs to the expression sub-language
///
/// Literals passed to plain logging calls have no role: they are message
/// templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpressionRole {
    /// `Filter.ByExcluding("...")` / `Filter.ByIncludingOnly("...")`
    FilterPredicate,
    /// First argument of `Enrich.WithComputed("Name", "...")`
    ComputedPropertyName,
    /// Second argument of `Enrich.WithComputed("Name", "...")`
    ComputedPropertyExpression,
    /// `WriteTo.Conditional("...", ...)` and `Enrich.When("...", ...)`
    ConditionalPredicate,
    /// `new ExpressionTemplate("...")`
    ExpressionTemplate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_overlap() {
        let region = ClassifiedRegion::new(ClassificationKind::PropertyName, 10, "Name");
        assert_eq!(region.end(), 14);
        assert!(region.overlaps(&(0..11)));
        assert!(region.overlaps(&(13..20)));
        assert!(!region.overlaps(&(14..20)));
        assert!(!region.overlaps(&(0..10)));
    }

    #[test]
    fn test_kind_names_are_kebab_case() {
        let json = serde_json::to_string(&ClassificationKind::ExpressionBuiltin).unwrap();
        assert_eq!(json, "\"expression-builtin\"");
        assert_eq!(ClassificationKind::CaptureOperator.to_string(), "capture-operator");
        assert!(ClassificationKind::ExpressionKeyword.is_expression());
        assert!(!ClassificationKind::Brace.is_expression());
    }
}
