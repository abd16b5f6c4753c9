//! Message template parser
//!
//! Extracts placeholders from template text that has already been isolated
//! from its string literal. Supports:
//! - `{Name}` - standard property
//! - `{@Name}` - destructured property (capture operator)
//! - `{$Name}` - stringified property (force-string operator)
//! - `{0}` - positional property
//! - `{Name,10}` / `{Name:F2}` / `{Name,-10:F2}` - alignment and format clauses
//! - `{{` and `}}` - escaped literal braces
//!
//! The parser never fails. A malformed placeholder is abandoned and scanning
//! resumes at the character that broke it, so one bad placeholder does not
//! hide the ones after it.

use msgtemplate_core::region::{ClassificationKind, ClassifiedRegion};
use msgtemplate_core::template::{PropertyKind, TemplateProperty};

/// Placeholder being accumulated
#[derive(Debug, Clone)]
struct Placeholder {
    kind: PropertyKind,
    brace_start: usize,
    operator_index: Option<usize>,
    name_start: usize,
    /// Set at the first character that is not part of the name
    name_end: Option<usize>,
    alignment_start: Option<usize>,
    alignment_end: Option<usize>,
    format_start: Option<usize>,
}

impl Placeholder {
    fn new(kind: PropertyKind, brace_start: usize, name_start: usize) -> Self {
        Self {
            kind,
            brace_start,
            operator_index: None,
            name_start,
            name_end: None,
            alignment_start: None,
            alignment_end: None,
            format_start: None,
        }
    }
}

#[derive(Debug)]
enum State {
    Outside,
    OpenBrace { brace_start: usize },
    Property(Placeholder),
    Alignment(Placeholder),
    Format(Placeholder),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Parse all placeholders in a template
///
/// # Examples
/// ```
/// use msgtemplate::primitives::template_parser::parse_template;
/// use msgtemplate_core::template::PropertyKind;
///
/// let props = parse_template("User {UserId} logged in from {@Request}");
/// assert_eq!(props.len(), 2);
/// assert_eq!(props[0].name, "UserId");
/// assert_eq!(props[1].kind, PropertyKind::Destructured);
/// ```
pub fn parse_template(text: &str) -> Vec<TemplateProperty> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut properties = Vec::new();
    let mut state = State::Outside;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, n)| n);

        state = match state {
            State::Outside => match c {
                '{' if next == Some('{') => {
                    i += 2;
                    State::Outside
                }
                '{' => {
                    i += 1;
                    State::OpenBrace { brace_start: pos }
                }
                '}' if next == Some('}') => {
                    i += 2;
                    State::Outside
                }
                _ => {
                    i += 1;
                    State::Outside
                }
            },
            State::OpenBrace { brace_start } => match c {
                '@' | '$' => {
                    let kind = if c == '@' {
                        PropertyKind::Destructured
                    } else {
                        PropertyKind::Stringified
                    };
                    let mut placeholder = Placeholder::new(kind, brace_start, pos + 1);
                    placeholder.operator_index = Some(pos);
                    i += 1;
                    State::Property(placeholder)
                }
                '0'..='9' => {
                    i += 1;
                    State::Property(Placeholder::new(PropertyKind::Positional, brace_start, pos))
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    i += 1;
                    State::Property(Placeholder::new(PropertyKind::Standard, brace_start, pos))
                }
                '}' => {
                    // Empty placeholder
                    i += 1;
                    State::Outside
                }
                // Abort without consuming: the character is rescanned outside
                _ => State::Outside,
            },
            State::Property(mut placeholder) => match c {
                c if is_name_char(c) => {
                    if placeholder.name_end.is_some() {
                        // Embedded space in the name
                        State::Outside
                    } else {
                        i += 1;
                        State::Property(placeholder)
                    }
                }
                c if c.is_whitespace() => {
                    placeholder.name_end.get_or_insert(pos);
                    i += 1;
                    State::Property(placeholder)
                }
                ',' => {
                    placeholder.name_end.get_or_insert(pos);
                    placeholder.alignment_start = Some(pos + 1);
                    i += 1;
                    State::Alignment(placeholder)
                }
                ':' => {
                    placeholder.name_end.get_or_insert(pos);
                    placeholder.format_start = Some(pos + 1);
                    i += 1;
                    State::Format(placeholder)
                }
                '}' => {
                    placeholder.name_end.get_or_insert(pos);
                    properties.extend(finish(text, placeholder, pos));
                    i += 1;
                    State::Outside
                }
                _ => State::Outside,
            },
            State::Alignment(mut placeholder) => match c {
                ':' => {
                    placeholder.alignment_end = Some(pos);
                    placeholder.format_start = Some(pos + 1);
                    i += 1;
                    State::Format(placeholder)
                }
                '}' => {
                    placeholder.alignment_end = Some(pos);
                    properties.extend(finish(text, placeholder, pos));
                    i += 1;
                    State::Outside
                }
                '{' => State::Outside,
                _ => {
                    i += 1;
                    State::Alignment(placeholder)
                }
            },
            State::Format(placeholder) => match c {
                '}' if next == Some('}') => {
                    i += 2;
                    State::Format(placeholder)
                }
                '}' => {
                    properties.extend(finish(text, placeholder, pos));
                    i += 1;
                    State::Outside
                }
                _ => {
                    i += 1;
                    State::Format(placeholder)
                }
            },
        };
    }

    // Anything still open at end of text is an incomplete placeholder
    properties
}

/// Turn a closed placeholder into a property, or drop it if its name is invalid
fn finish(text: &str, placeholder: Placeholder, brace_end: usize) -> Option<TemplateProperty> {
    let name_end = placeholder.name_end?;
    let name = text.get(placeholder.name_start..name_end)?;
    if name.is_empty() {
        return None;
    }
    if placeholder.kind == PropertyKind::Positional && !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let alignment_bounds = (placeholder.alignment_start, placeholder.alignment_end);
    let (alignment, alignment_start) = match alignment_bounds {
        (Some(start), Some(end)) if end > start => {
            (Some(text.get(start..end)?.to_string()), Some(start))
        }
        _ => (None, None),
    };
    let (format_specifier, format_start) = match placeholder.format_start {
        Some(start) if brace_end > start => {
            (Some(text.get(start..brace_end)?.to_string()), Some(start))
        }
        _ => (None, None),
    };

    Some(TemplateProperty {
        name: name.to_string(),
        kind: placeholder.kind,
        start: placeholder.name_start,
        length: name.len(),
        brace_start: placeholder.brace_start,
        brace_end,
        operator_index: placeholder.operator_index,
        alignment,
        alignment_start,
        format_specifier,
        format_start,
    })
}

/// Convert parsed properties into classified regions
///
/// `base` is the document offset of the first byte of `text`. A property
/// whose offsets do not fit `text` contributes nothing.
pub fn template_regions(
    properties: &[TemplateProperty],
    text: &str,
    base: usize,
) -> Vec<ClassifiedRegion> {
    let mut regions = Vec::with_capacity(properties.len() * 3);
    for property in properties {
        if let Some(property_regions) = property_regions(property, text, base) {
            regions.extend(property_regions);
        }
    }
    regions
}

fn property_regions(
    property: &TemplateProperty,
    text: &str,
    base: usize,
) -> Option<Vec<ClassifiedRegion>> {
    let slice = |start: usize, len: usize| text.get(start..start + len);
    let mut regions = Vec::with_capacity(6);

    regions.push(ClassifiedRegion::new(
        ClassificationKind::Brace,
        base + property.brace_start,
        slice(property.brace_start, 1)?,
    ));

    if let Some(operator_index) = property.operator_index {
        let kind = match property.kind {
            PropertyKind::Stringified => ClassificationKind::StringifyOperator,
            _ => ClassificationKind::CaptureOperator,
        };
        regions.push(ClassifiedRegion::new(
            kind,
            base + operator_index,
            slice(operator_index, 1)?,
        ));
    }

    let name_kind = if property.is_positional() {
        ClassificationKind::PositionalIndex
    } else {
        ClassificationKind::PropertyName
    };
    regions.push(ClassifiedRegion::new(
        name_kind,
        base + property.start,
        slice(property.start, property.length)?,
    ));

    if let (Some(alignment), Some(start)) = (&property.alignment, property.alignment_start) {
        regions.push(ClassifiedRegion::new(
            ClassificationKind::Alignment,
            base + start,
            slice(start, alignment.len())?,
        ));
    }
    if let (Some(format), Some(start)) = (&property.format_specifier, property.format_start) {
        regions.push(ClassifiedRegion::new(
            ClassificationKind::FormatSpecifier,
            base + start,
            slice(start, format.len())?,
        ));
    }

    regions.push(ClassifiedRegion::new(
        ClassificationKind::Brace,
        base + property.brace_end,
        slice(property.brace_end, 1)?,
    ));
    Some(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single(template: &str) -> TemplateProperty {
        let props = parse_template(template);
        assert_eq!(props.len(), 1, "expected one property in {template:?}: {props:?}");
        props.into_iter().next().unwrap()
    }

    #[test]
    fn test_standard_property() {
        let prop = single("{Name}");
        assert_eq!(prop.name, "Name");
        assert_eq!(prop.kind, PropertyKind::Standard);
        assert_eq!(prop.start, 1);
        assert_eq!(prop.length, 4);
        assert_eq!(prop.brace_start, 0);
        assert_eq!(prop.brace_end, 5);
        assert_eq!(prop.operator_index, None);
        assert_eq!(prop.alignment, None);
        assert_eq!(prop.format_specifier, None);
    }

    #[test]
    fn test_operators() {
        let prop = single("{@Obj}");
        assert_eq!(prop.kind, PropertyKind::Destructured);
        assert_eq!(prop.operator_index, Some(1));
        assert_eq!(prop.name, "Obj");
        assert_eq!(prop.start, 2);

        let prop = single("{$Str}");
        assert_eq!(prop.kind, PropertyKind::Stringified);
        assert_eq!(prop.operator_index, Some(1));
        assert_eq!(prop.operator(), Some('$'));
    }

    #[test]
    fn test_positional() {
        let prop = single("{0}");
        assert_eq!(prop.kind, PropertyKind::Positional);
        assert_eq!(prop.name, "0");

        assert!(parse_template("{0abc}").is_empty());
        assert!(parse_template("{1.5}").is_empty());
    }

    #[test]
    fn test_format_and_alignment() {
        let prop = single("{Name:F2}");
        assert_eq!(prop.format_specifier.as_deref(), Some("F2"));
        assert_eq!(prop.format_start, Some(6));
        assert_eq!(prop.length, 4);

        let prop = single("{Name,10}");
        assert_eq!(prop.alignment.as_deref(), Some("10"));
        assert_eq!(prop.alignment_start, Some(6));

        let prop = single("{Name,-10:F2}");
        assert_eq!(prop.alignment.as_deref(), Some("-10"));
        assert_eq!(prop.format_specifier.as_deref(), Some("F2"));
        assert_eq!(prop.format_start, Some(10));
    }

    #[test]
    fn test_positional_with_alignment_and_format() {
        let prop = single("Value {0,5:N2}");
        assert_eq!(prop.name, "0");
        assert_eq!(prop.kind, PropertyKind::Positional);
        assert_eq!(prop.alignment.as_deref(), Some("5"));
        assert_eq!(prop.format_specifier.as_deref(), Some("N2"));
    }

    #[test]
    fn test_escaped_braces() {
        assert!(parse_template("{{Name}}").is_empty());
        assert!(parse_template("{{ not a property }}").is_empty());

        let props = parse_template("{{literal}} {Real}");
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "Real");
        assert_eq!(props[0].brace_start, 12);
    }

    #[test]
    fn test_empty_placeholder_is_dropped() {
        assert!(parse_template("{}").is_empty());
        assert!(parse_template("{@}").is_empty());
        let props = parse_template("{} {Next}");
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "Next");
    }

    #[test]
    fn test_internal_space_aborts_only_that_placeholder() {
        let props = parse_template("{First Name} then {Second}");
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "Second");
    }

    #[test]
    fn test_trailing_whitespace_is_padding() {
        let prop = single("{Name  }");
        assert_eq!(prop.name, "Name");
        assert_eq!(prop.length, 4);

        let prop = single("{Name :X}");
        assert_eq!(prop.name, "Name");
        assert_eq!(prop.format_specifier.as_deref(), Some("X"));
    }

    #[test]
    fn test_malformed_resyncs() {
        let props = parse_template("{ {Name}");
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "Name");
        assert_eq!(props[0].brace_start, 2);

        let props = parse_template("{Bad-Name} {Good}");
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "Good");

        let props = parse_template("{@{Inner}");
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "Inner");
    }

    #[test]
    fn test_unterminated_is_dropped() {
        assert!(parse_template("{Name").is_empty());
        assert!(parse_template("{Name:F2").is_empty());
        let props = parse_template("{A} {B");
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_escaped_brace_in_format() {
        let prop = single("{Time:HH}}mm}");
        assert_eq!(prop.format_specifier.as_deref(), Some("HH}}mm"));
        assert_eq!(prop.brace_end, 12);
    }

    #[test]
    fn test_dotted_name() {
        let prop = single("{User.Name}");
        assert_eq!(prop.name, "User.Name");
    }

    #[test]
    fn test_non_ascii_text_offsets() {
        let props = parse_template("Grüße {Name}");
        assert_eq!(props.len(), 1);
        assert_eq!(&"Grüße {Name}"[props[0].start..props[0].end()], "Name");
    }

    #[test]
    fn test_regions_for_destructured_property() {
        let text = "from {@Request}";
        let props = parse_template(text);
        let regions = template_regions(&props, text, 100);
        let kinds: Vec<_> = regions.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ClassificationKind::Brace,
                ClassificationKind::CaptureOperator,
                ClassificationKind::PropertyName,
                ClassificationKind::Brace,
            ]
        );
        assert_eq!(regions[0].start, 105);
        assert_eq!(regions[1].start, 106);
        assert_eq!(regions[2].start, 107);
        assert_eq!(regions[2].text, "Request");
        assert_eq!(regions[3].start, 114);
    }

    #[test]
    fn test_regions_skip_out_of_range_property() {
        let text = "{A}";
        let mut props = parse_template(text);
        props[0].brace_end = 40;
        let regions = template_regions(&props, text, 0);
        assert!(regions.is_empty());
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z_][A-Za-z0-9_]{0,8}"
    }

    proptest! {
        #[test]
        fn prop_round_trips_grammar_templates(
            prefix in "[a-z ]{0,10}",
            suffix in "[a-z ]{0,10}",
            name in name_strategy(),
            operator in prop::option::of(prop_oneof![Just('@'), Just('$')]),
            alignment in prop::option::of("-?[0-9]{1,3}"),
            format in prop::option::of("[A-Za-z0-9.]{1,5}"),
        ) {
            let mut template = prefix.clone();
            template.push('{');
            if let Some(op) = operator {
                template.push(op);
            }
            template.push_str(&name);
            if let Some(alignment) = &alignment {
                template.push(',');
                template.push_str(alignment);
            }
            if let Some(format) = &format {
                template.push(':');
                template.push_str(format);
            }
            template.push('}');
            template.push_str(&suffix);

            let props = parse_template(&template);
            prop_assert_eq!(props.len(), 1);
            let prop = &props[0];
            prop_assert_eq!(&prop.name, &name);
            prop_assert_eq!(&template[prop.start..prop.end()], name.as_str());
            prop_assert_eq!(&template[prop.brace_start..prop.brace_start + 1], "{");
            prop_assert_eq!(&template[prop.brace_end..prop.brace_end + 1], "}");
            prop_assert!(prop.brace_start < prop.start);
            prop_assert!(prop.end() <= prop.brace_end);
            prop_assert_eq!(prop.operator_index.is_some(), operator.is_some());
            prop_assert_eq!(&prop.alignment, &alignment);
            prop_assert_eq!(&prop.format_specifier, &format);
            if let (Some(start), Some(text)) = (prop.alignment_start, &prop.alignment) {
                prop_assert!(start > prop.end() && start < prop.brace_end);
                prop_assert_eq!(&template[start..start + text.len()], text.as_str());
            }
            if let (Some(start), Some(text)) = (prop.format_start, &prop.format_specifier) {
                prop_assert!(start > prop.end() && start < prop.brace_end);
                prop_assert_eq!(&template[start..start + text.len()], text.as_str());
            }
        }

        #[test]
        fn prop_parse_is_idempotent(template in "[{}@$:, a-zA-Z0-9]{0,40}") {
            prop_assert_eq!(parse_template(&template), parse_template(&template));
        }

        #[test]
        fn prop_never_panics_and_offsets_are_in_bounds(template in "\\PC{0,60}") {
            for prop in parse_template(&template) {
                prop_assert!(prop.brace_end < template.len());
                prop_assert!(template.get(prop.start..prop.end()).is_some());
            }
        }
    }
}
