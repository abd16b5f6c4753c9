// End-to-end classification of C# documents

mod common;

use common::fixtures::{
    count, kinds, line_span, method_body, offset_of, structural_classifier, textual_classifier,
};
use msgtemplate::model::DocumentSnapshot;
use msgtemplate::{ClassificationKind, ClassifierConfig, ExpressionRole, TemplateClassifier};

#[test]
fn test_static_log_call_with_capture() {
    let text = method_body(&[
        r#"Log.Information("User {UserId} logged in from {@Request}", id, req);"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert_eq!(count(&regions, ClassificationKind::PropertyName), 2);
    assert_eq!(count(&regions, ClassificationKind::CaptureOperator), 1);
    assert_eq!(count(&regions, ClassificationKind::Brace), 4);

    let user = regions
        .iter()
        .find(|r| r.text == "UserId")
        .expect("UserId region");
    assert_eq!(user.start, offset_of(&text, "UserId"));
    assert_eq!(user.length, 6);
}

#[test]
fn test_positional_placeholder_with_alignment_and_format() {
    let text = method_body(&[r#"logger.LogInformation("Value {0,5:N2}", v);"#]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert_eq!(
        kinds(&regions),
        vec![
            (ClassificationKind::Brace, "{".to_string()),
            (ClassificationKind::PositionalIndex, "0".to_string()),
            (ClassificationKind::Alignment, "5".to_string()),
            (ClassificationKind::FormatSpecifier, "N2".to_string()),
            (ClassificationKind::Brace, "}".to_string()),
        ]
    );
}

#[test]
fn test_stringify_and_escaped_braces() {
    let text = method_body(&[r#"Log.Warning("{{literal}} {$Path}", path);"#]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert_eq!(count(&regions, ClassificationKind::StringifyOperator), 1);
    assert_eq!(count(&regions, ClassificationKind::PropertyName), 1);
    assert!(regions.iter().all(|r| r.text != "literal"));
}

#[test]
fn test_literals_outside_logging_calls_are_ignored() {
    let text = method_body(&[
        r#"var template = "User {UserId}";"#,
        r#"Console.WriteLine("Hello {Name}");"#,
        r#"Log.Information($"Interpolated {name}");"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);
    assert!(regions.is_empty(), "unexpected regions: {:?}", kinds(&regions));
}

#[test]
fn test_only_first_literal_argument_is_template() {
    let text = method_body(&[r#"Log.Error(ex, "Failed {Operation}", "extra {NotATemplate}");"#]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert!(regions.iter().any(|r| r.text == "Operation"));
    assert!(regions.iter().all(|r| r.text != "NotATemplate"));
}

#[test]
fn test_filter_expression() {
    let text = method_body(&[r#"cfg.Filter.ByExcluding("RequestPath like '/health%'");"#]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let classifier = structural_classifier();
    let regions = classifier.classify_document(&snapshot);

    assert_eq!(
        kinds(&regions),
        vec![
            (ClassificationKind::ExpressionProperty, "RequestPath".to_string()),
            (ClassificationKind::ExpressionKeyword, "like".to_string()),
            (ClassificationKind::ExpressionLiteral, "'/health%'".to_string()),
        ]
    );
    let literal = offset_of(&text, "\"RequestPath");
    assert_eq!(
        classifier.expression_role_of(&snapshot, literal),
        Some(ExpressionRole::FilterPredicate)
    );
}

#[test]
fn test_expression_template() {
    let text = method_body(&[
        r#"var formatter = new ExpressionTemplate("[{@t:HH:mm:ss} {@l}] {@m}\n");"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert_eq!(count(&regions, ClassificationKind::ExpressionBuiltin), 3);
    assert_eq!(count(&regions, ClassificationKind::Brace), 6);
    assert!(regions
        .iter()
        .any(|r| r.kind == ClassificationKind::FormatSpecifier && r.text == "HH:mm:ss"));
}

#[test]
fn test_output_template_argument() {
    let text = method_body(&[
        r#"cfg.WriteTo.Console(outputTemplate: "{Timestamp:HH:mm} {Message}");"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert!(regions
        .iter()
        .any(|r| r.kind == ClassificationKind::PropertyName && r.text == "Timestamp"));
    assert!(regions
        .iter()
        .any(|r| r.kind == ClassificationKind::FormatSpecifier && r.text == "HH:mm"));
    assert!(regions
        .iter()
        .any(|r| r.kind == ClassificationKind::PropertyName && r.text == "Message"));
}

/// Filler on lines 0..=9, a raw literal on lines 10..=15, trailing code after
fn fenced_document() -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("class Program".into());
    lines.push("{".into());
    lines.push("    static void Main()".into());
    lines.push("    {".into());
    for i in 0..6 {
        lines.push(format!("        var x{i} = {i};"));
    }
    lines.push("        Log.Information(\"\"\"".into());
    lines.push("            User {UserId}".into());
    lines.push("            logged in from {@Request}".into());
    lines.push("            at {Timestamp:HH:mm}".into());
    lines.push("            done".into());
    lines.push("            \"\"\", a, b, c);".into());
    lines.push("        var after = new { Brace = 1 };".into());
    lines.push("    }".into());
    lines.push("}".into());
    lines.join("\n") + "\n"
}

#[test]
fn test_span_inside_fenced_literal() {
    let text = fenced_document();
    let snapshot = DocumentSnapshot::from_text(&text);
    let classifier = structural_classifier();

    assert!(classifier.is_inside_multiline_literal(&snapshot, 12));
    let regions = classifier.classify(&snapshot, line_span(&snapshot, 12));
    assert_eq!(
        kinds(&regions),
        vec![
            (ClassificationKind::Brace, "{".to_string()),
            (ClassificationKind::CaptureOperator, "@".to_string()),
            (ClassificationKind::PropertyName, "Request".to_string()),
            (ClassificationKind::Brace, "}".to_string()),
        ]
    );
    assert_eq!(regions[2].start, offset_of(&text, "Request"));
}

#[test]
fn test_line_after_fenced_literal_is_outside() {
    let text = fenced_document();
    let snapshot = DocumentSnapshot::from_text(&text);
    let classifier = structural_classifier();

    assert!(!classifier.is_inside_multiline_literal(&snapshot, 16));
    assert!(classifier.classify(&snapshot, line_span(&snapshot, 16)).is_empty());
}

#[test]
fn test_fenced_literal_classified_whole() {
    let text = fenced_document();
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = structural_classifier().classify_document(&snapshot);

    assert_eq!(count(&regions, ClassificationKind::PropertyName), 3);
    assert_eq!(count(&regions, ClassificationKind::FormatSpecifier), 1);
    assert!(regions.iter().all(|r| r.text != "Brace"));
}

#[test]
fn test_verbatim_fragment() {
    let text = method_body(&[
        r#"logger.Warning(@"Disk {Pct}"#,
        r#"    is full on {Drive}", pct, drive);"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let classifier = structural_classifier();

    // Statements start on line 4
    assert!(classifier.is_inside_multiline_literal(&snapshot, 5));
    let regions = classifier.classify(&snapshot, line_span(&snapshot, 5));
    assert_eq!(
        kinds(&regions),
        vec![
            (ClassificationKind::Brace, "{".to_string()),
            (ClassificationKind::PropertyName, "Drive".to_string()),
            (ClassificationKind::Brace, "}".to_string()),
        ]
    );
}

#[test]
fn test_code_after_bare_closing_fence_is_not_a_template() {
    let text = method_body(&[
        "Log.Information(",
        r#"    """"#,
        "    User {Id} logged in,",
        r#"    """"#,
        "    , id);",
        "var after = 1;",
        r#"var s = Format("{NotTemplate}");"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);

    for classifier in [textual_classifier(), structural_classifier()] {
        assert!(classifier.is_inside_multiline_literal(&snapshot, 6));
        for line in 7..=10 {
            assert!(!classifier.is_inside_multiline_literal(&snapshot, line), "line {line}");
        }
        let content = classifier.classify(&snapshot, line_span(&snapshot, 6));
        assert!(content.iter().any(|r| r.text == "Id"));
        let after = classifier.classify(&snapshot, line_span(&snapshot, 10));
        assert!(after.is_empty(), "unexpected regions: {:?}", kinds(&after));
    }
}

#[test]
fn test_literal_far_below_its_call_line() {
    let text = method_body(&[
        "_logger.LogWarning(",
        "    eventId,",
        "    exception,",
        r#"    "User {Name} failed", name);"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let classifier = structural_classifier();

    let line = classifier.classify(&snapshot, line_span(&snapshot, 7));
    assert_eq!(
        kinds(&line),
        vec![
            (ClassificationKind::Brace, "{".to_string()),
            (ClassificationKind::PropertyName, "Name".to_string()),
            (ClassificationKind::Brace, "}".to_string()),
        ]
    );
    assert_eq!(line, classifier.classify_document(&snapshot));
}

#[test]
fn test_null_conditional_logger() {
    let text = method_body(&[r#"_logger?.LogInformation("User {Name}", name);"#]);
    let snapshot = DocumentSnapshot::from_text(&text);

    let structural = structural_classifier().classify_document(&snapshot);
    assert_eq!(count(&structural, ClassificationKind::PropertyName), 1);
    assert_eq!(structural, textual_classifier().classify_document(&snapshot));
}

#[test]
fn test_huge_lookahead_setting() {
    let config = ClassifierConfig {
        fenced_lookahead_lines: usize::MAX,
        ..ClassifierConfig::default()
    };
    let classifier = TemplateClassifier::with_default_provider(config);
    let text = fenced_document();
    let snapshot = DocumentSnapshot::from_text(&text);
    let regions = classifier.classify(&snapshot, line_span(&snapshot, 12));
    assert!(regions.iter().any(|r| r.text == "Request"));
}

#[test]
fn test_textual_fallback_matches_structural_for_simple_calls() {
    let text = method_body(&[
        r#"Log.Information("User {UserId} logged in from {@Request}", id, req);"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);

    let structural = structural_classifier().classify_document(&snapshot);
    let textual = textual_classifier().classify_document(&snapshot);
    assert_eq!(structural, textual);
}

#[test]
fn test_literal_recognition_queries() {
    let text = method_body(&[
        r#"Log.Information("User {UserId}", id);"#,
        r#"var template = "User {UserId}";"#,
    ]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let classifier = structural_classifier();

    let logged = offset_of(&text, "\"User");
    let assigned = logged + 1 + text[logged + 1..].find("\"User").unwrap();
    assert!(classifier.is_recognized_call_argument(&snapshot, logged));
    assert!(!classifier.is_recognized_call_argument(&snapshot, assigned));
    assert_eq!(classifier.expression_role_of(&snapshot, logged), None);
}

#[test]
fn test_empty_span_and_empty_document() {
    let empty = DocumentSnapshot::from_text("");
    assert!(structural_classifier().classify_document(&empty).is_empty());

    let classifier = structural_classifier();
    let text = method_body(&[r#"Log.Information("User {UserId}", id);"#]);
    let snapshot = DocumentSnapshot::from_text(&text);
    let at = offset_of(&text, "UserId");
    assert!(classifier.classify(&snapshot, at..at).is_empty());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn regions_lie_within_requested_span(a in 0usize..400, b in 0usize..400) {
            let text = fenced_document();
            let snapshot = DocumentSnapshot::from_text(&text);
            let (start, end) = (a.min(b), a.max(b));
            let regions = textual_classifier().classify(&snapshot, start..end);
            for region in regions.iter() {
                prop_assert!(region.overlaps(&(start..end)));
                prop_assert_eq!(&text[region.range()], region.text.as_str());
            }
        }
    }
}
