// Test documents and classifier setup

use msgtemplate::model::DocumentSnapshot;
use msgtemplate::{ClassificationKind, ClassifiedRegion, ClassifierConfig, TemplateClassifier};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Classifier confirming call sites with the C# grammar
pub fn structural_classifier() -> TemplateClassifier {
    super::tracing::init_tracing_from_env();
    TemplateClassifier::with_default_provider(ClassifierConfig::default())
}

/// Classifier using only the textual heuristic
pub fn textual_classifier() -> TemplateClassifier {
    super::tracing::init_tracing_from_env();
    TemplateClassifier::new(ClassifierConfig::default(), None)
}

/// Wrap statements in a class and method, one statement per line
///
/// The first statement lands on line 4 of the returned text.
pub fn method_body(statements: &[&str]) -> String {
    let mut text = String::from("class Program\n{\n    static void Main()\n");
    text.push_str("    {\n");
    for statement in statements {
        text.push_str("        ");
        text.push_str(statement);
        text.push('\n');
    }
    text.push_str("    }\n}\n");
    text
}

/// Offset of the first occurrence of `needle`
pub fn offset_of(text: &str, needle: &str) -> usize {
    text.find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in document"))
}

/// Byte range of a whole line (without its line break)
pub fn line_span(snapshot: &DocumentSnapshot, line: usize) -> std::ops::Range<usize> {
    snapshot.line_range(line)
}

pub fn kinds(regions: &[ClassifiedRegion]) -> Vec<(ClassificationKind, String)> {
    regions.iter().map(|r| (r.kind, r.text.clone())).collect()
}

pub fn count(regions: &[ClassifiedRegion], kind: ClassificationKind) -> usize {
    regions.iter().filter(|r| r.kind == kind).count()
}

/// Manages temporary test files
pub struct TestFixture {
    _temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestFixture {
    /// Create a new temporary file with given content
    pub fn new(filename: &str, content: &str) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join(filename);

        let mut file = fs::File::create(&path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(TestFixture {
            _temp_dir: temp_dir,
            path,
        })
    }
}
