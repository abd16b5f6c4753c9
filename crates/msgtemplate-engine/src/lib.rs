//! Incremental classification of message-template placeholders
//!
//! Finds the string literals passed to logging calls (`Log.Information`,
//! `_logger.LogWarning`, `.Filter.ByExcluding`, ...) in C# source and
//! classifies their placeholders, operators, format specifiers and filter
//! expressions into typed regions a host editor can color.
//!
//! ```
//! use msgtemplate::model::DocumentSnapshot;
//! use msgtemplate::{ClassificationKind, ClassifierConfig, TemplateClassifier};
//!
//! let classifier = TemplateClassifier::new(ClassifierConfig::default(), None);
//! let snapshot = DocumentSnapshot::from_text(r#"Log.Information("Hello {Name}", name);"#);
//! let regions = classifier.classify_document(&snapshot);
//! assert!(regions.iter().any(|r| r.kind == ClassificationKind::PropertyName && r.text == "Name"));
//! ```

pub mod classifier;
pub mod model;
pub mod primitives;
pub mod services;
pub mod syntax;

pub use classifier::TemplateClassifier;
pub use msgtemplate_core::config::ClassifierConfig;
pub use msgtemplate_core::region::{ClassificationKind, ClassifiedRegion, ExpressionRole};
pub use msgtemplate_core::{ClassificationChanged, SnapshotVersion};
