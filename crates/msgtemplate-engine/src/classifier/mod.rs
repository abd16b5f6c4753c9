//! Per-document template classifier
//!
//! # Design
//! - **Two-tier call recognition**: a textual prefilter and regex match find
//!   candidate calls, a syntax tree confirms each literal argument
//! - **Fragment awareness**: a span starting inside a multi-line literal is
//!   classified by re-reading the enclosing literal from its opener
//! - **Distant calls**: a literal whose call opened more lines above than the
//!   textual scan reaches is traced back to its call through the tree
//! - **Bounded invalidation**: span results live for one snapshot version;
//!   line-membership answers are carried across edits except in a small
//!   window around each edit, widened when a fence or `@"` marker was typed
//!   or removed
//!
//! All methods take `&self`; one classifier is shared between the host's
//! UI thread and background classification threads.

pub mod cache;

use crate::model::{DocumentSnapshot, TextChange};
use crate::primitives::expression::{
    expression_regions, tokenize_expression, tokenize_expression_template,
};
use crate::primitives::literal::{
    find_literal_arguments, literal_starts, try_parse_literal, LiteralArgument, LiteralSpan,
};
use crate::primitives::template_parser::template_regions;
use crate::services::call_site::{
    fallback_accepts, find_call_sites, CallShape, CallSiteMatch, CallSitePrefilter,
};
use crate::services::multiline::{LineShift, MultiLineDetector, MultiLineLiteral};
use crate::services::structural::{Confirmation, StructuralClassifier};
use crate::syntax::{SyntaxTreeProvider, TreeSitterProvider};
use anyhow::Context;
use cache::{SpanCache, TemplateCache};
use msgtemplate_core::config::ClassifierConfig;
use msgtemplate_core::region::{ClassificationKind, ClassifiedRegion, ExpressionRole};
use msgtemplate_core::ClassificationChanged;
use std::collections::HashSet;
use std::ops::{Range, RangeInclusive};
use std::sync::{mpsc, Arc, Mutex, RwLock};

/// Whether text contains something that opens or closes a multi-line literal
fn has_fence_marker(text: &str) -> bool {
    text.contains("\"\"\"") || text.contains("@\"")
}

fn is_property_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_')
}

/// How one edit is applied to the caches, computed before any lock is taken
struct EditPlan {
    shift: LineShift,
    lines: RangeInclusive<usize>,
    notify: Range<usize>,
}

/// Classifies message-template regions in one document
pub struct TemplateClassifier {
    config: ClassifierConfig,
    detector: MultiLineDetector,
    structural: StructuralClassifier,
    spans: SpanCache,
    templates: TemplateCache,
    /// Latest snapshot seen; its text is the "before" side of the next edit
    latest: RwLock<Option<DocumentSnapshot>>,
    /// Serializes cache invalidation across concurrent edit notifications
    invalidation: Mutex<()>,
    listeners: Mutex<Vec<mpsc::Sender<ClassificationChanged>>>,
}

impl TemplateClassifier {
    pub fn new(config: ClassifierConfig, provider: Option<Arc<dyn SyntaxTreeProvider>>) -> Self {
        Self {
            detector: MultiLineDetector::new(&config),
            structural: StructuralClassifier::new(&config, provider),
            spans: SpanCache::new(config.span_cache_capacity),
            templates: TemplateCache::new(config.template_cache_capacity),
            latest: RwLock::new(None),
            invalidation: Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Classifier backed by the tree-sitter C# grammar
    ///
    /// Falls back to textual recognition only if the grammar cannot be loaded.
    pub fn with_default_provider(config: ClassifierConfig) -> Self {
        let provider: Option<Arc<dyn SyntaxTreeProvider>> = match TreeSitterProvider::csharp() {
            Ok(provider) => Some(Arc::new(provider)),
            Err(e) => {
                tracing::warn!("C# grammar unavailable, using textual call recognition: {:#}", e);
                None
            }
        };
        Self::new(config, provider)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Receive a notification whenever an edit changes classification of a range
    pub fn subscribe(&self) -> mpsc::Receiver<ClassificationChanged> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(tx);
        }
        rx
    }

    fn observe(&self, snapshot: &DocumentSnapshot) {
        let is_newer = self
            .latest
            .read()
            .map(|latest| latest.as_ref().map_or(true, |s| s.version() < snapshot.version()))
            .unwrap_or(false);
        if is_newer {
            if let Ok(mut latest) = self.latest.write() {
                if latest.as_ref().map_or(true, |s| s.version() < snapshot.version()) {
                    *latest = Some(snapshot.clone());
                }
            }
        }
    }

    /// Classified regions overlapping `span`, sorted by position
    pub fn classify(
        &self,
        snapshot: &DocumentSnapshot,
        span: Range<usize>,
    ) -> Arc<[ClassifiedRegion]> {
        let len = snapshot.len();
        let start = span.start.min(len);
        let span = start..span.end.clamp(start, len);
        let version = snapshot.version();
        self.observe(snapshot);

        if let Some(regions) = self.spans.get(version, &span) {
            return regions;
        }

        let regions: Arc<[ClassifiedRegion]> = self.compute(snapshot, &span).into();
        self.spans.insert(version, &span, regions.clone());
        regions
    }

    /// Classify a whole snapshot
    pub fn classify_document(&self, snapshot: &DocumentSnapshot) -> Arc<[ClassifiedRegion]> {
        self.classify(snapshot, 0..snapshot.len())
    }

    fn compute(&self, snapshot: &DocumentSnapshot, span: &Range<usize>) -> Vec<ClassifiedRegion> {
        let mut regions = Vec::new();
        if span.is_empty() {
            return regions;
        }

        let first_line = snapshot.line_of_offset(span.start);
        let last_line = snapshot.line_of_offset(span.end.saturating_sub(1).max(span.start));
        let span_lines = snapshot.lines_range(first_line, last_line);

        // Literals starting before this offset were read as part of a fragment
        let mut literals_from = span_lines.start;
        if self.detector.is_inside(snapshot, first_line) {
            if let Some(found) = self.detector.enclosing_literal(snapshot, first_line) {
                match self.classify_fragment(snapshot, &found) {
                    Ok((fragment, end)) => {
                        regions.extend(fragment);
                        literals_from = literals_from.max(end);
                    }
                    Err(e) => tracing::debug!(
                        "skipping literal opened on line {}: {:#}",
                        found.open_line,
                        e
                    ),
                }
            }
        }

        // Calls opened a few lines above the span can still own literals inside it
        let scan_first = first_line.saturating_sub(self.config.fallback_window_lines);
        let scan = snapshot.lines_range(scan_first, last_line);
        let scan_text = snapshot.slice(scan.clone()).unwrap_or("");
        let span_text = snapshot.slice(span_lines.clone()).unwrap_or("");

        let mut anchors = HashSet::new();
        let may_hold_literal =
            span_text.contains('"') || CallSitePrefilter::may_contain_template(span_text);
        if may_hold_literal && CallSitePrefilter::has_call_marker(scan_text) {
            for site in find_call_sites(scan_text, self.config.max_receiver_scan_chars) {
                let site = site.shifted(scan.start);
                anchors.insert(site.anchor);
                match self.classify_call(snapshot, &site) {
                    Ok(call_regions) => regions.extend(call_regions),
                    Err(e) => tracing::debug!("skipping call at {}: {:#}", site.start, e),
                }
            }
        }

        // Calls opened further up are found from their literals
        if self.structural.has_provider() && literals_from < span_lines.end {
            let tail = snapshot.slice(literals_from..span_lines.end).unwrap_or("");
            for start in literal_starts(tail) {
                let start = literals_from + start;
                let Some(site) = self.structural.enclosing_call(snapshot, start) else {
                    continue;
                };
                if !anchors.insert(site.anchor) {
                    continue;
                }
                tracing::trace!("literal at {} belongs to the call at {}", start, site.start);
                match self.classify_call(snapshot, &site) {
                    Ok(call_regions) => regions.extend(call_regions),
                    Err(e) => tracing::debug!("skipping call at {}: {:#}", site.start, e),
                }
            }
        }

        regions.retain(|region| region.overlaps(span));
        regions.sort_by(|a, b| (a.start, a.length).cmp(&(b.start, b.length)));
        regions.dedup();
        regions
    }

    /// Regions of the literal enclosing a fragment, and the offset where that literal ends
    fn classify_fragment(
        &self,
        snapshot: &DocumentSnapshot,
        found: &MultiLineLiteral,
    ) -> anyhow::Result<(Vec<ClassifiedRegion>, usize)> {
        // Bound the re-read of an unterminated literal by the lookahead window
        let last_line = found
            .open_line
            .saturating_add(self.config.fenced_lookahead_lines)
            .min(snapshot.line_count().saturating_sub(1));
        let window_end = snapshot.line_extent(last_line).end;
        let window = snapshot
            .slice(0..window_end)
            .context("literal window splits a character")?;
        let literal = try_parse_literal(window, found.literal_start)
            .with_context(|| format!("no literal at offset {}", found.literal_start))?;

        let confirmation = self.confirm(snapshot, literal.start);
        if !confirmation.recognized {
            return Ok((Vec::new(), literal.end));
        }
        Ok((self.literal_regions(&literal, confirmation.role), literal.end))
    }

    fn classify_call(
        &self,
        snapshot: &DocumentSnapshot,
        site: &CallSiteMatch,
    ) -> anyhow::Result<Vec<ClassifiedRegion>> {
        let text = snapshot.text();
        let arguments = match site.shape {
            CallShape::OutputTemplate => {
                let literal = try_parse_literal(text, site.anchor).with_context(|| {
                    format!("no literal after outputTemplate at {}", site.anchor)
                })?;
                vec![LiteralArgument {
                    literal,
                    argument_index: 0,
                }]
            }
            _ => find_literal_arguments(text, site.anchor, self.config.max_argument_scan_chars),
        };

        // Logging calls: only the first literal-bearing argument is the template
        let template_argument = arguments.first().map(|a| a.argument_index);

        let mut regions = Vec::new();
        for argument in &arguments {
            let expected_role = site.shape.role_for_argument(argument.argument_index);
            let wanted = match site.shape {
                CallShape::Static | CallShape::Instance => {
                    Some(argument.argument_index) == template_argument
                }
                CallShape::Configuration(_) => expected_role.is_some(),
                CallShape::OutputTemplate => true,
            };
            if !wanted {
                continue;
            }

            let confirmation = self.confirm(snapshot, argument.literal.start);
            if !confirmation.recognized {
                tracing::trace!(
                    "literal at {} not confirmed as call argument",
                    argument.literal.start
                );
                continue;
            }
            let role = confirmation.role.or(expected_role);
            regions.extend(self.literal_regions(&argument.literal, role));
        }
        Ok(regions)
    }

    fn literal_regions(
        &self,
        literal: &LiteralSpan,
        role: Option<ExpressionRole>,
    ) -> Vec<ClassifiedRegion> {
        let base = literal.content_start();
        let content = literal.content.as_str();
        match role {
            None => {
                let properties = self.templates.get_or_parse(content);
                template_regions(&properties, content, base)
            }
            Some(ExpressionRole::ComputedPropertyName) => {
                if is_property_name(content) {
                    vec![ClassifiedRegion::new(ClassificationKind::PropertyName, base, content)]
                } else {
                    Vec::new()
                }
            }
            Some(ExpressionRole::ExpressionTemplate) => {
                expression_regions(&tokenize_expression_template(content), content, base)
            }
            Some(_) => expression_regions(&tokenize_expression(content), content, base),
        }
    }

    /// Structural check with the textual fallback
    fn confirm(&self, snapshot: &DocumentSnapshot, literal_start: usize) -> Confirmation {
        if let Some(confirmation) = self.structural.confirm(snapshot, literal_start) {
            return confirmation;
        }
        let line = snapshot.line_of_offset(literal_start);
        let recognized = fallback_accepts(snapshot, line, self.config.fallback_window_lines);
        Confirmation {
            recognized,
            role: if recognized {
                self.textual_role(snapshot, literal_start)
            } else {
                None
            },
        }
    }

    /// Role of a literal according to the call sites matched textually around it
    fn textual_role(
        &self,
        snapshot: &DocumentSnapshot,
        literal_start: usize,
    ) -> Option<ExpressionRole> {
        let line = snapshot.line_of_offset(literal_start);
        let first = line.saturating_sub(self.config.fallback_window_lines);
        let scan = snapshot.lines_range(first, line);
        let text = snapshot.slice(scan.clone())?;
        find_call_sites(text, self.config.max_receiver_scan_chars)
            .into_iter()
            .map(|site| site.shifted(scan.start))
            .filter(|site| matches!(site.shape, CallShape::Configuration(_)))
            .find_map(|site| {
                let max_chars = self.config.max_argument_scan_chars;
                find_literal_arguments(snapshot.text(), site.anchor, max_chars)
                    .into_iter()
                    .find(|argument| argument.literal.start == literal_start)
                    .and_then(|argument| site.shape.role_for_argument(argument.argument_index))
            })
    }

    /// Whether the literal starting at `literal_start` is an argument of a recognized call
    pub fn is_recognized_call_argument(
        &self,
        snapshot: &DocumentSnapshot,
        literal_start: usize,
    ) -> bool {
        self.confirm(snapshot, literal_start).recognized
    }

    /// Expression role of the literal starting at `literal_start`, if it is expression text
    pub fn expression_role_of(
        &self,
        snapshot: &DocumentSnapshot,
        literal_start: usize,
    ) -> Option<ExpressionRole> {
        let confirmation = self.confirm(snapshot, literal_start);
        if confirmation.recognized {
            confirmation.role
        } else {
            None
        }
    }

    /// Whether `line` lies inside a multi-line literal of a recognized call
    pub fn is_inside_multiline_literal(&self, snapshot: &DocumentSnapshot, line: usize) -> bool {
        self.detector.is_inside(snapshot, line)
    }

    fn plan_edit(
        &self,
        previous: Option<&DocumentSnapshot>,
        snapshot: &DocumentSnapshot,
        change: &TextChange,
    ) -> EditPlan {
        let new_first = snapshot.line_of_offset(change.new_range.start);
        let new_last = snapshot.line_of_offset(change.new_range.end);
        // A bare fence below the edited lines takes its call from the line above it
        let below = (new_last + 1).min(snapshot.line_count().saturating_sub(1));
        let inserted = snapshot
            .slice(snapshot.lines_range(new_first, below.max(new_last)))
            .unwrap_or("");

        let (old_first, old_last, removed_fence) = match previous {
            Some(old) => {
                let first = old.line_of_offset(change.old_range.start);
                let last = old.line_of_offset(change.old_range.end);
                let removed = old.slice(old.lines_range(first, last)).unwrap_or("");
                (first, last, has_fence_marker(removed))
            }
            None => (new_first, new_first, false),
        };

        let wide = removed_fence || has_fence_marker(inserted);
        let window = if wide {
            self.config.wide_invalidation_lines
        } else {
            self.config.narrow_invalidation_lines
        };
        let first = new_first.saturating_sub(window);
        let last = (new_last + window).min(snapshot.line_count().saturating_sub(1));
        let notify = if wide {
            snapshot.lines_range(first, last)
        } else {
            snapshot.extend_to_lines(&change.new_range)
        };

        EditPlan {
            shift: LineShift {
                old_first,
                old_last,
                delta: (new_last - new_first) as isize - (old_last - old_first) as isize,
            },
            lines: first..=last,
            notify,
        }
    }

    /// Apply an edit: move caches onto `snapshot` and notify subscribers
    ///
    /// `changes` are expressed against the previous snapshot this classifier
    /// saw. Span results are all dropped; line-membership answers outside
    /// the invalidation windows are renumbered and kept. Returns the
    /// notifications that were sent.
    pub fn on_edit(
        &self,
        snapshot: &DocumentSnapshot,
        changes: &[TextChange],
    ) -> Vec<ClassificationChanged> {
        let new_version = snapshot.version();
        let previous = self
            .latest
            .read()
            .ok()
            .and_then(|latest| latest.clone())
            .filter(|previous| previous.version() < new_version);

        // Inspect text before taking the invalidation lock
        let plans: Vec<EditPlan> = changes
            .iter()
            .map(|change| self.plan_edit(previous.as_ref(), snapshot, change))
            .collect();
        let shifts: Vec<LineShift> = plans.iter().map(|p| p.shift).collect();
        let lines: Vec<RangeInclusive<usize>> = plans.iter().map(|p| p.lines.clone()).collect();

        {
            let _guard = self.invalidation.lock();
            let dropped = self.spans.advance(new_version);
            match previous.as_ref().map(|p| p.version()) {
                Some(old) => {
                    self.detector.cache().rebase(old, new_version, &shifts, &lines);
                    tracing::debug!(
                        "edit {} -> {}: {} change(s), {} cached span(s) dropped",
                        old,
                        new_version,
                        changes.len(),
                        dropped
                    );
                }
                None => {
                    // Nothing to carry over from an unknown snapshot
                    self.detector.cache().clear();
                    tracing::debug!("edit to {}: no previous snapshot, caches reset", new_version);
                }
            }
            if let Ok(mut latest) = self.latest.write() {
                *latest = Some(snapshot.clone());
            }
        }

        let notifications: Vec<ClassificationChanged> = plans
            .into_iter()
            .map(|plan| ClassificationChanged {
                version: new_version,
                range: plan.notify,
            })
            .collect();
        self.notify(&notifications);
        notifications
    }

    fn notify(&self, notifications: &[ClassificationChanged]) {
        if notifications.is_empty() {
            return;
        }
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|tx| notifications.iter().all(|n| tx.send(n.clone()).is_ok()));
        }
    }

    /// Drop every cached answer
    pub fn clear(&self) {
        let _guard = self.invalidation.lock();
        self.spans.clear();
        self.templates.clear();
        self.detector.cache().clear();
        self.structural.clear();
    }

    #[cfg(test)]
    pub(crate) fn cached_span_count(&self) -> usize {
        self.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    fn textual() -> TemplateClassifier {
        TemplateClassifier::new(ClassifierConfig::default(), None)
    }

    fn kinds(regions: &[ClassifiedRegion]) -> Vec<(ClassificationKind, &str)> {
        regions.iter().map(|r| (r.kind, r.text.as_str())).collect()
    }

    #[test]
    fn test_textual_classification_of_log_call() {
        let snapshot = DocumentSnapshot::from_text(r#"Log.Information("Hello {Name}", name);"#);
        let regions = textual().classify_document(&snapshot);
        assert_eq!(
            kinds(&regions),
            vec![
                (ClassificationKind::Brace, "{"),
                (ClassificationKind::PropertyName, "Name"),
                (ClassificationKind::Brace, "}"),
            ]
        );
        assert_eq!(regions[1].start, 24);
    }

    #[test]
    fn test_only_first_literal_argument_is_template() {
        let text = r#"logger.Warning("Value {A}", "not {B}");"#;
        let snapshot = DocumentSnapshot::from_text(text);
        let regions = textual().classify_document(&snapshot);
        assert!(regions.iter().all(|r| r.text != "B"));
        assert!(regions.iter().any(|r| r.text == "A"));
    }

    #[test]
    fn test_span_filtering() {
        let text = r#"Log.Debug("{A} and {B}", a, b);"#;
        let snapshot = DocumentSnapshot::from_text(text);
        let b = text.find('B').unwrap();
        let regions = textual().classify(&snapshot, b..b + 1);
        assert_eq!(kinds(&regions), vec![(ClassificationKind::PropertyName, "B")]);
    }

    #[test]
    fn test_computed_property_name_and_expression() {
        let text = r#".Enrich.WithComputed("ElapsedMs", "Elapsed * 1000")"#;
        let snapshot = DocumentSnapshot::from_text(text);
        let regions = textual().classify_document(&snapshot);
        assert_eq!(
            kinds(&regions),
            vec![
                (ClassificationKind::PropertyName, "ElapsedMs"),
                (ClassificationKind::ExpressionProperty, "Elapsed"),
                (ClassificationKind::ExpressionOperator, "*"),
                (ClassificationKind::ExpressionLiteral, "1000"),
            ]
        );
    }

    #[test]
    fn test_results_are_cached_per_version() {
        let classifier = textual();
        let snapshot = DocumentSnapshot::from_text(r#"Log.Debug("{A}", a);"#);
        let first = classifier.classify(&snapshot, 0..10);
        let second = classifier.classify(&snapshot, 0..10);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(classifier.cached_span_count(), 1);

        classifier.clear();
        assert_eq!(classifier.cached_span_count(), 0);
    }

    #[test]
    fn test_out_of_range_span_is_clamped() {
        let snapshot = DocumentSnapshot::from_text(r#"Log.Debug("{A}", a);"#);
        let regions = textual().classify(&snapshot, 5..500);
        assert_eq!(regions.len(), 3);
        assert!(textual().classify(&snapshot, 400..500).is_empty());
    }

    #[test]
    fn test_edit_drops_spans_and_notifies() {
        let classifier = textual();
        let rx = classifier.subscribe();
        let mut document = Document::new("Log.Debug(\"{A}\", a);\nvar x = 1;\n");
        let first = document.snapshot().clone();
        classifier.classify(&first, 0..20);

        let (snapshot, change) = document.insert(first.len(), "// tail\n");
        let sent = classifier.on_edit(&snapshot, &[change]);
        assert_eq!(sent.len(), 1);
        let received = rx.try_recv().unwrap();
        assert_eq!(received, sent[0]);
        assert_eq!(received.version, snapshot.version());

        // Span results never outlive their snapshot
        assert_eq!(classifier.cached_span_count(), 0);
    }

    #[test]
    fn test_property_name_check() {
        assert!(is_property_name("Elapsed_Ms2"));
        assert!(!is_property_name("two words"));
        assert!(!is_property_name(""));
    }
}
