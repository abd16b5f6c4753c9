//! Syntax tree access
//!
//! # Design
//! - `SyntaxNode` is the only view of a tree the classifier depends on, so
//!   the call-site walk can be tested against hand-built trees
//! - `SyntaxTreeProvider` produces trees; `TreeSitterProvider` is the
//!   default, backed by the tree-sitter C# grammar
//! - Parsers are pooled and never held under a lock while parsing

use anyhow::{anyhow, Context};
use msgtemplate_core::SnapshotVersion;
use msgtemplate_languages::Language;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Read-only view of a syntax tree node
pub trait SyntaxNode: Copy {
    /// Grammar node kind (`invocation_expression`, `argument`, ...)
    fn kind(&self) -> &str;
    /// Byte range in the parsed text
    fn span(&self) -> Range<usize>;
    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn child_by_field(&self, field: &str) -> Option<Self>;
    fn is_named(&self) -> bool;
}

impl<'tree> SyntaxNode for tree_sitter::Node<'tree> {
    fn kind(&self) -> &str {
        tree_sitter::Node::kind(self)
    }

    fn span(&self) -> Range<usize> {
        self.start_byte()..self.end_byte()
    }

    fn parent(&self) -> Option<Self> {
        tree_sitter::Node::parent(self)
    }

    fn children(&self) -> Vec<Self> {
        let mut cursor = self.walk();
        tree_sitter::Node::children(self, &mut cursor).collect()
    }

    fn child_by_field(&self, field: &str) -> Option<Self> {
        self.child_by_field_name(field)
    }

    fn is_named(&self) -> bool {
        tree_sitter::Node::is_named(self)
    }
}

/// Identity of a parsed tree, unique for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u64);

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

impl TreeId {
    fn next() -> Self {
        Self(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A syntax tree parsed from one snapshot
pub struct ParsedTree {
    id: TreeId,
    version: SnapshotVersion,
    tree: tree_sitter::Tree,
}

impl ParsedTree {
    pub fn new(version: SnapshotVersion, tree: tree_sitter::Tree) -> Self {
        Self {
            id: TreeId::next(),
            version,
            tree,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Whether the parser had to recover from syntax errors
    pub fn has_error(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Smallest node covering the byte at `offset`
    pub fn node_at(&self, offset: usize) -> Option<tree_sitter::Node<'_>> {
        self.tree
            .root_node()
            .descendant_for_byte_range(offset, offset.saturating_add(1))
    }
}

impl std::fmt::Debug for ParsedTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedTree")
            .field("id", &self.id)
            .field("version", &self.version)
            .finish()
    }
}

/// Something that can parse document text into a syntax tree
pub trait SyntaxTreeProvider: Send + Sync {
    fn parse(&self, text: &str) -> anyhow::Result<tree_sitter::Tree>;
}

/// Tree-sitter backed provider
pub struct TreeSitterProvider {
    language: Language,
    /// Idle parsers; one is taken out for each parse
    parsers: Mutex<Vec<tree_sitter::Parser>>,
}

impl TreeSitterProvider {
    pub fn new(language: Language) -> anyhow::Result<Self> {
        // Fail early if the grammar is unavailable
        let parser = language.parser().map_err(|e| anyhow!(e))?;
        Ok(Self {
            language,
            parsers: Mutex::new(vec![parser]),
        })
    }

    pub fn csharp() -> anyhow::Result<Self> {
        Self::new(Language::CSharp)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn take_parser(&self) -> anyhow::Result<tree_sitter::Parser> {
        let pooled = self.parsers.lock().ok().and_then(|mut pool| pool.pop());
        match pooled {
            Some(parser) => Ok(parser),
            None => self.language.parser().map_err(|e| anyhow!(e)),
        }
    }

    fn return_parser(&self, parser: tree_sitter::Parser) {
        if let Ok(mut pool) = self.parsers.lock() {
            pool.push(parser);
        }
    }
}

impl SyntaxTreeProvider for TreeSitterProvider {
    fn parse(&self, text: &str) -> anyhow::Result<tree_sitter::Tree> {
        let mut parser = self.take_parser()?;
        let tree = parser.parse(text, None);
        self.return_parser(parser);
        tree.with_context(|| format!("{} parser produced no tree", self.language))
    }
}
