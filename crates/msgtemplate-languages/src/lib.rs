use std::path::Path;

// Re-export tree-sitter crates for use by msgtemplate-engine
pub use tree_sitter;

#[cfg(feature = "tree-sitter-c-sharp")]
pub use tree_sitter_c_sharp;

/// Source languages whose logging calls carry message templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    CSharp,
}

impl Language {
    /// Detect language from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "cs" | "csx" => Some(Language::CSharp),
            _ => None,
        }
    }

    /// Get the tree-sitter grammar for this language
    pub fn grammar(&self) -> Result<tree_sitter::Language, String> {
        match self {
            Self::CSharp => {
                #[cfg(feature = "tree-sitter-c-sharp")]
                {
                    Ok(tree_sitter_c_sharp::LANGUAGE.into())
                }
                #[cfg(not(feature = "tree-sitter-c-sharp"))]
                Err("C# language support not enabled".to_string())
            }
        }
    }

    /// Create a parser configured for this language
    pub fn parser(&self) -> Result<tree_sitter::Parser, String> {
        let grammar = self.grammar()?;
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| format!("Failed to load {self} grammar: {e}"))?;
        tracing::trace!("created {} parser", self);
        Ok(parser)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CSharp => "c_sharp",
        };
        write!(f, "{}", s)
    }
}
