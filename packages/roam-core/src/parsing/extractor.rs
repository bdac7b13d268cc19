//! `LanguageExtractor` — the polymorphism point across every
//! supported language, plus the registry that dispatches to one by
//! language tag or file extension.
//!
//! An extractor only ever needs to turn a parsed tree into symbol and
//! reference records — no control-flow or dataflow analysis surface
//! belongs at this layer.

use std::collections::HashMap;
use std::sync::Arc;

use tree_sitter::{Language, Tree};

use crate::shared::models::ExtractionResult;

/// A single supported language. Kept as a closed enum (rather than a
/// free-form string) so dispatch and the ≥15-language coverage
/// requirement are both checkable at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Kotlin,
    Rust,
    Go,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Yaml,
    Hcl,
    Apex,
}

impl LanguageId {
    pub fn name(&self) -> &'static str {
        match self {
            LanguageId::Python => "python",
            LanguageId::JavaScript => "javascript",
            LanguageId::TypeScript => "typescript",
            LanguageId::Java => "java",
            LanguageId::Kotlin => "kotlin",
            LanguageId::Rust => "rust",
            LanguageId::Go => "go",
            LanguageId::Cpp => "cpp",
            LanguageId::CSharp => "csharp",
            LanguageId::Ruby => "ruby",
            LanguageId::Php => "php",
            LanguageId::Swift => "swift",
            LanguageId::Yaml => "yaml",
            LanguageId::Hcl => "hcl",
            LanguageId::Apex => "apex",
        }
    }

    pub fn all() -> &'static [LanguageId] {
        &[
            LanguageId::Python,
            LanguageId::JavaScript,
            LanguageId::TypeScript,
            LanguageId::Java,
            LanguageId::Kotlin,
            LanguageId::Rust,
            LanguageId::Go,
            LanguageId::Cpp,
            LanguageId::CSharp,
            LanguageId::Ruby,
            LanguageId::Php,
            LanguageId::Swift,
            LanguageId::Yaml,
            LanguageId::Hcl,
            LanguageId::Apex,
        ]
    }
}

/// The polymorphism point across every supported language.
pub trait LanguageExtractor: Send + Sync {
    fn language_id(&self) -> LanguageId;

    fn language_name(&self) -> &'static str {
        self.language_id().name()
    }

    fn file_extensions(&self) -> &'static [&'static str];

    /// The tree-sitter grammar this extractor parses with, or `None`
    /// for extractors that work directly on source text (the
    /// regex-fallback languages: YAML, HCL, Apex triggers).
    fn ts_language(&self) -> Option<Language> {
        None
    }

    fn extract_symbols(&self, tree: Option<&Tree>, source: &str, file_path: &str) -> ExtractionResult;

    /// Local references found in the same pass; kept as a separate
    /// method on the trait even though most extractors compute both
    /// in one tree walk and split the result.
    fn extract_references(&self, tree: Option<&Tree>, source: &str, file_path: &str) -> ExtractionResult {
        // Default: extractors that compute symbols+references together
        // override `extract_symbols` and leave this as a no-op, or
        // override both when the passes are genuinely separable.
        let _ = (tree, source, file_path);
        ExtractionResult::default()
    }
}

/// Registry of built-in + plugin-registered extractors, looked up by
/// language tag or file extension.
#[derive(Default)]
pub struct ExtractorRegistry {
    by_language: HashMap<&'static str, Arc<dyn LanguageExtractor>>,
    by_extension: HashMap<String, Arc<dyn LanguageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Arc<dyn LanguageExtractor>) {
        for ext in extractor.file_extensions() {
            self.by_extension.insert((*ext).to_string(), extractor.clone());
        }
        self.by_language.insert(extractor.language_name(), extractor);
    }

    pub fn get(&self, language: &str) -> Option<Arc<dyn LanguageExtractor>> {
        self.by_language.get(language).cloned()
    }

    pub fn get_by_extension(&self, extension: &str) -> Option<Arc<dyn LanguageExtractor>> {
        self.by_extension.get(extension).cloned()
    }

    pub fn get_by_path(&self, path: &str) -> Option<Arc<dyn LanguageExtractor>> {
        let ext = std::path::Path::new(path).extension()?.to_str()?;
        self.get_by_extension(ext)
    }

    pub fn languages(&self) -> Vec<&'static str> {
        self.by_language.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubExtractor;

    impl LanguageExtractor for StubExtractor {
        fn language_id(&self) -> LanguageId {
            LanguageId::Rust
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            &["rs"]
        }

        fn extract_symbols(&self, _tree: Option<&Tree>, _source: &str, _file_path: &str) -> ExtractionResult {
            ExtractionResult::default()
        }
    }

    #[test]
    fn registry_dispatches_by_extension_and_language() {
        let mut reg = ExtractorRegistry::new();
        reg.register(Arc::new(StubExtractor));
        assert!(reg.get("rust").is_some());
        assert!(reg.get_by_extension("rs").is_some());
        assert!(reg.get_by_path("src/lib.rs").is_some());
        assert!(reg.get_by_path("src/lib.py").is_none());
    }

    #[test]
    fn all_lists_fifteen_languages() {
        assert!(LanguageId::all().len() >= 15);
    }
}
