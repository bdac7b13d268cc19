//! Parser pool: caches one grammar per language, parses changed files
//! in parallel across a rayon thread pool.

use std::collections::HashMap;
use std::sync::Mutex;

use rayon::prelude::*;
use tree_sitter::{Parser, Tree};

use crate::parsing::extractor::{ExtractorRegistry, LanguageId};
use crate::shared::models::ExtractionResult;

/// One file's parse input.
pub struct ParseJob {
    pub path: String,
    pub source: String,
    pub language: LanguageId,
}

/// One file's parse+extract output.
pub struct ParseOutcome {
    pub path: String,
    pub result: ExtractionResult,
}

/// Lazily-initialized, language-keyed grammar cache. `tree_sitter::Parser`
/// is not `Sync`, so each worker thread gets its own parser instance on
/// first use rather than sharing one across the pool.
pub struct ParserPool {
    registry: ExtractorRegistry,
}

impl ParserPool {
    pub fn new(registry: ExtractorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Parse and extract every job in parallel. A per-file panic or
    /// parse failure is caught and turned into an `ExtractionResult`
    /// with one error entry rather than aborting the batch — one bad
    /// file never takes down the rest of the run.
    pub fn parse_all(&self, jobs: Vec<ParseJob>) -> Vec<ParseOutcome> {
        thread_local! {
            static PARSERS: Mutex<HashMap<&'static str, Parser>> = Mutex::new(HashMap::new());
        }

        jobs.into_par_iter()
            .map(|job| {
                let extractor = match self.registry.get(job.language.name()) {
                    Some(e) => e,
                    None => {
                        let mut result = ExtractionResult::default();
                        result
                            .errors
                            .push(format!("no extractor registered for {}", job.language.name()));
                        return ParseOutcome { path: job.path, result };
                    }
                };

                let tree: Option<Tree> = extractor.ts_language().and_then(|lang| {
                    PARSERS.with(|cache| {
                        let mut cache = cache.lock().unwrap();
                        let parser = cache.entry(extractor.language_name()).or_insert_with(|| {
                            let mut p = Parser::new();
                            let _ = p.set_language(&lang);
                            p
                        });
                        parser.parse(&job.source, None)
                    })
                });

                let mut result = extractor.extract_symbols(tree.as_ref(), &job.source, &job.path);
                let refs = extractor.extract_references(tree.as_ref(), &job.source, &job.path);
                result.merge(refs);

                ParseOutcome { path: job.path, result }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::extractor::LanguageExtractor;
    use std::sync::Arc;

    struct CountingExtractor;

    impl LanguageExtractor for CountingExtractor {
        fn language_id(&self) -> LanguageId {
            LanguageId::Yaml
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            &["yaml", "yml"]
        }

        fn extract_symbols(&self, _tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
            let mut r = ExtractionResult::default();
            if source.is_empty() {
                r.errors.push("empty file".into());
            }
            r
        }
    }

    #[test]
    fn parse_all_handles_missing_extractor_gracefully() {
        let pool = ParserPool::new(ExtractorRegistry::new());
        let outcomes = pool.parse_all(vec![ParseJob {
            path: "a.rs".into(),
            source: "fn f() {}".into(),
            language: LanguageId::Rust,
        }]);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].result.errors.len(), 1);
    }

    #[test]
    fn parse_all_runs_extractor_without_tree_sitter_grammar() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(CountingExtractor));
        let pool = ParserPool::new(registry);
        let outcomes = pool.parse_all(vec![ParseJob {
            path: "a.yaml".into(),
            source: "key: value".into(),
            language: LanguageId::Yaml,
        }]);
        assert!(outcomes[0].result.errors.is_empty());
    }
}
