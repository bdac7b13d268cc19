//! Cross-language symbol-resolution bridges: protobuf `.proto` ->
//! generated stubs, Apex -> Aura/LWC, GraphQL schema -> client
//! codegen, and similar source-to-generated-code links a same-
//! language resolver can never see. No concrete bridges ship with this
//! crate (each one is a project-specific codegen convention), so only
//! the extension point is built here.

use std::sync::Arc;

use crate::shared::models::SymbolRecord;

/// One cross-language link a bridge's `resolve` step has found.
#[derive(Debug, Clone)]
pub struct CrossLangEdge {
    pub source: String,
    pub target: String,
    pub kind: String,
    pub bridge: String,
}

/// Resolves symbols that cross a language or codegen boundary a
/// single-language extractor has no way to see across.
pub trait LanguageBridge: Send + Sync {
    fn name(&self) -> &str;
    fn source_extensions(&self) -> &[&str];
    fn target_extensions(&self) -> &[&str];

    /// Whether this bridge is relevant for the given file set.
    fn detect(&self, file_paths: &[String]) -> bool;

    /// Resolve links from `source_path`'s symbols into the candidate
    /// target files, keyed by path.
    fn resolve(
        &self,
        source_path: &str,
        source_symbols: &[SymbolRecord],
        target_files: &std::collections::HashMap<String, Vec<SymbolRecord>>,
    ) -> Vec<CrossLangEdge>;
}

#[derive(Default)]
pub struct BridgeRegistry {
    bridges: Vec<Arc<dyn LanguageBridge>>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bridge: Arc<dyn LanguageBridge>) {
        self.bridges.push(bridge);
    }

    pub fn all(&self) -> &[Arc<dyn LanguageBridge>] {
        &self.bridges
    }

    /// Bridges relevant for the given file set.
    pub fn detect(&self, file_paths: &[String]) -> Vec<Arc<dyn LanguageBridge>> {
        self.bridges.iter().filter(|b| b.detect(file_paths)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubBridge;
    impl LanguageBridge for StubBridge {
        fn name(&self) -> &str {
            "stub"
        }
        fn source_extensions(&self) -> &[&str] {
            &[".proto"]
        }
        fn target_extensions(&self) -> &[&str] {
            &[".go"]
        }
        fn detect(&self, file_paths: &[String]) -> bool {
            file_paths.iter().any(|p| p.ends_with(".proto"))
        }
        fn resolve(
            &self,
            source_path: &str,
            _source_symbols: &[SymbolRecord],
            _target_files: &std::collections::HashMap<String, Vec<SymbolRecord>>,
        ) -> Vec<CrossLangEdge> {
            vec![CrossLangEdge {
                source: source_path.to_string(),
                target: "generated.go".to_string(),
                kind: "x-lang".to_string(),
                bridge: self.name().to_string(),
            }]
        }
    }

    #[test]
    fn registry_detects_only_relevant_bridges() {
        let mut registry = BridgeRegistry::new();
        registry.register(Arc::new(StubBridge));
        assert!(registry.detect(&["api.proto".to_string()]).len() == 1);
        assert!(registry.detect(&["main.go".to_string()]).is_empty());
    }
}
