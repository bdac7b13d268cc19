pub mod generic;
pub mod java_lang;
pub mod javascript;
pub mod python;
pub mod regex_fallback;
pub mod rust_lang;

use std::sync::Arc;

use crate::parsing::extractor::ExtractorRegistry;

/// Build the registry of every built-in extractor. Plugin-registered
/// extractors are added on top of this by the plugin registry (§4.9).
pub fn register_builtin_extractors() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();
    registry.register(Arc::new(python::PythonExtractor));
    registry.register(Arc::new(javascript::JavaScriptExtractor::javascript()));
    registry.register(Arc::new(javascript::JavaScriptExtractor::typescript()));
    registry.register(Arc::new(rust_lang::RustExtractor));
    registry.register(Arc::new(java_lang::JavaExtractor));
    registry.register(Arc::new(generic::GenericExtractor::go()));
    registry.register(Arc::new(generic::GenericExtractor::kotlin()));
    registry.register(Arc::new(generic::GenericExtractor::cpp()));
    registry.register(Arc::new(generic::GenericExtractor::csharp()));
    registry.register(Arc::new(generic::GenericExtractor::ruby()));
    registry.register(Arc::new(generic::GenericExtractor::php()));
    registry.register(Arc::new(generic::GenericExtractor::swift()));
    registry.register(Arc::new(regex_fallback::YamlExtractor));
    registry.register(Arc::new(regex_fallback::HclExtractor));
    registry.register(Arc::new(regex_fallback::ApexExtractor));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_at_least_fifteen_languages() {
        let registry = register_builtin_extractors();
        assert!(registry.languages().len() >= 15);
    }

    #[test]
    fn every_supported_extension_resolves() {
        let registry = register_builtin_extractors();
        for ext in [
            "py", "js", "ts", "rs", "java", "go", "kt", "cpp", "cs", "rb", "php", "swift", "yaml",
            "tf", "cls",
        ] {
            assert!(
                registry.get_by_extension(ext).is_some(),
                "no extractor for extension {ext}"
            );
        }
    }
}
