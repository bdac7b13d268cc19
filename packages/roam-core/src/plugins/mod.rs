//! Plugin registry: the extension surface commands, detectors,
//! language extractors, and cross-language bridges register onto,
//! with duplicate/empty-name validation on every `register_*` call.
//!
//! Dynamic discovery by importing a module path at runtime (from
//! `ROAM_PLUGIN_MODULES`) or a packaging entry point has no safe
//! equivalent without `dlopen`-style dynamic loading, which isn't in
//! this stack. `discover` instead resolves `RoamConfig.plugin_modules`
//! names against a compile-time table of `PluginInit` functions the
//! embedding binary supplies — the same "named module -> init
//! function" shape, minus the dynamic import.

pub mod bridge;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RoamConfig;
use crate::parsing::extractor::LanguageExtractor;

/// `(module_path, attr_name)`, kept for parity with the Python
/// original's registration shape. This crate's built-in commands are
/// compiled in and dispatched directly; a plugin command is recorded
/// here for `command::CommandRunner` to look up by name, not invoked
/// through this tuple.
pub type CommandTarget = (String, String);

pub type DetectorFn = Arc<dyn Fn(&roam_storage::Store) -> Vec<serde_json::Value> + Send + Sync>;
pub type ExtractorFactory = Arc<dyn Fn() -> Arc<dyn LanguageExtractor> + Send + Sync>;

fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        None
    } else if trimmed.starts_with('.') {
        Some(trimmed)
    } else {
        Some(format!(".{trimmed}"))
    }
}

/// Registration surface exposed to a plugin's init function, plus the
/// accumulated state and discovery errors `discover` produces.
#[derive(Default)]
pub struct PluginRegistry {
    commands: HashMap<String, CommandTarget>,
    detectors: Vec<(String, String, DetectorFn)>,
    language_extractors: HashMap<String, ExtractorFactory>,
    language_extensions: HashMap<String, String>,
    bridges: bridge::BridgeRegistry,
    errors: Vec<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(&mut self, name: &str, module_path: &str, attr_name: &str) -> Result<(), String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("command name must be non-empty".to_string());
        }
        if module_path.trim().is_empty() {
            return Err("module_path must be non-empty".to_string());
        }
        if attr_name.trim().is_empty() {
            return Err("attr_name must be non-empty".to_string());
        }
        if self.commands.contains_key(name) {
            return Err(format!("duplicate plugin command: {name}"));
        }
        self.commands.insert(name.to_string(), (module_path.trim().to_string(), attr_name.trim().to_string()));
        Ok(())
    }

    pub fn register_detector(&mut self, task_id: &str, way_id: &str, detect_fn: DetectorFn) -> Result<(), String> {
        if task_id.trim().is_empty() {
            return Err("task_id must be non-empty".to_string());
        }
        if way_id.trim().is_empty() {
            return Err("way_id must be non-empty".to_string());
        }
        self.detectors.push((task_id.trim().to_string(), way_id.trim().to_string(), detect_fn));
        Ok(())
    }

    pub fn register_language_extractor(
        &mut self,
        language: &str,
        factory: ExtractorFactory,
        extensions: &[&str],
    ) -> Result<(), String> {
        let lang = language.trim().to_ascii_lowercase();
        if lang.is_empty() {
            return Err("language must be non-empty".to_string());
        }
        self.language_extractors.insert(lang.clone(), factory);
        for ext in extensions {
            if let Some(norm) = normalize_extension(ext) {
                self.language_extensions.insert(norm, lang.clone());
            }
        }
        Ok(())
    }

    pub fn register_bridge(&mut self, bridge: Arc<dyn bridge::LanguageBridge>) {
        self.bridges.register(bridge);
    }

    pub fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn commands(&self) -> &HashMap<String, CommandTarget> {
        &self.commands
    }

    pub fn detectors(&self) -> &[(String, String, DetectorFn)] {
        &self.detectors
    }

    pub fn language_extractors(&self) -> &HashMap<String, ExtractorFactory> {
        &self.language_extractors
    }

    pub fn language_extensions(&self) -> &HashMap<String, String> {
        &self.language_extensions
    }

    pub fn bridges(&self) -> &bridge::BridgeRegistry {
        &self.bridges
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// One plugin module's init function, keyed by the name callers put
/// in `RoamConfig.plugin_modules`.
pub type PluginInit = fn(&mut PluginRegistry);

/// Resolve every name in `config.plugin_modules` against `known` and
/// run its init function. A name with no match is recorded as a
/// discovery error rather than aborting the rest, so one bad entry in
/// `plugin_modules` can't take down every other plugin.
pub fn discover(config: &RoamConfig, known: &[(&str, PluginInit)]) -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    for module_name in &config.plugin_modules {
        match known.iter().find(|(name, _)| name == module_name) {
            Some((_, init)) => init(&mut registry),
            None => registry.record_error(format!("module:{module_name}: not found in the compiled-in plugin table")),
        }
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_init(api: &mut PluginRegistry) {
        api.register_command("hello-plugin", "roam_test_plugin", "hello_plugin").unwrap();
        api.register_detector("plugin-task", "naive", Arc::new(|_store| Vec::new())).unwrap();
    }

    #[test]
    fn discover_runs_known_modules_named_in_config() {
        let config = RoamConfig { plugin_modules: vec!["roam_test_plugin".to_string()], ..RoamConfig::default() };
        let registry = discover(&config, &[("roam_test_plugin", stub_init as PluginInit)]);
        assert!(registry.commands().contains_key("hello-plugin"));
        assert_eq!(registry.detectors().len(), 1);
        assert!(registry.errors().is_empty());
    }

    #[test]
    fn discover_records_an_error_for_an_unknown_module_name() {
        let config = RoamConfig { plugin_modules: vec!["does_not_exist".to_string()], ..RoamConfig::default() };
        let registry = discover(&config, &[]);
        assert_eq!(registry.errors().len(), 1);
        assert!(registry.errors()[0].contains("does_not_exist"));
    }

    #[test]
    fn duplicate_command_names_are_rejected() {
        let mut registry = PluginRegistry::new();
        registry.register_command("dup", "mod", "attr").unwrap();
        let err = registry.register_command("dup", "mod2", "attr2").unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn extension_normalization_adds_a_leading_dot() {
        let mut registry = PluginRegistry::new();
        registry.register_language_extractor("mini", Arc::new(|| unreachable!()), &["mini"]).unwrap();
        assert_eq!(registry.language_extensions().get(".mini").map(String::as_str), Some("mini"));
    }
}
