//! Extractors with no usable tree-sitter grammar in this workspace:
//! YAML (Kubernetes/CI manifests), HCL (Terraform), and Apex
//! (Salesforce triggers/classes). These work directly on source text
//! with `regex` rather than a parse tree, per `ts_language() -> None`.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Tree;

use crate::parsing::extractor::{LanguageExtractor, LanguageId};
use crate::shared::models::{ExtractionResult, SymbolKind, SymbolRecord};
use roam_storage::Visibility;

fn symbol(name: &str, kind: SymbolKind, line: usize) -> SymbolRecord {
    SymbolRecord {
        name: name.to_string(),
        qualified_name: Some(name.to_string()),
        kind,
        signature: None,
        line_start: line as i64,
        line_end: line as i64,
        docstring: None,
        visibility: Visibility::Public,
        is_exported: true,
        parent_name: None,
        default_value: None,
    }
}

pub struct YamlExtractor;

static YAML_TOP_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z0-9_.-]+):").unwrap());
static YAML_KIND: Lazy<Regex> = Lazy::new(|| Regex::new(r"^kind:\s*(\S+)").unwrap());

impl LanguageExtractor for YamlExtractor {
    fn language_id(&self) -> LanguageId {
        LanguageId::Yaml
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn extract_symbols(&self, _tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        for (i, line) in source.lines().enumerate() {
            if let Some(caps) = YAML_KIND.captures(line) {
                out.symbols.push(symbol(&caps[1], SymbolKind::Other, i + 1));
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                if let Some(caps) = YAML_TOP_KEY.captures(line) {
                    out.symbols.push(symbol(&caps[1], SymbolKind::Module, i + 1));
                }
            }
        }
        out
    }
}

pub struct HclExtractor;

static HCL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(resource|module|variable|output|data)\s+"?([A-Za-z0-9_.\-"]+)"?"#).unwrap()
});

impl LanguageExtractor for HclExtractor {
    fn language_id(&self) -> LanguageId {
        LanguageId::Hcl
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["tf", "tfvars", "hcl"]
    }

    fn extract_symbols(&self, _tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        for (i, line) in source.lines().enumerate() {
            if let Some(caps) = HCL_BLOCK.captures(line) {
                let name = format!("{}.{}", &caps[1], caps[2].replace('"', " ").trim().replace(' ', "."));
                out.symbols.push(symbol(&name, SymbolKind::Module, i + 1));
            }
        }
        out
    }
}

pub struct ApexExtractor;

static APEX_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:public|private|global)?\s*(?:with\s+sharing\s+|without\s+sharing\s+)?class\s+(\w+)").unwrap()
});
static APEX_TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btrigger\s+(\w+)\s+on\s+(\w+)\s*\(([^)]*)\)").unwrap());
static APEX_METHOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:public|private|global|protected)\s+(?:static\s+)?(?:void|\w+(?:<[\w, ]+>)?)\s+(\w+)\s*\(")
        .unwrap()
});

impl LanguageExtractor for ApexExtractor {
    fn language_id(&self) -> LanguageId {
        LanguageId::Apex
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cls", "trigger"]
    }

    fn extract_symbols(&self, _tree: Option<&Tree>, source: &str, _file_path: &str) -> ExtractionResult {
        let mut out = ExtractionResult::default();
        for (i, line) in source.lines().enumerate() {
            if let Some(caps) = APEX_TRIGGER.captures(line) {
                let mut sym = symbol(&caps[1], SymbolKind::Trigger, i + 1);
                sym.signature = Some(format!("on {} ({})", &caps[2], caps[3].trim()));
                out.symbols.push(sym);
                continue;
            }
            if let Some(caps) = APEX_CLASS.captures(line) {
                out.symbols.push(symbol(&caps[1], SymbolKind::Class, i + 1));
                continue;
            }
            if let Some(caps) = APEX_METHOD.captures(line) {
                out.symbols.push(symbol(&caps[1], SymbolKind::Method, i + 1));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_extracts_kind_and_top_level_keys() {
        let src = "apiVersion: v1\nkind: Deployment\nmetadata:\n  name: web\n";
        let result = YamlExtractor.extract_symbols(None, src, "deploy.yaml");
        assert!(result.symbols.iter().any(|s| s.name == "Deployment"));
        assert!(result.symbols.iter().any(|s| s.name == "metadata"));
        assert!(!result.symbols.iter().any(|s| s.name == "name"));
    }

    #[test]
    fn hcl_extracts_resource_blocks() {
        let src = "resource \"aws_s3_bucket\" \"data\" {\n  bucket = \"x\"\n}\n";
        let result = HclExtractor.extract_symbols(None, src, "main.tf");
        assert!(result.symbols.iter().any(|s| s.name.contains("aws_s3_bucket")));
    }

    #[test]
    fn apex_extracts_trigger_declaration() {
        let src = "trigger AccountTrigger on Account (before insert, before update) {\n}\n";
        let result = ApexExtractor.extract_symbols(None, src, "AccountTrigger.trigger");
        let sym = result.symbols.iter().find(|s| s.name == "AccountTrigger").unwrap();
        assert_eq!(sym.kind, SymbolKind::Trigger);
        assert!(sym.signature.as_deref().unwrap().contains("Account"));
    }

    #[test]
    fn apex_extracts_class_and_method() {
        let src = "public with sharing class AccountService {\n    public void run() {}\n}\n";
        let result = ApexExtractor.extract_symbols(None, src, "AccountService.cls");
        let kinds: Vec<_> = result.symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert!(kinds.contains(&("AccountService", SymbolKind::Class)));
        assert!(kinds.contains(&("run", SymbolKind::Method)));
    }
}
