//! SARIF 2.1.0 output for rule/gate commands: `tool.driver.name`/
//! `rules`, `results[].ruleId|level|message.text`, and
//! `automationDetails.id` for run correlation. The CI guard script
//! that would consume this document is out of scope; only the
//! document shape it expects is built here.

use serde_json::{json, Value};

pub const SARIF_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
pub const SARIF_VERSION: &str = "2.1.0";
const TOOL_NAME: &str = "roam-code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SarifLevel {
    Error,
    Warning,
    Note,
}

impl SarifLevel {
    fn as_str(&self) -> &'static str {
        match self {
            SarifLevel::Error => "error",
            SarifLevel::Warning => "warning",
            SarifLevel::Note => "note",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SarifRule {
    pub id: String,
    pub short_description: String,
}

#[derive(Debug, Clone)]
pub struct SarifResult {
    pub rule_id: String,
    pub level: SarifLevel,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<i64>,
}

impl SarifResult {
    fn to_value(&self) -> Value {
        let locations = match &self.file {
            Some(file) => {
                let mut physical = json!({ "artifactLocation": { "uri": file } });
                if let Some(line) = self.line {
                    physical["region"] = json!({ "startLine": line });
                }
                vec![json!({ "physicalLocation": physical })]
            }
            None => Vec::new(),
        };
        json!({
            "ruleId": self.rule_id,
            "level": self.level.as_str(),
            "message": { "text": self.message },
            "locations": locations,
        })
    }
}

/// One `runs[]` entry: a rule set plus the results a single command
/// produced against it, identified for CI log aggregators by
/// `automation_id` (e.g. `"roam/health"`, `"roam/dead"`).
pub struct SarifRun {
    pub automation_id: String,
    pub rules: Vec<SarifRule>,
    pub results: Vec<SarifResult>,
}

impl SarifRun {
    pub fn to_value(&self) -> Value {
        let rules: Vec<Value> = self
            .rules
            .iter()
            .map(|r| json!({ "id": r.id, "shortDescription": { "text": r.short_description } }))
            .collect();
        let results: Vec<Value> = self.results.iter().map(SarifResult::to_value).collect();
        json!({
            "tool": { "driver": { "name": TOOL_NAME, "rules": rules } },
            "results": results,
            "automationDetails": { "id": self.automation_id },
        })
    }
}

/// Render one or more runs into a top-level SARIF 2.1.0 document.
pub fn render(runs: &[SarifRun]) -> Value {
    json!({
        "$schema": SARIF_SCHEMA_URL,
        "version": SARIF_VERSION,
        "runs": runs.iter().map(SarifRun::to_value).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_result_with_a_physical_location() {
        let run = SarifRun {
            automation_id: "roam/health".into(),
            rules: vec![SarifRule { id: "health/bottleneck".into(), short_description: "Structural bottleneck".into() }],
            results: vec![SarifResult {
                rule_id: "health/bottleneck".into(),
                level: SarifLevel::Warning,
                message: "high debt score".into(),
                file: Some("src/lib.rs".into()),
                line: Some(42),
            }],
        };
        let doc = render(&[run]);
        assert_eq!(doc["version"], "2.1.0");
        assert_eq!(doc["runs"][0]["automationDetails"]["id"], "roam/health");
        assert_eq!(doc["runs"][0]["results"][0]["locations"][0]["physicalLocation"]["region"]["startLine"], 42);
    }

    #[test]
    fn result_without_a_file_has_no_locations() {
        let run = SarifRun {
            automation_id: "roam/dead".into(),
            rules: vec![],
            results: vec![SarifResult {
                rule_id: "dead/export".into(),
                level: SarifLevel::Note,
                message: "unreferenced export".into(),
                file: None,
                line: None,
            }],
        };
        let doc = render(&[run]);
        assert!(doc["runs"][0]["results"][0]["locations"].as_array().unwrap().is_empty());
    }
}
