//! `RoamConfig` — every tunable the system needs, enumerated
//! explicitly. This replaces the dynamic-attribute config bag the
//! original tool exposed (see DESIGN.md's Open Question decision) with
//! a fixed record: every option a caller can set has a name, type, and
//! default here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoamConfig {
    /// Glob patterns excluded from discovery in addition to the fixed
    /// skip-dirs/skip-names/skip-extensions lists.
    pub exclude_patterns: Vec<String>,
    /// Hash algorithm used for change detection.
    pub hash_algorithm: HashAlgorithm,
    /// Maximum file size considered during discovery, in bytes.
    pub max_file_size_bytes: u64,
    /// Maximum recursion depth for spectral (Fiedler) bisection.
    pub max_spectral_depth: u32,
    /// PageRank damping factor.
    pub pagerank_damping: f64,
    /// Maximum files a single commit may touch and still contribute to
    /// co-change hyperedges.
    pub cochange_max_files: usize,
    /// Context-propagation blend weight between propagation score and
    /// normalized PageRank (`alpha * propagation + (1 - alpha) * pagerank`).
    pub propagation_alpha: f64,
    /// Context-propagation decay applied per BFS hop along callee edges.
    pub propagation_decay: f64,
    /// Extra module paths to load plugin extractors/detectors/bridges
    /// from, appended to `ROAM_PLUGIN_MODULES`.
    pub plugin_modules: Vec<String>,
    /// Roots participating in a multi-repo workspace overlay.
    pub workspace_roots: Vec<PathBuf>,
    /// Betweenness/closeness sampling pivot cap.
    pub centrality_sample_k: usize,
    /// Minimum co-change count before a file pair is eligible for
    /// dark-matter scoring.
    pub dark_matter_min_cochanges: i64,
    /// Minimum normalized PMI before a dark-matter pair is reported.
    pub dark_matter_min_npmi: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    Sha256,
    Blake3,
}

impl Default for RoamConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Vec::new(),
            hash_algorithm: HashAlgorithm::Sha256,
            max_file_size_bytes: 1_000_000,
            max_spectral_depth: 4,
            pagerank_damping: 0.85,
            cochange_max_files: 20,
            propagation_alpha: 0.6,
            propagation_decay: 0.5,
            plugin_modules: Vec::new(),
            workspace_roots: Vec::new(),
            centrality_sample_k: 500,
            dark_matter_min_cochanges: 3,
            dark_matter_min_npmi: 0.3,
        }
    }
}

impl RoamConfig {
    pub fn load_from_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Merge `ROAM_PLUGIN_MODULES` (comma-separated) into
    /// `plugin_modules`, the environment-variable plugin discovery
    /// mechanism.
    pub fn with_env_plugin_modules(mut self) -> Self {
        if let Ok(val) = std::env::var("ROAM_PLUGIN_MODULES") {
            for module in val.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.plugin_modules.iter().any(|m| m == module) {
                    self.plugin_modules.push(module.to_string());
                }
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_locked_in_formulas() {
        let cfg = RoamConfig::default();
        assert_eq!(cfg.pagerank_damping, 0.85);
        assert_eq!(cfg.propagation_alpha, 0.6);
        assert_eq!(cfg.propagation_decay, 0.5);
        assert_eq!(cfg.centrality_sample_k, 500);
        assert_eq!(cfg.cochange_max_files, 20);
    }

    #[test]
    fn yaml_roundtrips() {
        let cfg = RoamConfig::default();
        let yaml = cfg.to_yaml().unwrap();
        let back = RoamConfig::load_from_str(&yaml).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: RoamConfig = RoamConfig::load_from_str("pagerank_damping: 0.5\n").unwrap();
        assert_eq!(cfg.pagerank_damping, 0.5);
        assert_eq!(cfg.propagation_alpha, 0.6);
    }

    #[test]
    fn env_plugin_modules_merge_without_duplicates() {
        std::env::set_var("ROAM_PLUGIN_MODULES", "foo,bar, foo");
        let cfg = RoamConfig::default().with_env_plugin_modules();
        assert_eq!(cfg.plugin_modules, vec!["foo".to_string(), "bar".to_string()]);
        std::env::remove_var("ROAM_PLUGIN_MODULES");
    }
}
