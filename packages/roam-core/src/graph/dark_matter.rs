//! Dark-matter detection: files that co-change constantly but share no
//! structural edge, plus a hypothesis engine that guesses why.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use roam_storage::{FileId, Result as StorageResult, Store};

/// One co-changing, structurally-disconnected file pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DarkMatterEdge {
    pub file_id_a: FileId,
    pub file_id_b: FileId,
    pub path_a: String,
    pub path_b: String,
    pub npmi: f64,
    pub lift: f64,
    pub strength: f64,
    pub cochange_count: i64,
}

/// Normalized pointwise mutual information, range `[-1, 1]`. `-1.0` is
/// returned for any zero probability rather than `NaN`/`-inf` so
/// callers can threshold without special-casing.
fn npmi(p_ab: f64, p_a: f64, p_b: f64) -> f64 {
    if p_ab <= 0.0 || p_a <= 0.0 || p_b <= 0.0 {
        return -1.0;
    }
    let pmi = (p_ab / (p_a * p_b)).ln();
    let neg_log_pab = -p_ab.ln();
    if neg_log_pab == 0.0 {
        return 1.0;
    }
    pmi / neg_log_pab
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Co-changing file pairs with no structural dependency, sorted by
/// NPMI descending.
pub fn dark_matter_edges(
    store: &Store,
    min_cochanges: i64,
    min_npmi: f64,
) -> StorageResult<Vec<DarkMatterEdge>> {
    let total_commits = store.commit_count()?;

    let file_commits: HashMap<FileId, i64> = store
        .all_file_stats()?
        .into_iter()
        .map(|fs| (fs.file_id, fs.commit_count.max(1)))
        .collect();

    let structural: HashSet<(FileId, FileId)> = store
        .all_file_edges()?
        .into_iter()
        .filter(|e| e.symbol_count >= 1)
        .flat_map(|e| [(e.source_file_id, e.target_file_id), (e.target_file_id, e.source_file_id)])
        .collect();

    let id_to_path: HashMap<FileId, String> =
        store.list_files()?.into_iter().map(|f| (f.id, f.path)).collect();

    let mut out = Vec::new();
    for pair in store.cochange_pairs(min_cochanges)? {
        let (fid_a, fid_b) = (pair.file_id_a, pair.file_id_b);
        if structural.contains(&(fid_a, fid_b)) {
            continue;
        }
        let cochanges = pair.cochange_count;
        let ca = file_commits.get(&fid_a).copied().unwrap_or(1);
        let cb = file_commits.get(&fid_b).copied().unwrap_or(1);

        let p_ab = cochanges as f64 / total_commits as f64;
        let p_a = ca as f64 / total_commits as f64;
        let p_b = cb as f64 / total_commits as f64;
        let value = npmi(p_ab, p_a, p_b);
        if value < min_npmi {
            continue;
        }

        let avg = (ca + cb) as f64 / 2.0;
        let strength = if avg > 0.0 { cochanges as f64 / avg } else { 0.0 };
        let lift = (cochanges as f64 * total_commits as f64) / (ca * cb).max(1) as f64;

        out.push(DarkMatterEdge {
            file_id_a: fid_a,
            file_id_b: fid_b,
            path_a: id_to_path.get(&fid_a).cloned().unwrap_or_else(|| format!("file_id={fid_a}")),
            path_b: id_to_path.get(&fid_b).cloned().unwrap_or_else(|| format!("file_id={fid_b}")),
            npmi: round3(value),
            lift: round2(lift),
            strength: round2(strength),
            cochange_count: cochanges,
        });
    }
    out.sort_by(|a, b| b.npmi.partial_cmp(&a.npmi).unwrap());
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypothesisCategory {
    SharedDb,
    EventBus,
    SharedConfig,
    SharedApi,
    TextSimilarity,
    Unknown,
}

impl HypothesisCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HypothesisCategory::SharedDb => "SHARED_DB",
            HypothesisCategory::EventBus => "EVENT_BUS",
            HypothesisCategory::SharedConfig => "SHARED_CONFIG",
            HypothesisCategory::SharedApi => "SHARED_API",
            HypothesisCategory::TextSimilarity => "TEXT_SIMILARITY",
            HypothesisCategory::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub category: HypothesisCategory,
    pub detail: String,
    pub confidence: f64,
}

/// Reads the two files in a dark-matter pair and guesses, via a chain
/// of regex fingerprints, why they move together despite having no
/// structural edge. Checked in the strict priority order the category
/// confidences imply: a shared table always outranks a shared config
/// key even when both patterns are present.
pub struct HypothesisEngine {
    root: std::path::PathBuf,
    cache: std::cell::RefCell<HashMap<String, String>>,
    re_table: Regex,
    re_event_emit: Regex,
    re_event_sub: Regex,
    re_config: Regex,
    re_api: Regex,
}

const READ_LIMIT: usize = 5000;

impl HypothesisEngine {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: std::cell::RefCell::new(HashMap::new()),
            re_table: Regex::new(r#"(?i)\b(?:FROM|JOIN|INTO|UPDATE|TABLE)\s+[`"']?(\w+)"#).unwrap(),
            re_event_emit: Regex::new(r#"\.\s*(?:emit|dispatch|publish)\s*\(\s*["']([^"']+)["']"#).unwrap(),
            re_event_sub: Regex::new(r#"\.\s*(?:on|subscribe|addEventListener)\s*\(\s*["']([^"']+)["']"#).unwrap(),
            re_config: Regex::new(r#"(?i)(?:os\.environ|getenv|process\.env|config\.get)\s*[\[(]\s*["']([^"']+)["']"#).unwrap(),
            re_api: Regex::new(r#"["'](/api/[^"']+)["']"#).unwrap(),
        }
    }

    fn read(&self, rel_path: &str) -> String {
        if let Some(cached) = self.cache.borrow().get(rel_path) {
            return cached.clone();
        }
        let text = std::fs::read_to_string(self.root.join(Path::new(rel_path)))
            .map(|s| s.chars().take(READ_LIMIT).collect::<String>())
            .unwrap_or_default();
        self.cache.borrow_mut().insert(rel_path.to_string(), text.clone());
        text
    }

    fn captures<'a>(re: &Regex, text: &'a str) -> HashSet<&'a str> {
        re.captures_iter(text).filter_map(|c| c.get(1)).map(|m| m.as_str()).collect()
    }

    pub fn hypothesize(&self, path_a: &str, path_b: &str) -> Hypothesis {
        let text_a = self.read(path_a);
        let text_b = self.read(path_b);
        if text_a.is_empty() && text_b.is_empty() {
            return Hypothesis {
                category: HypothesisCategory::Unknown,
                detail: "files not readable".into(),
                confidence: 0.3,
            };
        }

        let tables_a = Self::captures(&self.re_table, &text_a);
        let tables_b = Self::captures(&self.re_table, &text_b);
        let shared_tables = joined_sorted(&tables_a, &tables_b);
        if let Some(names) = shared_tables {
            return Hypothesis {
                category: HypothesisCategory::SharedDb,
                detail: format!("both reference table(s): {names}"),
                confidence: 0.8,
            };
        }

        let emits_a = Self::captures(&self.re_event_emit, &text_a);
        let subs_a = Self::captures(&self.re_event_sub, &text_a);
        let emits_b = Self::captures(&self.re_event_emit, &text_b);
        let subs_b = Self::captures(&self.re_event_sub, &text_b);
        let shared_events = union_joined(&joined_intersection(&emits_a, &subs_b), &joined_intersection(&emits_b, &subs_a));
        if let Some(names) = shared_events {
            return Hypothesis {
                category: HypothesisCategory::EventBus,
                detail: format!("emit/subscribe event(s): {names}"),
                confidence: 0.7,
            };
        }

        let cfg_a = Self::captures(&self.re_config, &text_a);
        let cfg_b = Self::captures(&self.re_config, &text_b);
        if let Some(names) = joined_sorted(&cfg_a, &cfg_b) {
            return Hypothesis {
                category: HypothesisCategory::SharedConfig,
                detail: format!("shared config key(s): {names}"),
                confidence: 0.6,
            };
        }

        let apis_a = Self::captures(&self.re_api, &text_a);
        let apis_b = Self::captures(&self.re_api, &text_b);
        if let Some(names) = joined_sorted(&apis_a, &apis_b) {
            return Hypothesis {
                category: HypothesisCategory::SharedApi,
                detail: format!("shared API endpoint(s): {names}"),
                confidence: 0.6,
            };
        }

        if !text_a.is_empty() && !text_b.is_empty() {
            let ratio = text_similarity_ratio(&text_a, &text_b);
            if ratio >= 0.6 {
                return Hypothesis {
                    category: HypothesisCategory::TextSimilarity,
                    detail: format!("text similarity {:.0}%", ratio * 100.0),
                    confidence: 0.5,
                };
            }
        }

        Hypothesis { category: HypothesisCategory::Unknown, detail: "no pattern detected".into(), confidence: 0.3 }
    }

    pub fn classify_all(&self, edges: &[DarkMatterEdge]) -> Vec<(DarkMatterEdge, Hypothesis)> {
        edges.iter().map(|e| (e.clone(), self.hypothesize(&e.path_a, &e.path_b))).collect()
    }
}

fn joined_sorted(a: &HashSet<&str>, b: &HashSet<&str>) -> Option<String> {
    let mut shared: Vec<&str> = a.intersection(b).copied().collect();
    if shared.is_empty() {
        return None;
    }
    shared.sort_unstable();
    shared.truncate(3);
    Some(shared.join(", "))
}

fn joined_intersection(a: &HashSet<&str>, b: &HashSet<&str>) -> HashSet<String> {
    a.intersection(b).map(|s| s.to_string()).collect()
}

fn union_joined(a: &HashSet<String>, b: &HashSet<String>) -> Option<String> {
    let mut shared: Vec<&str> = a.union(b).map(|s| s.as_str()).collect();
    if shared.is_empty() {
        return None;
    }
    shared.sort_unstable();
    shared.dedup();
    shared.truncate(3);
    Some(shared.join(", "))
}

/// Token-level Dice coefficient, used in place of Python's
/// `difflib.SequenceMatcher.ratio()` since no equivalent crate sits in
/// this workspace's dependency table: splits on whitespace and scores
/// the overlap of the two token multisets.
fn text_similarity_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let mut counts_a: HashMap<&str, usize> = HashMap::new();
    for t in &tokens_a {
        *counts_a.entry(t).or_insert(0) += 1;
    }
    let mut overlap = 0usize;
    let mut counts_b: HashMap<&str, usize> = HashMap::new();
    for t in &tokens_b {
        *counts_b.entry(t).or_insert(0) += 1;
    }
    for (tok, &na) in &counts_a {
        if let Some(&nb) = counts_b.get(tok) {
            overlap += na.min(nb);
        }
    }
    2.0 * overlap as f64 / (tokens_a.len() + tokens_b.len()) as f64
}
