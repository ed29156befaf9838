//! In-memory library of prior theses and analytical frameworks.

use serde::{Deserialize, Serialize};

/// A persistent prior belief the router can match a query against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThesisPrior {
    pub id: String,
    pub title: String,
    pub domain: String,
    /// Confidence recorded when the thesis was archived
    pub confidence: f64,
    pub summary: String,
    pub tags: Vec<String>,
    /// Falsification conditions, when recorded
    #[serde(default)]
    pub falsification: String,
}

/// A reusable analytical framework (historical analogue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analogue {
    pub id: String,
    pub title: String,
    pub summary: String,
}

/// Keyword-matching registry of priors and analogues.
///
/// Loading from disk is a caller concern; the router only needs search over
/// whatever was registered, and tolerates an empty library.
#[derive(Debug, Clone, Default)]
pub struct PriorLibrary {
    theses: Vec<ThesisPrior>,
    patterns: Vec<Analogue>,
}

impl PriorLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_thesis(&mut self, thesis: ThesisPrior) {
        self.theses.push(thesis);
    }

    pub fn register_pattern(&mut self, pattern: Analogue) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.theses.is_empty() && self.patterns.is_empty()
    }

    /// Keyword search over theses. Title and tag hits weigh double.
    pub fn search_theses(&self, query: &str, limit: usize) -> Vec<&ThesisPrior> {
        let terms = search_terms(query);
        let mut scored: Vec<(usize, &ThesisPrior)> = self
            .theses
            .iter()
            .filter_map(|thesis| {
                let searchable = format!(
                    "{} {} {} {}",
                    thesis.title,
                    thesis.summary,
                    thesis.domain,
                    thesis.tags.join(" ")
                )
                .to_lowercase();
                let title = thesis.title.to_lowercase();

                let mut score = 0;
                for term in &terms {
                    if searchable.contains(term.as_str()) {
                        score += 1;
                    }
                    if title.contains(term.as_str()) {
                        score += 2;
                    }
                    if thesis.tags.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                        score += 2;
                    }
                }
                (score > 0).then_some((score, thesis))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, t)| t).collect()
    }

    /// Keyword search over analogues.
    pub fn search_patterns(&self, query: &str, limit: usize) -> Vec<&Analogue> {
        let terms = search_terms(query);
        let mut scored: Vec<(usize, &Analogue)> = self
            .patterns
            .iter()
            .filter_map(|pattern| {
                let searchable = format!("{} {}", pattern.title, pattern.summary).to_lowercase();
                let score = terms
                    .iter()
                    .filter(|term| searchable.contains(term.as_str()))
                    .count();
                (score > 0).then_some((score, pattern))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, p)| p).collect()
    }

    /// Render matched theses within a token budget (4 chars per token).
    pub fn assemble_thesis_context(&self, theses: &[&ThesisPrior], max_tokens: usize) -> String {
        let char_budget = max_tokens * 4;
        let mut out = String::from("# Relevant Theses\n");

        for thesis in theses {
            let falsification: String = thesis.falsification.chars().take(200).collect();
            let entry = format!(
                "\n## {}\n**Confidence**: {:.0}% | **Domain**: {}\n\n{}\n\n**Falsification**: {}\n",
                thesis.title,
                thesis.confidence * 100.0,
                thesis.domain,
                thesis.summary,
                falsification,
            );
            if out.len() + entry.len() > char_budget {
                break;
            }
            out.push_str(&entry);
        }
        out
    }

    /// Render matched analogues within a token budget.
    pub fn assemble_pattern_context(&self, patterns: &[&Analogue], max_tokens: usize) -> String {
        let char_budget = max_tokens * 4;
        let mut out = String::from("# Analytical Frameworks\n");

        for pattern in patterns {
            let entry = format!("\n## {}\n\n{}\n", pattern.title, pattern.summary);
            if out.len() + entry.len() > char_budget {
                break;
            }
            out.push_str(&entry);
        }
        out
    }
}

fn search_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| term.len() > 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> PriorLibrary {
        let mut library = PriorLibrary::new();
        library.register_thesis(ThesisPrior {
            id: "gpu-moat".to_string(),
            title: "GPU software moats persist".to_string(),
            domain: "semiconductors".to_string(),
            confidence: 0.7,
            summary: "Developer lock-in keeps datacenter share sticky".to_string(),
            tags: vec!["gpu".to_string(), "datacenter".to_string()],
            falsification: "A credible cross-compile path erodes lock-in".to_string(),
        });
        library.register_pattern(Analogue {
            id: "platform-transition".to_string(),
            title: "Platform transition".to_string(),
            summary: "Incumbents stumble when the platform layer shifts".to_string(),
        });
        library
    }

    #[test]
    fn test_thesis_search_scores_title_and_tags_higher() {
        let library = library();
        let hits = library.search_theses("gpu datacenter outlook", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "gpu-moat");

        assert!(library.search_theses("unrelated macro topic", 3).is_empty());
    }

    #[test]
    fn test_pattern_search() {
        let library = library();
        let hits = library.search_patterns("platform shift incumbents", 2);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "platform-transition");
    }

    #[test]
    fn test_empty_library_searches_cleanly() {
        let library = PriorLibrary::new();
        assert!(library.is_empty());
        assert!(library.search_theses("anything", 3).is_empty());
        assert!(library.search_patterns("anything", 3).is_empty());
    }

    #[test]
    fn test_context_assembly_respects_budget() {
        let library = library();
        let hits = library.search_theses("gpu", 3);

        let full = library.assemble_thesis_context(&hits, 1000);
        assert!(full.contains("GPU software moats persist"));

        // Tiny budget keeps only the header.
        let tiny = library.assemble_thesis_context(&hits, 10);
        assert_eq!(tiny, "# Relevant Theses\n");
    }
}
