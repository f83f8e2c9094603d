use crate::config::CategoryKeywords;
use crate::models::UNCATEGORIZED;

/// Keyword-overlap classifier.
///
/// Each category scores one point per keyword phrase that occurs anywhere in
/// the text. The highest score wins; on a tie the category declared first
/// wins. This tie-break is deterministic but carries no meaning beyond
/// declaration order.
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: Vec<CategoryKeywords>,
}

impl Classifier {
    pub fn new(categories: Vec<CategoryKeywords>) -> Self {
        let categories = categories
            .into_iter()
            .map(|c| CategoryKeywords {
                name: c.name,
                keywords: c.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { categories }
    }

    /// Per-category scores, in declaration order.
    pub fn scores<'a>(&'a self, text: &str) -> Vec<(&'a str, usize)> {
        self.categories
            .iter()
            .map(|c| {
                let hits = c
                    .keywords
                    .iter()
                    .filter(|kw| !kw.is_empty() && text.contains(kw.as_str()))
                    .count();
                (c.name.as_str(), hits)
            })
            .collect()
    }

    /// Map normalized (lowercase) text to a category label.
    pub fn classify(&self, text: &str) -> String {
        let mut best: Option<(&str, usize)> = None;
        for (name, score) in self.scores(text) {
            // strict > keeps the first maximal category
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((name, score));
            }
        }
        best.map(|(name, _)| name.to_string())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(crate::config::default_categories())
    }
}
