//! Keyword-based expense category classifier.

use std::collections::HashSet;

use crate::models::category::{Category, CategorySet};

/// Result of classifying a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Chosen category name.
    pub category: String,
    /// Number of distinct keywords of that category found.
    pub hits: usize,
    /// The keywords that matched, in configuration order.
    pub matched: Vec<String>,
}

/// Pick the category whose keywords appear most often in the merchant name
/// and item lines.
///
/// Matching is a case-insensitive substring test; each distinct keyword
/// counts once. Ties go to the category configured first, and zero hits
/// yield the set's fallback category. The result depends only on the
/// arguments.
pub fn classify(merchant: &str, items: &[String], categories: &CategorySet) -> Classification {
    let haystack = build_haystack(merchant, items);

    let mut best: Option<(&Category, Vec<String>)> = None;
    for category in categories.categories() {
        let matched = keyword_hits(category, &haystack);
        let better = match &best {
            Some((_, current)) => matched.len() > current.len(),
            None => !matched.is_empty(),
        };
        if better {
            best = Some((category, matched));
        }
    }

    match best {
        Some((category, matched)) => Classification {
            category: category.name.clone(),
            hits: matched.len(),
            matched,
        },
        None => Classification {
            category: categories.fallback().to_string(),
            hits: 0,
            matched: Vec::new(),
        },
    }
}

/// Keywords of `category` that occur in an already lower-cased haystack.
pub fn keyword_hits(category: &Category, haystack: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    category
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.clone()))
        .filter(|k| haystack.contains(k.as_str()))
        .collect()
}

fn build_haystack(merchant: &str, items: &[String]) -> String {
    // Newlines keep a keyword from matching across two fields
    std::iter::once(merchant)
        .chain(items.iter().map(String::as_str))
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("\n")
}
