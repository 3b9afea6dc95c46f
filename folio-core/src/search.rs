//! Local search index consumed by the theme's `search.js`.

use serde::Serialize;

use crate::config::with_base;
use crate::site::Article;

pub const SEARCH_INDEX: &str = "assets/search-index.json";
pub const SEARCH_SCRIPT: &str = "assets/search.js";

#[derive(Debug, Serialize, PartialEq)]
pub struct SearchEntry {
    pub title: String,
    pub href: String,
    pub headers: Vec<String>,
    pub text: String,
}

/// One entry per article in route order.
pub fn search_entries(articles: &[Article], base: &str) -> Vec<SearchEntry> {
    let mut entries: Vec<SearchEntry> = articles
        .iter()
        .map(|article| SearchEntry {
            title: article.title.clone(),
            href: with_base(base, &article.route),
            headers: article.headers.iter().map(|h| h.title.clone()).collect(),
            text: collapse_whitespace(&article.text),
        })
        .collect();
    entries.sort_by(|a, b| a.href.cmp(&b.href));
    entries
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
