//! The blog index: one entry per post under the blog directory.

use std::cmp::Reverse;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::with_base;
use crate::frontmatter::Series;
use crate::site::{Article, url_path};

/// File name of the index, relative to the output dir.
pub const BLOG_INDEX: &str = "blog-index.json";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlogEntry {
    pub title: String,
    pub date: Option<NaiveDate>,
    pub category: Vec<String>,
    pub tag: Vec<String>,
    pub series: Option<Series>,
    pub order: Option<i64>,
    pub summary: Option<String>,
    /// Source path without `.md`, e.g. `/articles/foo`.
    pub path: String,
}

impl BlogEntry {
    fn of(article: &Article) -> Self {
        let fm = &article.front_matter;
        let rel = url_path(&article.path);
        let stem = rel.strip_suffix(".md").unwrap_or(&rel);

        Self {
            title: article.title.clone(),
            date: fm.date,
            category: fm.category.clone(),
            tag: fm.tag.clone(),
            series: fm.series.clone(),
            order: fm.order,
            summary: fm.summary.clone().or_else(|| fm.description.clone()),
            path: format!("/{stem}"),
        }
    }
}

/// An entry as handed to templates, with its link resolved.
#[derive(Debug, Serialize)]
pub struct BlogPost<'a> {
    #[serde(flatten)]
    pub entry: &'a BlogEntry,
    pub href: String,
}

/// Posts under `dir`, newest first, ties broken by path.
pub fn blog_entries(articles: &[Article], dir: &str) -> Vec<BlogEntry> {
    let dir = dir.trim_matches('/');
    let prefix = if dir.is_empty() { String::new() } else { format!("{dir}/") };

    let mut entries: Vec<BlogEntry> = articles
        .iter()
        .filter(|a| !a.is_index() && url_path(&a.path).starts_with(&prefix))
        .map(BlogEntry::of)
        .collect();

    entries.sort_by(|a, b| {
        Reverse(a.date)
            .cmp(&Reverse(b.date))
            .then_with(|| a.path.cmp(&b.path))
    });
    entries
}

/// Attach base-prefixed page links for templates.
pub fn blog_posts<'a>(
    entries: &'a [BlogEntry],
    articles: &[Article],
    base: &str,
) -> Vec<BlogPost<'a>> {
    entries
        .iter()
        .map(|entry| {
            let route = articles
                .iter()
                .find(|a| {
                    let rel = url_path(&a.path);
                    format!("/{}", rel.strip_suffix(".md").unwrap_or(&rel)) == entry.path
                })
                .map(|a| a.route.as_str())
                .unwrap_or(&entry.path);
            BlogPost {
                entry,
                href: with_base(base, route),
            }
        })
        .collect()
}

pub fn write_blog_index(entries: &[BlogEntry], path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)
}
