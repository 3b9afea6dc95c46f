//! Navigation and sidebar trees.
//!
//! Nodes are authored in `folio.toml` as nested tables. A node with
//! `structure = "dir/"` gets its items generated from the articles under
//! that directory. Assembly resolves internal links to page routes and
//! attaches a base-prefixed `href` to every linked node.

use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::with_base;
use crate::links::{RouteTable, is_external};
use crate::site::{Article, url_path};

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct NavNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<NavNode>,
    /// Directory under the docs root whose articles become `items`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl NavNode {
    pub fn leaf(text: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: Some(link.into()),
            ..Default::default()
        }
    }
}

pub struct NavAssembler<'a> {
    articles: &'a [Article],
    routes: &'a RouteTable,
    base: &'a str,
}

impl<'a> NavAssembler<'a> {
    pub fn new(articles: &'a [Article], routes: &'a RouteTable, base: &'a str) -> Self {
        Self {
            articles,
            routes,
            base,
        }
    }

    pub fn assemble(&self, nodes: &[NavNode]) -> Vec<NavNode> {
        nodes.iter().map(|node| self.assemble_node(node)).collect()
    }

    fn assemble_node(&self, node: &NavNode) -> NavNode {
        let mut node = node.clone();

        if let Some(dir) = node.structure.take() {
            let dir = dir.trim_matches('/').to_string();
            if node.link.is_none() {
                node.link = self.index_of(&dir).map(|a| a.route.clone());
            }
            node.items = self.structure(&dir);
        }

        node.items = self.assemble(&node.items);

        if let Some(link) = node.link.take() {
            let (link, href) = self.resolve(link);
            node.link = Some(link);
            node.href = Some(href);
        }
        node
    }

    /// Normalize an authored link and compute its `href`.
    fn resolve(&self, link: String) -> (String, String) {
        if is_external(&link) {
            return (link.clone(), link);
        }
        match self.routes.route(&link, "/") {
            Some(route) => {
                let fragment = link.find('#').map(|i| &link[i..]).unwrap_or_default();
                let href = format!("{}{}", with_base(self.base, route), fragment);
                (route.to_string(), href)
            }
            None => {
                let href = if link.starts_with('/') {
                    with_base(self.base, &link)
                } else {
                    link.clone()
                };
                (link, href)
            }
        }
    }

    fn index_of(&self, dir: &str) -> Option<&'a Article> {
        self.articles
            .iter()
            .find(|a| a.is_index() && parent_dir(&url_path(&a.path)) == dir)
    }

    /// Items for every article and sub-directory directly under `dir`.
    fn structure(&self, dir: &str) -> Vec<NavNode> {
        let mut entries: Vec<(SortKey, NavNode)> = Vec::new();
        let mut subdirs: Vec<String> = Vec::new();

        for article in self.articles {
            let path = url_path(&article.path);
            let parent = parent_dir(&path);

            if parent == dir {
                if !article.is_index() {
                    let leaf = NavNode::leaf(&article.title, &article.route);
                    entries.push((SortKey::of(Some(article)), leaf));
                }
                continue;
            }

            let inside = dir.is_empty() || parent.starts_with(&format!("{dir}/"));
            if !inside {
                continue;
            }
            let rest = if dir.is_empty() { parent } else { &parent[dir.len() + 1..] };
            let child = rest.split('/').next().unwrap_or_default();
            let child = if dir.is_empty() { child.to_string() } else { format!("{dir}/{child}") };
            if !subdirs.contains(&child) {
                subdirs.push(child);
            }
        }

        for subdir in subdirs {
            let index = self.index_of(&subdir);
            let text = index
                .map(|a| a.title.clone())
                .unwrap_or_else(|| subdir.rsplit('/').next().unwrap_or_default().to_string());
            let node = NavNode {
                text,
                link: index.map(|a| a.route.clone()),
                items: self.structure(&subdir),
                ..Default::default()
            };
            entries.push((SortKey::of(index), node));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.text.cmp(&b.1.text)));
        entries.into_iter().map(|(_, node)| node).collect()
    }
}

/// `order` ascending with unordered last, then newest first.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    unordered: bool,
    order: i64,
    date: Reverse<Option<NaiveDate>>,
}

impl SortKey {
    fn of(article: Option<&Article>) -> Self {
        let fm = article.map(|a| &a.front_matter);
        let order = fm.and_then(|fm| fm.order);
        SortKey {
            unordered: order.is_none(),
            order: order.unwrap_or_default(),
            date: Reverse(fm.and_then(|fm| fm.date)),
        }
    }
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Linked nodes in reading order, used for previous/next links.
pub fn flatten(nodes: &[NavNode]) -> Vec<&NavNode> {
    let mut out: Vec<&NavNode> = Vec::new();
    for node in nodes {
        if let Some(link) = &node.link {
            if !is_external(link) && !out.iter().any(|n| n.link.as_ref() == Some(link)) {
                out.push(node);
            }
        }
        for child in flatten(&node.items) {
            if !out.iter().any(|n| n.link == child.link) {
                out.push(child);
            }
        }
    }
    out
}

/// Previous and next linked nodes around `route`.
pub fn neighbours<'n>(
    flat: &[&'n NavNode],
    route: &str,
) -> (Option<&'n NavNode>, Option<&'n NavNode>) {
    let Some(i) = flat.iter().position(|n| n.link.as_deref() == Some(route)) else {
        return (None, None);
    };
    let prev = i.checked_sub(1).map(|p| flat[p]);
    let next = flat.get(i + 1).copied();
    (prev, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(
        path: &str,
        title: &str,
        order: Option<i64>,
        date: Option<(i32, u32, u32)>,
    ) -> Article {
        let mut article = Article::stub(path);
        article.title = title.into();
        article.front_matter.order = order;
        article.front_matter.date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        article
    }

    fn articles() -> Vec<Article> {
        vec![
            dated("index.md", "Home", None, None),
            dated("articles/index.md", "Articles", None, None),
            dated("articles/old.md", "Old", None, Some((2023, 1, 1))),
            dated("articles/new.md", "New", None, Some((2024, 6, 1))),
            dated("articles/pinned.md", "Pinned", Some(1), None),
            dated("articles/ansible/index.md", "Ansible", Some(2), None),
            dated("articles/ansible/lineinfile.md", "Lineinfile", None, None),
        ]
    }

    #[test]
    fn test_structure_expansion() {
        let articles = articles();
        let routes = RouteTable::new(&articles, Vec::new());
        let assembler = NavAssembler::new(&articles, &routes, "/qa/");

        let sidebar = assembler.assemble(&[NavNode {
            text: "Articles".into(),
            icon: Some("laptop-code".into()),
            structure: Some("articles/".into()),
            ..Default::default()
        }]);

        let root = &sidebar[0];
        assert_eq!(root.link.as_deref(), Some("/articles/"));
        assert_eq!(root.href.as_deref(), Some("/qa/articles/"));
        assert!(root.structure.is_none());

        let texts: Vec<&str> = root.items.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["Pinned", "Ansible", "New", "Old"]);

        let ansible = &root.items[1];
        assert_eq!(ansible.link.as_deref(), Some("/articles/ansible/"));
        assert_eq!(ansible.items[0].href.as_deref(), Some("/qa/articles/ansible/lineinfile.html"));
    }

    #[test]
    fn test_authored_links() {
        let articles = articles();
        let routes = RouteTable::new(&articles, Vec::new());
        let assembler = NavAssembler::new(&articles, &routes, "/");

        let nav = assembler.assemble(&[
            NavNode::leaf("Old", "/articles/old.md"),
            NavNode::leaf("GitHub", "https://github.com/dorin"),
            NavNode::leaf("Gone", "/gone"),
        ]);
        assert_eq!(nav[0].link.as_deref(), Some("/articles/old.html"));
        assert_eq!(nav[0].href.as_deref(), Some("/articles/old.html"));
        assert_eq!(nav[1].href.as_deref(), Some("https://github.com/dorin"));
        assert_eq!(nav[2].href.as_deref(), Some("/gone"));
    }

    #[test]
    fn test_neighbours() {
        let nodes = vec![
            NavNode::leaf("A", "/a.html"),
            NavNode {
                text: "Group".into(),
                items: vec![NavNode::leaf("B", "/b.html"), NavNode::leaf("A again", "/a.html")],
                ..Default::default()
            },
            NavNode::leaf("C", "/c.html"),
        ];
        let flat = flatten(&nodes);
        assert_eq!(flat.len(), 3);

        let (prev, next) = neighbours(&flat, "/b.html");
        assert_eq!(prev.map(|n| n.text.as_str()), Some("A"));
        assert_eq!(next.map(|n| n.text.as_str()), Some("C"));
        assert_eq!(neighbours(&flat, "/missing.html"), (None, None));
    }
}
