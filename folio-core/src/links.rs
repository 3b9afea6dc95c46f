//! Internal link resolution and the dead-link check.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::{Config, DeadLinkPolicy};
use crate::nav::NavNode;
use crate::site::{Article, url_path};

/// True for links with a URL scheme (`https:`, `mailto:`) or protocol-relative links.
pub fn is_external(link: &str) -> bool {
    if link.starts_with("//") {
        return true;
    }
    let Some(colon) = link.find(':') else {
        return false;
    };
    let scheme = &link[..colon];
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// True for absolute URLs pointing at a local development host.
pub fn is_localhost(link: &str) -> bool {
    let Some((_, rest)) = link.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    let host = if host.starts_with('[') {
        host.split_inclusive(']').next().unwrap_or_default()
    } else {
        host.split(':').next().unwrap_or_default()
    };
    matches!(
        host.to_ascii_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "0.0.0.0" | "[::1]"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadReason {
    Missing,
    MissingAnchor,
    Localhost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLink {
    /// Route of the linking page, or `nav` / `sidebar`.
    pub page: String,
    pub link: String,
    pub reason: DeadReason,
}

impl fmt::Display for DeadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            DeadReason::Missing => "no such page",
            DeadReason::MissingAnchor => "no such anchor",
            DeadReason::Localhost => "localhost link",
        };
        write!(f, "{}: {} ({})", self.page, self.link, reason)
    }
}

#[derive(Debug, Default)]
pub struct LinkReport {
    /// Links that fail the build.
    pub dead: Vec<DeadLink>,
    /// Links the policy lets through.
    pub ignored: Vec<DeadLink>,
}

/// Every URL path an internal link may use to reach a page or public file.
#[derive(Debug, Default)]
pub struct RouteTable {
    keys: HashMap<String, String>,
    anchors: HashMap<String, HashSet<String>>,
    files: HashSet<String>,
}

impl RouteTable {
    pub fn new<I>(articles: &[Article], public_files: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut table = RouteTable::default();

        for article in articles {
            let route = article.route.clone();
            let mut keys = vec![route.clone(), format!("/{}", url_path(&article.path))];
            if article.is_index() {
                keys.push(format!("{route}index.html"));
                keys.push(format!("{route}index"));
                let trimmed = route.trim_end_matches('/');
                if !trimmed.is_empty() {
                    keys.push(trimmed.to_string());
                }
            } else if let Some(stem) = route.strip_suffix(".html") {
                keys.push(stem.to_string());
            }

            for key in keys {
                table.keys.entry(key).or_insert_with(|| route.clone());
            }
            table
                .anchors
                .insert(route, article.anchors.iter().cloned().collect());
        }

        table.files = public_files
            .into_iter()
            .map(|f| format!("/{}", f.trim_start_matches('/')))
            .collect();
        table
    }

    /// Route of the page an internal link points at.
    pub fn route(&self, link: &str, from: &str) -> Option<&str> {
        let path = link.split(['?', '#']).next().unwrap_or_default();
        if path.is_empty() {
            return self.keys.get(from).map(String::as_str);
        }
        self.keys.get(&absolutize(&decode(path), from)).map(String::as_str)
    }

    /// Check one internal link written on the page at route `from`.
    pub fn check(&self, link: &str, from: &str) -> Result<(), DeadReason> {
        let (rest, fragment) = match link.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (link, None),
        };
        let path = rest.split('?').next().unwrap_or_default();

        let target = if path.is_empty() {
            Some(from.to_string())
        } else {
            let abs = absolutize(&decode(path), from);
            if self.files.contains(&abs) {
                return Ok(());
            }
            self.keys.get(&abs).cloned()
        };

        let Some(route) = target else {
            return Err(DeadReason::Missing);
        };

        match fragment.filter(|f| !f.is_empty()) {
            Some(fragment) => {
                let known = self
                    .anchors
                    .get(&route)
                    .map(|anchors| anchors.contains(&*decode(fragment)))
                    .unwrap_or(false);
                if known { Ok(()) } else { Err(DeadReason::MissingAnchor) }
            }
            None => Ok(()),
        }
    }
}

/// Percent-decode a link path or fragment. Malformed input is kept as written.
fn decode(part: &str) -> Cow<'_, str> {
    urlencoding::decode(part).unwrap_or(Cow::Borrowed(part))
}

/// Resolve `path` against the directory of route `from`, folding `.` and `..`.
fn absolutize(path: &str, from: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        let dir = match from.rfind('/') {
            Some(i) => &from[..=i],
            None => "/",
        };
        format!("{dir}{path}")
    };

    let trailing = joined.ends_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let mut out = format!("/{}", parts.join("/"));
    if trailing && !parts.is_empty() {
        out.push('/');
    }
    out
}

/// Check article, nav and sidebar links and sort failures by `config.links`.
pub fn check_links(articles: &[Article], config: &Config, table: &RouteTable) -> LinkReport {
    let mut found = Vec::new();

    for article in articles {
        for link in &article.links {
            if let Some(reason) = check_one(link, &article.route, table) {
                found.push(DeadLink {
                    page: article.route.clone(),
                    link: link.clone(),
                    reason,
                });
            }
        }
    }

    let mut nav_links = Vec::new();
    collect_node_links(&config.theme.nav, &mut nav_links);
    let mut sidebar_links = Vec::new();
    collect_node_links(&config.sidebar, &mut sidebar_links);

    for (page, links) in [("nav", nav_links), ("sidebar", sidebar_links)] {
        for link in links {
            if let Some(reason) = check_one(&link, "/", table) {
                found.push(DeadLink {
                    page: page.to_string(),
                    link,
                    reason,
                });
            }
        }
    }

    let mut report = LinkReport::default();
    for dead in found {
        let ignored = match config.links.dead_links {
            DeadLinkPolicy::Fail => false,
            DeadLinkPolicy::Localhost => dead.reason == DeadReason::Localhost,
            DeadLinkPolicy::Ignore => true,
        };
        if ignored {
            report.ignored.push(dead);
        } else {
            report.dead.push(dead);
        }
    }
    report
}

fn check_one(link: &str, from: &str, table: &RouteTable) -> Option<DeadReason> {
    if link.is_empty() {
        return None;
    }
    if is_external(link) {
        return is_localhost(link).then_some(DeadReason::Localhost);
    }
    table.check(link, from).err()
}

fn collect_node_links(nodes: &[NavNode], out: &mut Vec<String>) {
    for node in nodes {
        if let Some(link) = &node.link {
            out.push(link.clone());
        }
        collect_node_links(&node.items, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(path: &str, anchors: &[&str], links: &[&str]) -> Article {
        let mut article = Article::stub(path);
        article.anchors = anchors.iter().map(|s| s.to_string()).collect();
        article.links = links.iter().map(|s| s.to_string()).collect();
        article
    }

    fn table() -> RouteTable {
        RouteTable::new(
            &[
                article("index.md", &[], &[]),
                article("articles/index.md", &[], &[]),
                article("articles/foo.md", &["quick-steps"], &[]),
                article("articles/my post.md", &["配置"], &[]),
            ],
            vec!["favicon.svg".to_string()],
        )
    }

    #[test]
    fn test_external() {
        assert!(is_external("https://example.com"));
        assert!(is_external("mailto:me@example.com"));
        assert!(is_external("//cdn.example.com/x.js"));
        assert!(!is_external("/articles/foo.md"));
        assert!(!is_external("./foo.md#a:b"));
    }

    #[test]
    fn test_localhost() {
        assert!(is_localhost("http://localhost:5173/articles/"));
        assert!(is_localhost("http://127.0.0.1/"));
        assert!(is_localhost("http://user@LOCALHOST"));
        assert!(!is_localhost("https://localhost.example.com/"));
        assert!(!is_localhost("/localhost"));
    }

    #[test]
    fn test_resolve_forms() {
        let t = table();
        for link in [
            "/articles/foo.html",
            "/articles/foo",
            "/articles/foo.md",
            "./foo.md",
            "foo",
            "../articles/foo.html?x=1",
            "/articles/",
            "/articles",
            "/articles/index.md",
            "/",
            "/favicon.svg",
            "./my%20post.md",
            "/articles/my%20post.html",
            "my post.md",
            "./my%20post.md#%E9%85%8D%E7%BD%AE",
            "/articles/my%20post#配置",
        ] {
            assert_eq!(t.check(link, "/articles/index.html"), Ok(()), "{link}");
        }
        assert_eq!(t.route("./foo.md", "/articles/"), Some("/articles/foo.html"));
        assert_eq!(t.route("/README.md", "/"), None);
        assert_eq!(t.route("my%20post", "/articles/"), Some("/articles/my post.html"));
        assert_eq!(
            t.check("./my%20post.md#%E9%85%8D", "/articles/"),
            Err(DeadReason::MissingAnchor)
        );
        assert_eq!(t.check("./my%2post.md", "/articles/"), Err(DeadReason::Missing));
    }

    #[test]
    fn test_dead_and_anchors() {
        let t = table();
        assert_eq!(t.check("/articles/missing", "/"), Err(DeadReason::Missing));
        assert_eq!(t.check("/articles/foo#quick-steps", "/"), Ok(()));
        assert_eq!(t.check("/articles/foo#nope", "/"), Err(DeadReason::MissingAnchor));
        assert_eq!(t.check("#quick-steps", "/articles/foo.html"), Ok(()));
    }

    #[test]
    fn test_policy() {
        let articles = vec![article(
            "index.md",
            &[],
            &["http://localhost:8080/", "/missing", "https://example.com"],
        )];
        let t = RouteTable::new(&articles, Vec::new());

        let mut config = Config::default();
        let report = check_links(&articles, &config, &t);
        assert_eq!(report.dead.len(), 1);
        assert_eq!(report.dead[0].link, "/missing");
        assert_eq!(report.ignored.len(), 1);

        config.links.dead_links = DeadLinkPolicy::Fail;
        assert_eq!(check_links(&articles, &config, &t).dead.len(), 2);

        config.links.dead_links = DeadLinkPolicy::Ignore;
        assert!(check_links(&articles, &config, &t).dead.is_empty());
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize("../b.md", "/a/x/y.html"), "/a/b.md");
        assert_eq!(absolutize("./c/", "/a/"), "/a/c/");
        assert_eq!(absolutize("../../..", "/a/b.html"), "/");
    }
}
