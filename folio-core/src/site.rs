use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::frontmatter::FrontMatter;
use crate::git::GitInfo;
use crate::markdown::Header;
use crate::reading::ReadingTime;

/// One Markdown file after scanning and rendering.
#[derive(Debug, Clone)]
pub struct Article {
    /// Source path relative to the docs root.
    pub path: PathBuf,
    pub route: String,
    pub title: String,
    pub lang: String,
    pub front_matter: FrontMatter,
    /// Rendered HTML fragment, with component placeholders.
    pub body: String,
    pub headers: Vec<Header>,
    pub anchors: Vec<String>,
    pub links: Vec<String>,
    pub components: Vec<String>,
    pub text: String,
    pub reading_time: ReadingTime,
    pub git: GitInfo,
}

impl Article {
    pub fn out_path(&self) -> PathBuf {
        out_path_for(&self.route)
    }

    /// Where the page data blob is written, e.g. `assets/data/articles_foo.md.json`.
    pub fn data_path(&self) -> PathBuf {
        let name = url_path(&self.path).replace('/', "_");
        PathBuf::from("assets").join("data").join(format!("{name}.json"))
    }

    pub fn is_index(&self) -> bool {
        is_index_file(&self.path)
    }

    pub fn page_data(&self) -> PageData<'_> {
        PageData {
            title: &self.title,
            description: self
                .front_matter
                .description
                .as_deref()
                .or(self.front_matter.summary.as_deref())
                .unwrap_or_default(),
            lang: &self.lang,
            route: &self.route,
            relative_path: url_path(&self.path),
            frontmatter: &self.front_matter,
            headers: &self.headers,
            reading_time: self.reading_time,
            git: &self.git,
        }
    }
}

/// Metadata blob written next to every page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub lang: &'a str,
    pub route: &'a str,
    pub relative_path: String,
    pub frontmatter: &'a FrontMatter,
    pub headers: &'a [Header],
    pub reading_time: ReadingTime,
    pub git: &'a GitInfo,
}

pub fn is_index_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            let name = name.to_string_lossy().to_lowercase();
            name == "index.md" || name == "readme.md"
        })
        .unwrap_or(false)
}

/// Forward-slash form of a relative path.
pub fn url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Route for a source file relative to the docs root.
///
/// `index.md` and `README.md` map to their directory, everything else to
/// `<name>.html`.
pub fn route_for(path: &Path) -> String {
    let rel = url_path(path);
    if is_index_file(path) {
        return match rel.rfind('/') {
            Some(i) => format!("/{}", &rel[..=i]),
            None => "/".to_string(),
        };
    }
    let stem = rel.strip_suffix(".md").unwrap_or(&rel);
    format!("/{stem}.html")
}

/// Output file for a route, relative to the output directory.
pub fn out_path_for(route: &str) -> PathBuf {
    let rel = route.trim_start_matches('/');
    if rel.is_empty() || rel.ends_with('/') {
        PathBuf::from(rel).join("index.html")
    } else {
        PathBuf::from(rel)
    }
}

#[cfg(test)]
impl Article {
    pub(crate) fn stub(path: &str) -> Self {
        let path = PathBuf::from(path);
        Article {
            route: route_for(&path),
            title: file_title(&path),
            path,
            lang: "en-US".into(),
            front_matter: FrontMatter::default(),
            body: String::new(),
            headers: Vec::new(),
            anchors: Vec::new(),
            links: Vec::new(),
            components: Vec::new(),
            text: String::new(),
            reading_time: ReadingTime::estimate("", 300),
            git: GitInfo::default(),
        }
    }
}

#[cfg(test)]
fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(route_for(Path::new("index.md")), "/");
        assert_eq!(route_for(Path::new("README.md")), "/");
        assert_eq!(route_for(Path::new("articles/index.md")), "/articles/");
        assert_eq!(route_for(Path::new("articles/foo.md")), "/articles/foo.html");
        assert_eq!(route_for(Path::new("about.md")), "/about.html");
    }

    #[test]
    fn test_out_paths() {
        assert_eq!(out_path_for("/"), PathBuf::from("index.html"));
        assert_eq!(out_path_for("/articles/"), PathBuf::from("articles/index.html"));
        assert_eq!(out_path_for("/articles/foo.html"), PathBuf::from("articles/foo.html"));
    }
}
