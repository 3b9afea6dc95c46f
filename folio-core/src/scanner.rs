use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::frontmatter::{self, FrontMatter};
use crate::git::{self, GitInfo};
use crate::markdown::{self, RenderOptions};
use crate::reading::ReadingTime;
use crate::site::{Article, route_for};

/// Directory under the docs root copied verbatim to the output.
pub const PUBLIC_DIR: &str = "public";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid path: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("Invalid front-matter in {}: {source}", path.display())]
    FrontMatter {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

pub struct SiteScanner<'c> {
    source_dir: PathBuf,
    config: &'c Config,
}

impl<'c> SiteScanner<'c> {
    pub fn new<P: AsRef<Path>>(path: P, config: &'c Config) -> Self {
        Self {
            source_dir: path.as_ref().to_path_buf(),
            config,
        }
    }

    /// Find, parse and render every article, sorted by source path.
    pub fn scan(&self) -> Result<Vec<Article>, ScanError> {
        log!("scan"; "{}", self.source_dir.display());

        let mut articles = Vec::new();
        for path in self.markdown_files()? {
            articles.push(self.scan_article(&path)?);
        }

        log!("scan"; "{} articles", articles.len());
        Ok(articles)
    }

    /// Markdown files under the docs root, skipping dot-directories and `public/`.
    pub fn markdown_files(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut paths = Vec::new();
        let walker = WalkDir::new(&self.source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e));

        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().map(|ext| ext == "md").unwrap_or(false) {
                paths.push(path.to_path_buf());
            }
        }

        paths.sort();
        Ok(paths)
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return true;
        }
        entry.depth() == 1 && entry.file_type().is_dir() && name == PUBLIC_DIR
    }

    fn scan_article(&self, path: &Path) -> Result<Article, ScanError> {
        let relative = path
            .strip_prefix(&self.source_dir)
            .map_err(|_| ScanError::InvalidPath(path.to_path_buf()))?
            .to_path_buf();

        let content = std::fs::read_to_string(path)?;
        let (yaml, body) = frontmatter::split(&content);
        let front_matter = match yaml {
            Some(yaml) => FrontMatter::parse(yaml).map_err(|source| ScanError::FrontMatter {
                path: relative.clone(),
                source,
            })?,
            None => FrontMatter::default(),
        };

        let options = RenderOptions {
            base: &self.config.site.base,
            code_theme: &self.config.theme.code_theme,
        };
        let rendered = markdown::render(body, &options);

        let title = front_matter
            .title
            .clone()
            .or(rendered.title)
            .unwrap_or_else(|| file_stem(&relative));
        let lang = front_matter
            .lang
            .clone()
            .unwrap_or_else(|| self.config.site.lang.clone());
        let reading_time =
            ReadingTime::estimate(&rendered.text, self.config.reading.words_per_minute);
        let git = if self.config.git.enabled {
            git::history(path)
        } else {
            GitInfo::default()
        };

        Ok(Article {
            route: route_for(&relative),
            path: relative,
            title,
            lang,
            front_matter,
            body: rendered.html,
            headers: rendered.headers,
            anchors: rendered.anchors,
            links: rendered.links,
            components: rendered.components,
            text: rendered.text,
            reading_time,
            git,
        })
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.git.enabled = false;
        config
    }

    #[test]
    fn test_scan_articles() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "index.md", "# Home\n");
        write(
            root,
            "articles/b.md",
            "---\ntitle: From front-matter\norder: 1\n---\n# Heading\n\nbody text\n",
        );
        write(root, "articles/a.md", "no heading here\n");
        write(root, "public/ignored.md", "# Ignored\n");
        write(root, ".folio/cache.md", "# Ignored\n");

        let config = test_config();
        let articles = SiteScanner::new(root, &config).scan().unwrap();
        let routes: Vec<&str> = articles.iter().map(|a| a.route.as_str()).collect();
        assert_eq!(routes, vec!["/articles/a.html", "/articles/b.html", "/"]);

        assert_eq!(articles[0].title, "a");
        assert_eq!(articles[1].title, "From front-matter");
        assert_eq!(articles[1].front_matter.order, Some(1));
        assert_eq!(articles[2].title, "Home");
        assert_eq!(articles[2].lang, "en-US");
        assert!(articles[1].reading_time.words > 0);
    }

    #[test]
    fn test_bad_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.md", "---\ntitle: [unclosed\n---\n");

        let config = test_config();
        let err = SiteScanner::new(dir.path(), &config).scan().unwrap_err();
        assert!(matches!(err, ScanError::FrontMatter { .. }));
        assert!(err.to_string().contains("bad.md"));
    }
}
