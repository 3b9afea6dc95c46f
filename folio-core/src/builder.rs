use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{Config, SearchProvider};
use crate::head::{HeadBuilder, THEME_STYLESHEET, render_head, style_href};
use crate::index::{BLOG_INDEX, BlogEntry, blog_entries, blog_posts, write_blog_index};
use crate::links::{DeadLink, RouteTable, check_links};
use crate::nav::{NavAssembler, NavNode, flatten, neighbours};
use crate::renderer::{RenderContext, Renderer};
use crate::scanner::{PUBLIC_DIR, ScanError, SiteScanner};
use crate::search::{SEARCH_INDEX, SEARCH_SCRIPT, search_entries};
use crate::site::{Article, url_path};
use crate::template::{TemplateError, search_script, theme_stylesheet};

/// Post-processing applied to every rendered HTML page.
pub type HtmlFilter = Box<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Source directory not specified")]
    MissingSourceDir,
    #[error("Source directory does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("Refusing to clean {}: it contains the source directory", .0.display())]
    UnsafeOutputDir(PathBuf),
    #[error("{page}: layout template `{template}` not found")]
    MissingTemplate { page: String, template: String },
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} dead link(s):\n{}", .0.len(), format_dead(.0))]
    DeadLinks(Vec<DeadLink>),
}

fn format_dead(dead: &[DeadLink]) -> String {
    dead.iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct SiteBuilder {
    source_dir: Option<PathBuf>,
    output_dir: PathBuf,
    theme_dir: Option<PathBuf>,
    config: Config,
    html_filter: Option<HtmlFilter>,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            source_dir: None,
            output_dir: PathBuf::from("./dist"),
            theme_dir: None,
            config: Config::default(),
            html_filter: None,
        }
    }

    pub fn source_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = path.as_ref().to_path_buf();
        self
    }

    /// Directory whose templates and stylesheet override the built-in theme.
    pub fn theme_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.theme_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn html_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.html_filter = Some(Box::new(filter));
        self
    }

    /// Scan the sources, check links and prepare the renderer.
    pub fn build(self) -> Result<Site, BuildError> {
        let source_dir = self.source_dir.ok_or(BuildError::MissingSourceDir)?;
        if !source_dir.is_dir() {
            return Err(BuildError::SourceNotFound(source_dir));
        }
        let config = self.config;
        let theme_dir = self.theme_dir.filter(|d| d.is_dir());

        let articles = SiteScanner::new(&source_dir, &config).scan()?;
        let public_files = public_files(&source_dir)?;
        let routes = RouteTable::new(&articles, public_files.iter().cloned());

        let report = check_links(&articles, &config, &routes);
        for ignored in &report.ignored {
            warn!("links"; "ignored {}", ignored);
        }
        if !report.dead.is_empty() {
            return Err(BuildError::DeadLinks(report.dead));
        }

        let base = config.site.base.clone();
        let assembler = NavAssembler::new(&articles, &routes, &base);
        let nav = assembler.assemble(&config.theme.nav);
        let sidebar = assembler.assemble(&config.sidebar);
        let blog = blog_entries(&articles, &config.blog.dir);

        let mut renderer = Renderer::new(theme_dir.as_deref())?;
        for (name, template) in &config.theme.components {
            renderer.register_component(name, template);
        }

        let head = render_head(&HeadBuilder::new(&config).build());
        renderer.set_global_context("site", &config.site);
        renderer.set_global_context("head", &head);
        renderer.set_global_context("nav", &nav);
        renderer.set_global_context("sidebar", &sidebar);
        let social: Vec<_> = config.theme.social.iter().map(|s| s.with_base(&base)).collect();
        renderer.set_global_context("social", &social);
        renderer.set_global_context("search", &(config.theme.search == SearchProvider::Local));
        let about = config.theme.about.as_ref().map(|a| a.with_base(&base));
        renderer.set_global_context("about", &about);
        renderer.set_global_context("posts", &blog_posts(&blog, &articles, &base));

        Ok(Site {
            articles,
            sidebar,
            nav,
            blog,
            public_files,
            renderer,
            config,
            source_dir,
            output_dir: self.output_dir,
            theme_dir,
            html_filter: self.html_filter,
        })
    }
}

pub struct Site {
    articles: Vec<Article>,
    sidebar: Vec<NavNode>,
    nav: Vec<NavNode>,
    blog: Vec<BlogEntry>,
    public_files: Vec<String>,
    renderer: Renderer,
    config: Config,
    source_dir: PathBuf,
    output_dir: PathBuf,
    theme_dir: Option<PathBuf>,
    html_filter: Option<HtmlFilter>,
}

impl Site {
    /// Write every page and asset into a freshly cleaned output directory.
    pub fn render_all(&self) -> Result<(), BuildError> {
        self.clean_output()?;

        // Generated files below win over same-named files in `public/`.
        let public = self.source_dir.join(PUBLIC_DIR);
        for file in &self.public_files {
            self.copy(&public.join(file), Path::new(file))?;
        }

        // Previous/next follow the sidebar, or the nav bar for sites without one.
        let flat = if self.sidebar.is_empty() {
            flatten(&self.nav)
        } else {
            flatten(&self.sidebar)
        };

        for article in &self.articles {
            self.render_article(article, &flat)?;
        }

        let not_found = self.renderer.render("404.html", &RenderContext::new())?;
        self.write_page(Path::new("404.html"), &not_found)?;

        write_blog_index(&self.blog, &self.output_dir.join(BLOG_INDEX))?;

        if self.config.theme.search == SearchProvider::Local {
            let entries = search_entries(&self.articles, &self.config.site.base);
            self.write(Path::new(SEARCH_INDEX), &serde_json::to_string(&entries)?)?;
            self.write(Path::new(SEARCH_SCRIPT), &search_script(self.theme_dir.as_deref())?)?;
        }

        self.write(
            Path::new(THEME_STYLESHEET),
            &theme_stylesheet(self.theme_dir.as_deref())?,
        )?;
        for style in &self.config.theme.styles {
            let from = self.source_dir.join(style.trim_start_matches('/'));
            if from.is_file() {
                self.copy(&from, Path::new(&style_href(style)))?;
            } else {
                warn!("build"; "stylesheet {} not found", from.display());
            }
        }

        log!("build"; "{} pages -> {}", self.articles.len(), self.output_dir.display());
        Ok(())
    }

    fn render_article(&self, article: &Article, flat: &[&NavNode]) -> Result<(), BuildError> {
        let template = format!("{}.html", article.front_matter.layout());
        if !self.renderer.has_template(&template) {
            return Err(BuildError::MissingTemplate {
                page: article.route.clone(),
                template,
            });
        }

        let page = article.page_data();
        let (prev, next) = neighbours(flat, &article.route);

        let mut context = RenderContext::new();
        context.add_to_context("page", &page);
        context.add_to_context("prev", &prev);
        context.add_to_context("next", &next);
        context.add_to_context("reading_minutes", &article.reading_time.display_minutes());
        context.add_to_context("last_updated", &self.last_updated(article));

        let content = self
            .renderer
            .render_components(&article.body, &article.components, &context)?;
        context.add_to_context("content", &content);

        let html = self.renderer.render(&template, &context)?;
        self.write_page(&article.out_path(), &html)?;
        self.write(&article.data_path(), &serde_json::to_string_pretty(&page)?)?;
        Ok(())
    }

    /// Date of the last commit touching the article, `YYYY-MM-DD` in UTC.
    fn last_updated(&self, article: &Article) -> Option<String> {
        if !self.config.theme.last_updated {
            return None;
        }
        let millis = article.git.updated_time?;
        DateTime::<Utc>::from_timestamp_millis(millis).map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// Empty the output directory but keep it, so watchers on it stay attached.
    fn clean_output(&self) -> Result<(), BuildError> {
        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir)?;
            return Ok(());
        }

        let output = self.output_dir.canonicalize()?;
        let source = self.source_dir.canonicalize()?;
        if source.starts_with(&output) {
            return Err(BuildError::UnsafeOutputDir(self.output_dir.clone()));
        }

        for entry in std::fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    fn write_page(&self, rel: &Path, html: &str) -> Result<(), BuildError> {
        match &self.html_filter {
            Some(filter) => self.write(rel, &filter(html)),
            None => self.write(rel, html),
        }
    }

    fn write(&self, rel: &Path, contents: &str) -> Result<(), BuildError> {
        let path = self.output_dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn copy(&self, from: &Path, rel: &Path) -> Result<(), BuildError> {
        let to = self.output_dir.join(rel);
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to)?;
        Ok(())
    }
}

/// Files under `<source>/public`, relative to it, sorted.
fn public_files(source_dir: &Path) -> Result<Vec<String>, BuildError> {
    let public = source_dir.join(PUBLIC_DIR);
    if !public.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&public).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(&public) {
                files.push(url_path(rel));
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Build and write the whole site in one go.
pub fn build_site(
    config: &Config,
    source_dir: &Path,
    output_dir: &Path,
    theme_dir: &Path,
) -> Result<(), BuildError> {
    SiteBuilder::new()
        .source_dir(source_dir)
        .output_dir(output_dir)
        .theme_dir(theme_dir)
        .config(config.clone())
        .build()?
        .render_all()
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

    fn config() -> Config {
        let mut config = Config::default();
        config.git.enabled = false;
        config
    }

    #[test]
    fn test_missing_source() {
        assert!(matches!(
            SiteBuilder::new().build(),
            Err(BuildError::MissingSourceDir)
        ));
        assert!(matches!(
            SiteBuilder::new().source_dir("/does/not/exist").build(),
            Err(BuildError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_refuses_to_clean_source_parent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/index.md", "# Home\n");

        let err = SiteBuilder::new()
            .source_dir(dir.path().join("docs"))
            .output_dir(dir.path())
            .config(config())
            .build()
            .unwrap()
            .render_all()
            .unwrap_err();
        assert!(matches!(err, BuildError::UnsafeOutputDir(_)));
        assert!(dir.path().join("docs/index.md").exists());
    }

    #[test]
    fn test_clean_keeps_output_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/index.md", "# Home\n");
        let out = dir.path().join("dist");
        write(&out, "stale.html", "old");
        write(&out, "old/nested/page.html", "old");
        let build = || {
            SiteBuilder::new()
                .source_dir(dir.path().join("docs"))
                .output_dir(&out)
                .config(config())
                .build()
                .unwrap()
                .render_all()
                .unwrap()
        };

        #[cfg(unix)]
        let inode = || std::os::unix::fs::MetadataExt::ino(&fs::metadata(&out).unwrap());
        #[cfg(unix)]
        let before = inode();

        build();
        assert!(!out.join("stale.html").exists());
        assert!(!out.join("old").exists());
        assert!(out.join("index.html").exists());

        build();
        assert!(out.join("index.html").exists());
        #[cfg(unix)]
        assert_eq!(inode(), before);
    }

    #[test]
    fn test_unknown_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/index.md", "---\nlayout: fancy\n---\n# Home\n");

        let err = SiteBuilder::new()
            .source_dir(dir.path().join("docs"))
            .output_dir(dir.path().join("dist"))
            .config(config())
            .build()
            .unwrap()
            .render_all()
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingTemplate { .. }));
    }

    #[test]
    fn test_html_filter_and_public_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/index.md", "# Home\n\n[icon](/favicon.svg)\n");
        write(dir.path(), "docs/public/favicon.svg", "<svg/>");
        let out = dir.path().join("dist");

        SiteBuilder::new()
            .source_dir(dir.path().join("docs"))
            .output_dir(&out)
            .config(config())
            .html_filter(|html| html.replace("</body>", "<!--filtered--></body>"))
            .build()
            .unwrap()
            .render_all()
            .unwrap();

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("<!--filtered-->"));
        assert!(fs::read_to_string(out.join("404.html")).unwrap().contains("<!--filtered-->"));
        assert_eq!(fs::read_to_string(out.join("favicon.svg")).unwrap(), "<svg/>");
        assert!(out.join("assets/data/index.md.json").exists());
    }
}
