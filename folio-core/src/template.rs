use std::path::Path;

use tera::{Context, Tera};
use thiserror::Error;
use walkdir::WalkDir;

/// Templates every theme starts from. A theme directory overrides them by name.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("macros.html", include_str!("../theme/macros.html")),
    ("base.html", include_str!("../theme/base.html")),
    ("doc.html", include_str!("../theme/doc.html")),
    ("page.html", include_str!("../theme/page.html")),
    ("404.html", include_str!("../theme/404.html")),
    ("components/blog_index.html", include_str!("../theme/components/blog_index.html")),
    ("components/about_card.html", include_str!("../theme/components/about_card.html")),
];

const BUILTIN_STYLESHEET: &str = include_str!("../theme/style.css");
const BUILTIN_SEARCH_SCRIPT: &str = include_str!("../theme/search.js");

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Load the built-in templates, then any `*.html` under `theme_dir`.
    pub fn new(theme_dir: Option<&Path>) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.set_escape_fn(escape_html);
        tera.add_raw_templates(BUILTIN_TEMPLATES.iter().copied())?;

        if let Some(dir) = theme_dir.filter(|d| d.is_dir()) {
            let mut files = Vec::new();
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = entry?;
                let path = entry.path();
                if path.is_file() && path.extension().map(|e| e == "html").unwrap_or(false) {
                    let name = path
                        .strip_prefix(dir)
                        .unwrap_or(path)
                        .to_string_lossy()
                        .replace('\\', "/");
                    files.push((path.to_path_buf(), Some(name)));
                }
            }
            if !files.is_empty() {
                log!("theme"; "{} template overrides from {}", files.len(), dir.display());
                tera.add_template_files(files)?;
            }
        }

        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String, TemplateError> {
        Ok(self.tera.render(template, context)?)
    }
}

/// Escapes `& < > " '` but leaves `/` alone so URLs stay readable.
fn escape_html(input: &str) -> String {
    html_escape::encode_quoted_attribute(input).into_owned()
}

/// The theme stylesheet: `style.css` from the theme directory, or the built-in one.
pub fn theme_stylesheet(theme_dir: Option<&Path>) -> Result<String, TemplateError> {
    read_override(theme_dir, "style.css", BUILTIN_STYLESHEET)
}

/// The local search client: `search.js` from the theme directory, or the built-in one.
pub fn search_script(theme_dir: Option<&Path>) -> Result<String, TemplateError> {
    read_override(theme_dir, "search.js", BUILTIN_SEARCH_SCRIPT)
}

fn read_override(
    theme_dir: Option<&Path>,
    name: &str,
    builtin: &str,
) -> Result<String, TemplateError> {
    match theme_dir.map(|d| d.join(name)).filter(|p| p.is_file()) {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(builtin.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_load() {
        let renderer = TemplateRenderer::new(None).unwrap();
        for (name, _) in BUILTIN_TEMPLATES {
            assert!(renderer.has_template(name), "{name}");
        }
    }

    #[test]
    fn test_theme_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("components")).unwrap();
        std::fs::write(
            dir.path().join("components/about_card.html"),
            "<p class=\"mine\">{{ about.name }}</p>",
        )
        .unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();

        let renderer = TemplateRenderer::new(Some(dir.path())).unwrap();
        let mut context = Context::new();
        context.insert("about", &serde_json::json!({ "name": "Dorin & co" }));
        let html = renderer.render("components/about_card.html", &context).unwrap();
        assert_eq!(html, "<p class=\"mine\">Dorin &amp; co</p>");
        assert_eq!(theme_stylesheet(Some(dir.path())).unwrap(), "body{}");
        assert!(theme_stylesheet(None).unwrap().contains("--folio-brand"));
    }

    #[test]
    fn test_escape_keeps_slashes() {
        assert_eq!(escape_html("/qa/a.html?x=1&y=\"2\""), "/qa/a.html?x=1&amp;y=&quot;2&quot;");
    }
}
