use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::nav::NavNode;

/// Environment variable selecting the deployment base path.
pub const BASE_ENV: &str = "FOLIO_BASE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parsing(#[from] toml::de::Error),
    #[error("Invalid base path `{0}`: expected a path such as `/` or `/qa/`")]
    InvalidBase(String),
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub head: HeadConfig,
    pub theme: ThemeConfig,
    pub sidebar: Vec<NavNode>,
    pub links: LinksConfig,
    pub reading: ReadingConfig,
    pub git: GitConfig,
    pub blog: BlogConfig,
}

impl Config {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(data)?;
        config.site.base = normalize_base(&config.site.base)?;
        Ok(config)
    }

    /// Replace the base path, e.g. from [`BASE_ENV`].
    pub fn set_base(&mut self, base: &str) -> Result<(), ConfigError> {
        self.site.base = normalize_base(base)?;
        Ok(())
    }

    /// Apply [`BASE_ENV`] when it is set and not blank.
    pub fn apply_base_env(&mut self) -> Result<(), ConfigError> {
        match std::env::var(BASE_ENV) {
            Ok(base) if !base.trim().is_empty() => self.set_base(&base),
            _ => Ok(()),
        }
    }

    /// Switch to a local development build.
    pub fn dev(&mut self) {
        self.site.environment = Environment::Dev;
    }

    pub fn is_dev(&self) -> bool {
        self.site.environment == Environment::Dev
    }
}

/// Ensure a base path starts and ends with `/`.
pub fn normalize_base(base: &str) -> Result<String, ConfigError> {
    let trimmed = base.trim();
    if trimmed.contains("://")
        || trimmed.contains(char::is_whitespace)
        || trimmed.contains(['?', '#'])
    {
        return Err(ConfigError::InvalidBase(base.to_string()));
    }

    let inner = trimmed.trim_matches('/');
    if inner.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{inner}/"))
}

/// Prefix a root-relative URL path with the base.
pub fn with_base(base: &str, path: &str) -> String {
    format!("{}{}", base, path.trim_start_matches('/'))
}

/// Like [`with_base`], but absolute and protocol-relative URLs pass through.
pub fn base_href(base: &str, href: &str) -> String {
    if href.starts_with('/') && !href.starts_with("//") {
        with_base(base, href)
    } else {
        href.to_string()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: String,
    pub lang: String,
    pub base: String,
    #[serde(skip)]
    pub environment: Environment,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Folio".into(),
            description: "A Markdown blog and documentation hub".into(),
            lang: "en-US".into(),
            base: "/".into(),
            environment: Environment::Production,
        }
    }
}

/// Where the generated site is going to be served from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Dev,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct HeadConfig {
    pub favicon: Option<FaviconConfig>,
    pub analytics: Option<AnalyticsConfig>,
    pub extra: Vec<ExtraTag>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct FaviconConfig {
    pub light: String,
    pub dark: String,
    pub dev: Option<String>,
    /// Always use one variant instead of following the OS preference.
    pub scheme: Option<ColorScheme>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub google: Option<String>,
    pub exclude_hosts: Vec<String>,
    pub exclude_bases: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            google: None,
            exclude_hosts: vec!["localhost".into(), "127.0.0.1".into()],
            exclude_bases: Vec::new(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ExtraTag {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    pub content: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ThemeConfig {
    pub nav: Vec<NavNode>,
    pub social: Vec<SocialLink>,
    pub search: SearchProvider,
    /// Stylesheets under the docs root loaded after the theme's own.
    pub styles: Vec<String>,
    /// CSS custom properties emitted on `:root`.
    pub tokens: BTreeMap<String, String>,
    pub code_theme: String,
    pub about: Option<AboutConfig>,
    /// Extra components, `Name = "components/name.html"`.
    pub components: BTreeMap<String, String>,
    pub last_updated: bool,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            nav: Vec::new(),
            social: Vec::new(),
            search: SearchProvider::Local,
            styles: Vec::new(),
            tokens: BTreeMap::new(),
            code_theme: "base16-ocean.dark".into(),
            about: None,
            components: BTreeMap::new(),
            last_updated: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SocialLink {
    pub icon: String,
    pub link: String,
}

impl SocialLink {
    pub fn with_base(&self, base: &str) -> Self {
        Self {
            icon: self.icon.clone(),
            link: base_href(base, &self.link),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    #[default]
    Local,
    None,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct AboutConfig {
    pub name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub links: Vec<SocialLink>,
}

impl AboutConfig {
    /// Copy with the avatar and root-relative links under `base`.
    pub fn with_base(&self, base: &str) -> Self {
        Self {
            name: self.name.clone(),
            avatar: self.avatar.as_deref().map(|a| base_href(base, a)),
            bio: self.bio.clone(),
            links: self.links.iter().map(|l| l.with_base(base)).collect(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LinksConfig {
    pub dead_links: DeadLinkPolicy,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeadLinkPolicy {
    /// Every dead link fails the build.
    Fail,
    /// Links that only break against `localhost` are ignored.
    #[default]
    Localhost,
    /// Dead links are only reported.
    Ignore,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ReadingConfig {
    pub words_per_minute: u32,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 300,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct GitConfig {
    pub enabled: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct BlogConfig {
    /// Directory under the docs root holding blog posts.
    pub dir: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            dir: "articles".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r##"
            [site]
            title = "Dorin Docs Hub"
            description = "Notes on infrastructure"
            base = "qa"

            [head.favicon]
            light = "/favicon-light.svg"
            dark = "/favicon-dark.svg"

            [head.analytics]
            google = "G-TEST"
            exclude_bases = ["/qa/"]

            [[head.extra]]
            tag = "meta"
            attrs = { name = "theme-color", content = "#3c8772" }

            [theme]
            search = "none"
            tokens = { "vp-c-brand" = "#3c8772" }

            [[theme.nav]]
            text = "Articles"
            link = "/articles/"

            [[sidebar]]
            text = "Articles"
            icon = "laptop-code"
            structure = "articles/"

            [links]
            dead_links = "fail"
            "##,
        )
        .unwrap();

        assert_eq!(config.site.title, "Dorin Docs Hub");
        assert_eq!(config.site.base, "/qa/");
        assert_eq!(config.site.lang, "en-US");
        assert_eq!(config.head.favicon.as_ref().unwrap().dark, "/favicon-dark.svg");
        let analytics = config.head.analytics.as_ref().unwrap();
        assert_eq!(analytics.google.as_deref(), Some("G-TEST"));
        assert_eq!(analytics.exclude_hosts, vec!["localhost", "127.0.0.1"]);
        assert_eq!(config.head.extra[0].attrs["name"], "theme-color");
        assert_eq!(config.theme.search, SearchProvider::None);
        assert_eq!(config.theme.nav[0].link.as_deref(), Some("/articles/"));
        assert_eq!(config.sidebar[0].structure.as_deref(), Some("articles/"));
        assert_eq!(config.links.dead_links, DeadLinkPolicy::Fail);
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.site.base, "/");
        assert_eq!(config.theme.search, SearchProvider::Local);
        assert_eq!(config.links.dead_links, DeadLinkPolicy::Localhost);
        assert_eq!(config.reading.words_per_minute, 300);
        assert!(config.git.enabled);
        assert_eq!(config.blog.dir, "articles");
        assert!(!config.is_dev());
    }

    #[test]
    fn test_normalize_base() {
        assert_eq!(normalize_base("").unwrap(), "/");
        assert_eq!(normalize_base("/").unwrap(), "/");
        assert_eq!(normalize_base("qa").unwrap(), "/qa/");
        assert_eq!(normalize_base("/docs/qa").unwrap(), "/docs/qa/");
        assert_eq!(normalize_base(" /qa/ ").unwrap(), "/qa/");
        assert!(normalize_base("https://example.com/").is_err());
        assert!(normalize_base("/a b/").is_err());
    }

    #[test]
    fn test_set_base_and_dev() {
        let mut config = Config::default();
        config.set_base("/qa").unwrap();
        assert_eq!(config.site.base, "/qa/");
        assert_eq!(with_base(&config.site.base, "/assets/style.css"), "/qa/assets/style.css");

        config.dev();
        assert!(config.is_dev());
    }

    #[test]
    fn test_about_card_urls_follow_base() {
        let about = AboutConfig {
            name: "Dorin".into(),
            avatar: Some("/avatar.svg".into()),
            bio: None,
            links: vec![
                SocialLink { icon: "rss".into(), link: "/blog-index.json".into() },
                SocialLink { icon: "github".into(), link: "https://github.com/dorin".into() },
            ],
        };

        let about = about.with_base("/qa/");
        assert_eq!(about.avatar.as_deref(), Some("/qa/avatar.svg"));
        assert_eq!(about.links[0].link, "/qa/blog-index.json");
        assert_eq!(about.links[1].link, "https://github.com/dorin");
        assert_eq!(base_href("/qa/", "//cdn.example.com/a.png"), "//cdn.example.com/a.png");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(Config::parse("[site"), Err(ConfigError::Parsing(_))));
    }
}
