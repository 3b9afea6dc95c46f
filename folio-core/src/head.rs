//! `<head>` tag assembly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{
    AnalyticsConfig, ColorScheme, Config, Environment, FaviconConfig, base_href, normalize_base,
    with_base,
};

/// Stylesheet shipped with the built-in theme, relative to the output dir.
pub const THEME_STYLESHEET: &str = "assets/style.css";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HeadTag {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub content: Option<String>,
}

impl HeadTag {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            content: None,
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_favicon(&self) -> bool {
        self.tag == "link" && self.attrs.get("rel").map(|r| r == "icon").unwrap_or(false)
    }

    pub fn to_html(&self) -> String {
        let mut html = format!("<{}", self.tag);
        for (key, value) in &self.attrs {
            html.push_str(&format!(
                " {}=\"{}\"",
                key,
                html_escape::encode_double_quoted_attribute(value)
            ));
        }
        html.push('>');

        if is_void(&self.tag) {
            return html;
        }
        if let Some(content) = &self.content {
            html.push_str(content);
        }
        html.push_str(&format!("</{}>", self.tag));
        html
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "meta" | "link" | "base")
}

/// Which favicon variant to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaviconMode {
    /// Both variants, chosen by the browser from `prefers-color-scheme`.
    Auto,
    Scheme(ColorScheme),
}

/// Builds the ordered tag list for every page's `<head>`.
pub struct HeadBuilder<'c> {
    config: &'c Config,
    favicon_mode: FaviconMode,
}

impl<'c> HeadBuilder<'c> {
    pub fn new(config: &'c Config) -> Self {
        let favicon_mode = config
            .head
            .favicon
            .as_ref()
            .and_then(|f| f.scheme)
            .map(FaviconMode::Scheme)
            .unwrap_or(FaviconMode::Auto);
        Self {
            config,
            favicon_mode,
        }
    }

    pub fn favicon_mode(mut self, mode: FaviconMode) -> Self {
        self.favicon_mode = mode;
        self
    }

    /// Favicons, stylesheets, theme tokens, extra tags, then analytics.
    pub fn build(&self) -> Vec<HeadTag> {
        let base = &self.config.site.base;
        let mut tags = Vec::new();

        if let Some(favicon) = &self.config.head.favicon {
            tags.extend(self.favicons(favicon));
        }

        tags.push(stylesheet(with_base(base, THEME_STYLESHEET)));
        for style in &self.config.theme.styles {
            tags.push(stylesheet(with_base(base, &style_href(style))));
        }

        if !self.config.theme.tokens.is_empty() {
            let vars: String = self
                .config
                .theme
                .tokens
                .iter()
                .map(|(k, v)| format!("--{}:{};", k.trim_start_matches('-'), v))
                .collect();
            tags.push(HeadTag::new("style").content(format!(":root{{{vars}}}")));
        }

        for extra in &self.config.head.extra {
            tags.push(HeadTag {
                tag: extra.tag.clone(),
                attrs: extra.attrs.clone(),
                content: extra.content.clone(),
            });
        }

        if let Some(analytics) = &self.config.head.analytics {
            if analytics_enabled(self.config, analytics) {
                tags.extend(analytics_tags(analytics));
            }
        }

        tags
    }

    fn favicons(&self, favicon: &FaviconConfig) -> Vec<HeadTag> {
        let base = &self.config.site.base;
        let icon = |href: &str| {
            HeadTag::new("link")
                .attr("rel", "icon")
                .attr("href", base_href(base, href))
        };

        if let (Environment::Dev, Some(dev)) = (&self.config.site.environment, &favicon.dev) {
            return vec![icon(dev)];
        }

        match self.favicon_mode {
            FaviconMode::Scheme(ColorScheme::Light) => vec![icon(&favicon.light)],
            FaviconMode::Scheme(ColorScheme::Dark) => vec![icon(&favicon.dark)],
            FaviconMode::Auto => vec![
                icon(&favicon.light).attr("media", "(prefers-color-scheme: light)"),
                icon(&favicon.dark).attr("media", "(prefers-color-scheme: dark)"),
            ],
        }
    }
}

/// Output path of a theme stylesheet override, relative to the output dir.
pub fn style_href(style: &str) -> String {
    format!("assets/{}", style.trim_start_matches("./").trim_start_matches('/'))
}

fn stylesheet(href: String) -> HeadTag {
    HeadTag::new("link").attr("rel", "stylesheet").attr("href", href)
}

/// Analytics never ship in local builds or to excluded bases such as QA.
pub fn analytics_enabled(config: &Config, analytics: &AnalyticsConfig) -> bool {
    if analytics.google.is_none() || config.is_dev() {
        return false;
    }
    !excluded_bases(analytics).contains(&config.site.base)
}

/// Excluded bases in the `/x/` form `location.pathname` starts with.
/// Entries that are not valid base paths are dropped.
fn excluded_bases(analytics: &AnalyticsConfig) -> Vec<String> {
    analytics
        .exclude_bases
        .iter()
        .filter_map(|excluded| normalize_base(excluded).ok())
        .collect()
}

fn analytics_tags(analytics: &AnalyticsConfig) -> Vec<HeadTag> {
    let Some(id) = &analytics.google else {
        return Vec::new();
    };

    let hosts = serde_json::to_string(&analytics.exclude_hosts).unwrap_or_else(|_| "[]".into());
    let bases =
        serde_json::to_string(&excluded_bases(analytics)).unwrap_or_else(|_| "[]".into());
    let id_js = serde_json::to_string(id).unwrap_or_else(|_| "\"\"".into());

    let script = format!(
        "(function(){{\
var id={id_js};\
if({hosts}.indexOf(location.hostname)!==-1)return;\
if({bases}.some(function(b){{return location.pathname.indexOf(b)===0;}}))return;\
var s=document.createElement('script');s.async=true;\
s.src='https://www.googletagmanager.com/gtag/js?id='+encodeURIComponent(id);\
document.head.appendChild(s);\
window.dataLayer=window.dataLayer||[];\
function gtag(){{dataLayer.push(arguments);}}\
window.gtag=gtag;gtag('js',new Date());gtag('config',id);\
}})();"
    );

    vec![HeadTag::new("script").attr("data-analytics", "google").content(script)]
}

/// Render tags one per line.
pub fn render_head(tags: &[HeadTag]) -> String {
    tags.iter().map(HeadTag::to_html).collect::<Vec<_>>().join("\n")
}
