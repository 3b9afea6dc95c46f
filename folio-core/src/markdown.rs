use std::collections::HashMap;
use std::sync::LazyLock;

use pulldown_cmark::{
    CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html,
};
use serde::Serialize;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::with_base;
use crate::links::is_external;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const DEFAULT_CODE_THEME: &str = "base16-ocean.dark";

/// A heading listed in the page outline.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Header {
    pub level: u8,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct RenderOptions<'a> {
    pub base: &'a str,
    pub code_theme: &'a str,
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        Self {
            base: "/",
            code_theme: DEFAULT_CODE_THEME,
        }
    }
}

/// Output of rendering one Markdown document.
#[derive(Debug, Default)]
pub struct Rendered {
    pub html: String,
    /// Text of the first `#` heading.
    pub title: Option<String>,
    /// `##` and `###` headings, in document order.
    pub headers: Vec<Header>,
    /// Every heading id on the page.
    pub anchors: Vec<String>,
    /// Link targets exactly as written.
    pub links: Vec<String>,
    /// Components referenced with `<Name />`.
    pub components: Vec<String>,
    pub text: String,
}

pub fn render(markdown: &str, options: &RenderOptions) -> Rendered {
    let parser = Parser::new_ext(markdown, parser_options());
    let mut state = RenderState::new(options);
    let mut events: Vec<Event> = Vec::new();

    let mut heading: Option<HeadingBuffer> = None;
    let mut code: Option<(Option<String>, String)> = None;

    for event in parser {
        if let Some((lang, content)) = code.as_mut() {
            match event {
                Event::End(TagEnd::CodeBlock) => {
                    state.push_text(content);
                    state.text.push(' ');
                    let html = highlight(lang.as_deref(), content, options.code_theme);
                    events.push(Event::Html(html.into()));
                    code = None;
                }
                Event::Text(text) => content.push_str(&text),
                _ => {}
            }
            continue;
        }

        if let Some(buffer) = heading.as_mut() {
            match event {
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(buffer) = heading.take() {
                        let html = state.finish_heading(buffer);
                        events.push(Event::Html(html.into()));
                    }
                }
                other => {
                    if let Event::Text(text) | Event::Code(text) = &other {
                        buffer.text.push_str(text);
                    }
                    let other = state.transform(other);
                    buffer.events.push(other);
                }
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                code = Some((lang, String::new()));
            }
            Event::Start(Tag::Heading { level, id, .. }) => {
                heading = Some(HeadingBuffer {
                    level,
                    id: id.map(|id| id.to_string()),
                    text: String::new(),
                    events: Vec::new(),
                });
            }
            Event::End(
                TagEnd::Paragraph | TagEnd::Item | TagEnd::TableCell | TagEnd::BlockQuote(_),
            ) => {
                state.text.push(' ');
                events.push(event);
            }
            other => {
                let other = state.transform(other);
                events.push(other);
            }
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());

    Rendered {
        html: out,
        text: state.text.split_whitespace().collect::<Vec<_>>().join(" "),
        title: state.title,
        headers: state.headers,
        anchors: state.anchors,
        links: state.links,
        components: state.components,
    }
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

struct HeadingBuffer<'a> {
    level: HeadingLevel,
    id: Option<String>,
    text: String,
    events: Vec<Event<'a>>,
}

struct RenderState<'o> {
    base: &'o str,
    slugs: HashMap<String, usize>,
    title: Option<String>,
    headers: Vec<Header>,
    anchors: Vec<String>,
    links: Vec<String>,
    components: Vec<String>,
    text: String,
}

impl<'o> RenderState<'o> {
    fn new(options: &RenderOptions<'o>) -> Self {
        Self {
            base: options.base,
            slugs: HashMap::new(),
            title: None,
            headers: Vec::new(),
            anchors: Vec::new(),
            links: Vec::new(),
            components: Vec::new(),
            text: String::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Rewrite links and components, and collect text.
    fn transform<'a>(&mut self, event: Event<'a>) -> Event<'a> {
        match event {
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                self.links.push(dest_url.to_string());
                let dest_url = rewrite_link(&dest_url, self.base);
                Event::Start(Tag::Link {
                    link_type,
                    dest_url: dest_url.into(),
                    title,
                    id,
                })
            }
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => {
                let dest_url: CowStr = if dest_url.starts_with('/') && !dest_url.starts_with("//") {
                    with_base(self.base, &dest_url).into()
                } else {
                    dest_url
                };
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                })
            }
            Event::Text(text) => {
                self.push_text(&text);
                Event::Text(text)
            }
            Event::Code(code) => {
                self.push_text(&code);
                Event::Code(code)
            }
            Event::SoftBreak | Event::HardBreak => {
                self.text.push(' ');
                event
            }
            Event::Html(raw) => match component_name(&raw) {
                Some(name) => {
                    let marker = component_marker(name);
                    self.components.push(name.to_string());
                    Event::Html(marker.into())
                }
                None => Event::Html(raw),
            },
            Event::InlineHtml(raw) => match component_name(&raw) {
                Some(name) => {
                    let marker = component_marker(name);
                    self.components.push(name.to_string());
                    Event::InlineHtml(marker.into())
                }
                None => Event::InlineHtml(raw),
            },
            other => other,
        }
    }

    fn finish_heading(&mut self, buffer: HeadingBuffer) -> String {
        let level = buffer.level as u8;
        let text = buffer.text.trim().to_string();
        let slug = match buffer.id {
            Some(id) => self.claim(id),
            None => {
                let slug = slugify(&text);
                self.claim(slug)
            }
        };

        self.text.push(' ');
        self.anchors.push(slug.clone());
        if level == 1 && self.title.is_none() {
            self.title = Some(text.clone());
        }
        if (2..=3).contains(&level) {
            self.headers.push(Header {
                level,
                title: text,
                slug: slug.clone(),
            });
        }

        let mut inner = String::new();
        html::push_html(&mut inner, buffer.events.into_iter());
        let slug = html_escape::encode_double_quoted_attribute(&slug);
        format!(
            "<h{level} id=\"{slug}\" tabindex=\"-1\"><a class=\"header-anchor\" href=\"#{slug}\"><span>{inner}</span></a></h{level}>\n"
        )
    }

    /// Reserve a unique anchor, suffixing `-1`, `-2`, … on collisions.
    fn claim(&mut self, slug: String) -> String {
        let Some(&taken) = self.slugs.get(&slug) else {
            self.slugs.insert(slug.clone(), 0);
            return slug;
        };

        let mut n = taken;
        loop {
            n += 1;
            let candidate = format!("{slug}-{n}");
            if !self.slugs.contains_key(&candidate) {
                self.slugs.insert(slug, n);
                self.slugs.insert(candidate.clone(), 0);
                return candidate;
            }
        }
    }
}

/// Turn heading text into an anchor id.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        return "section".to_string();
    }
    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        slug.insert(0, '_');
    }
    slug
}

/// Rewrite a link target for the generated site.
///
/// `.md` targets point at their generated page and root-relative targets get
/// the base prefix. External links and bare fragments are left alone.
pub fn rewrite_link(dest: &str, base: &str) -> String {
    if dest.is_empty() || dest.starts_with('#') || is_external(dest) {
        return dest.to_string();
    }

    let split_at = dest.find(['?', '#']).unwrap_or(dest.len());
    let (path, suffix) = dest.split_at(split_at);
    let path = md_to_html(path);

    if path.starts_with('/') {
        format!("{}{}", with_base(base, &path), suffix)
    } else {
        format!("{path}{suffix}")
    }
}

fn md_to_html(path: &str) -> String {
    let Some(stem) = path.strip_suffix(".md") else {
        return path.to_string();
    };
    let (dir, file) = match stem.rfind('/') {
        Some(i) => (&stem[..=i], &stem[i + 1..]),
        None => ("", stem),
    };
    if file.eq_ignore_ascii_case("index") || file.eq_ignore_ascii_case("readme") {
        if dir.is_empty() { "./".to_string() } else { dir.to_string() }
    } else {
        format!("{stem}.html")
    }
}

/// Name of a `<Name />` component tag, if `raw` is exactly one.
fn component_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('<')?;
    let name = match inner.strip_suffix("/>") {
        Some(name) => name.trim_end(),
        None => {
            let (open, close) = inner.split_once("></")?;
            let close = close.strip_suffix('>')?;
            if open != close {
                return None;
            }
            open
        }
    };

    let mut chars = name.chars();
    let first = chars.next()?;
    if first.is_ascii_uppercase() && chars.all(|c| c.is_ascii_alphanumeric()) {
        Some(name)
    } else {
        None
    }
}

pub fn component_marker(name: &str) -> String {
    format!("<!--folio-component:{name}-->")
}

fn highlight(lang: Option<&str>, content: &str, code_theme: &str) -> String {
    let plain = || format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(content));

    let Some(lang) = lang else {
        return format!("<div class=\"language-text\">{}</div>\n", plain());
    };

    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
        // Fallback mappings for unsupported languages
        match lang {
            "nix" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
            "toml" | "yml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            "sh" | "shell" | "zsh" => SYNTAX_SET.find_syntax_by_name("Bourne Again Shell (bash)"),
            _ => None,
        }
    });
    let theme = THEME_SET
        .themes
        .get(code_theme)
        .or_else(|| THEME_SET.themes.get(DEFAULT_CODE_THEME));

    let body = match (syntax, theme) {
        (Some(syntax), Some(theme)) => {
            highlighted_html_for_string(content, &SYNTAX_SET, syntax, theme)
                .unwrap_or_else(|_| plain())
        }
        _ => plain(),
    };

    let lang = html_escape::encode_double_quoted_attribute(lang);
    format!("<div class=\"language-{lang}\" data-ext=\"{lang}\">{body}</div>\n")
}
