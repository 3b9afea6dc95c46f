use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tera::Context;

use crate::markdown::component_marker;
use crate::template::{TemplateError, TemplateRenderer};

/// Components every site can use.
const BUILTIN_COMPONENTS: &[(&str, &str)] = &[
    ("BlogIndex", "components/blog_index.html"),
    ("AboutCard", "components/about_card.html"),
];

/// Per-page values layered over the renderer's global context.
#[derive(Default)]
pub struct RenderContext {
    context: Context,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_to_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.context.insert(key, value);
    }
}

pub struct Renderer {
    templates: TemplateRenderer,
    global: Context,
    components: BTreeMap<String, String>,
}

impl Renderer {
    pub fn new(theme_dir: Option<&Path>) -> Result<Self, TemplateError> {
        let components = BUILTIN_COMPONENTS
            .iter()
            .map(|(name, template)| (name.to_string(), template.to_string()))
            .collect();

        Ok(Self {
            templates: TemplateRenderer::new(theme_dir)?,
            global: Context::new(),
            components,
        })
    }

    pub fn set_global_context<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) {
        self.global.insert(key, value);
    }

    /// Register `<Name />` to render `template`.
    pub fn register_component(&mut self, name: &str, template: &str) {
        self.components.insert(name.to_string(), template.to_string());
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.has_template(name)
    }

    pub fn render(&self, template: &str, context: &RenderContext) -> Result<String, TemplateError> {
        let mut merged = self.global.clone();
        merged.extend(context.context.clone());
        self.templates.render(template, &merged)
    }

    /// Replace component placeholders in `html` with their rendered templates.
    pub fn render_components(
        &self,
        html: &str,
        used: &[String],
        context: &RenderContext,
    ) -> Result<String, TemplateError> {
        let mut out = html.to_string();
        let mut seen: Vec<&str> = Vec::new();

        for name in used {
            if seen.contains(&name.as_str()) {
                continue;
            }
            seen.push(name);

            let marker = component_marker(name);
            let rendered = match self.components.get(name) {
                Some(template) => self.render(template, context)?,
                None => {
                    warn!("theme"; "unknown component <{} />", name);
                    String::new()
                }
            };
            out = out.replace(&marker, &rendered);
        }

        Ok(out)
    }
}
