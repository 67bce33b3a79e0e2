//! Handlebars templates compiled into the binary.
//!
//! `templates/pages` and `templates/contracts` render HTML with escaping;
//! `templates/email` renders plain text without it.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use rust_embed::RustEmbed;
use serde::Serialize;
use serde_json::json;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct TemplateAssets;

const SITE_NAME: &str = "Caselaw Access Project";

pub struct Templates {
    html: Handlebars<'static>,
    text: Handlebars<'static>,
}

impl Templates {
    pub fn load() -> Result<Self> {
        let mut html = Handlebars::new();
        html.set_strict_mode(false);

        let mut text = Handlebars::new();
        text.register_escape_fn(handlebars::no_escape);

        for path in TemplateAssets::iter() {
            let Some(file) = TemplateAssets::get(&path) else {
                continue;
            };
            let source = std::str::from_utf8(&file.data)
                .with_context(|| format!("Template {path} is not UTF-8"))?;

            if let Some(name) = path.strip_suffix(".html.hbs") {
                html.register_template_string(name, source)
                    .with_context(|| format!("Failed to compile template {path}"))?;
            } else if let Some(name) = path.strip_suffix(".txt.hbs") {
                text.register_template_string(name, source)
                    .with_context(|| format!("Failed to compile template {path}"))?;
            }
        }

        Ok(Self { html, text })
    }

    /// Render `pages/<name>` inside the site layout.
    pub fn render_page<T: Serialize>(
        &self,
        name: &str,
        title: &str,
        nav: &NavContext,
        data: &T,
    ) -> Result<String> {
        let content = self
            .html
            .render(&format!("pages/{name}"), data)
            .with_context(|| format!("Failed to render page {name}"))?;

        self.html
            .render(
                "pages/layout",
                &json!({
                    "title": format!("{title} | {SITE_NAME}"),
                    "content": content,
                    "nav": nav,
                }),
            )
            .context("Failed to render layout")
    }

    /// Render `contracts/<name>`; the result is stored on the contract record.
    pub fn render_contract<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        self.html
            .render(&format!("contracts/{name}"), data)
            .with_context(|| format!("Failed to render contract {name}"))
    }

    /// Render the plain-text body `email/<name>`.
    pub fn render_email<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        self.text
            .render(&format!("email/{name}"), data)
            .with_context(|| format!("Failed to render email {name}"))
    }
}

/// Signed-in state shown in the page header.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NavContext {
    pub signed_in: bool,
    pub email: Option<String>,
}
