// src/template.rs
use std::collections::HashMap;

use crate::error::TemplateError;

/// Renders an entity's raw argument string against the entity context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &HashMap<&str, String>) -> Result<String, TemplateError>;
}

/// Jinja-style rendering through tera. Undefined variables are an error.
pub struct TeraRenderer;

impl TemplateRenderer for TeraRenderer {
    fn render(&self, template: &str, context: &HashMap<&str, String>) -> Result<String, TemplateError> {
        let mut ctx = tera::Context::new();
        for (key, value) in context {
            ctx.insert(*key, value);
        }
        tera::Tera::one_off(template, &ctx, false).map_err(|e| TemplateError(error_chain(&e)))
    }
}

/// tera's top-level message only names the template; the cause is further down.
fn error_chain(err: &tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Renders (when needed) and splits `raw` into `expected` positional args.
/// A render failure is logged and yields no arguments.
pub fn fetch_args(
    renderer: &dyn TemplateRenderer,
    raw: &str,
    context: &HashMap<&str, String>,
    expected: usize,
) -> Vec<Option<String>> {
    let raw = raw.trim();
    let rendered = if raw.is_empty() {
        None
    } else if !raw.contains('{') {
        Some(raw.to_string())
    } else {
        match renderer.render(raw, context) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::error!("error rendering args template {raw:?}: {e}");
                None
            }
        }
    };

    let mut args: Vec<Option<String>> = rendered
        .as_deref()
        .map(|s| {
            s.split(' ')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(|a| Some(a.to_string()))
                .collect()
        })
        .unwrap_or_default();
    args.resize(expected, None);
    args
}
