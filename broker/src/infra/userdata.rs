//! Handlebars rendering of the instance boot script.
//!
//! The template ships inside the binary; the caller's opaque parameters are
//! the render context. Strict mode makes a missing parameter a render error
//! instead of an empty substitution that would boot a misconfigured agent.

use anyhow::{Context, Result};
use handlebars::Handlebars;

use crate::application::ports::BootScriptRenderer;

const TEMPLATE_NAME: &str = "userdata";
const USERDATA_TEMPLATE: &str = include_str!("../../templates/userdata.sh.hbs");

/// Production `BootScriptRenderer` over the embedded agent bootstrap
/// template.
pub struct HandlebarsBootScript {
    registry: Handlebars<'static>,
}

impl HandlebarsBootScript {
    /// # Errors
    ///
    /// Returns an error if the embedded template does not parse.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        // The output is a shell script, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(TEMPLATE_NAME, USERDATA_TEMPLATE)
            .context("embedded userdata template does not parse")?;
        Ok(Self { registry })
    }
}

impl BootScriptRenderer for HandlebarsBootScript {
    fn render(&self, params: &serde_json::Value) -> Result<String> {
        self.registry
            .render(TEMPLATE_NAME, params)
            .context("rendering userdata template")
    }
}
