//! Tera rendering engine for the environment config file.
//!
//! For every environment the output carries a section
//!
//! ```text
//! [<local>]
//! modulepath=$confdir/environments/<local>/modules
//! manifest=$confdir/environments/<local>/manifests/site.pp
//! ```
//!
//! preceded by the verbatim base config.

use tera::Tera;

use envsync_core::LocalName;

use crate::context::ConfigContext;
use crate::error::RenderError;

const CONFIG_TEMPLATE_NAME: &str = "puppet.conf.tera";
const CONFIG_TEMPLATE: &str = include_str!("templates/puppet.conf.tera");

/// Renderer with the embedded template. Create once with [`Renderer::new`] and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(CONFIG_TEMPLATE_NAME, CONFIG_TEMPLATE)?;
        Ok(Renderer { tera })
    }

    pub fn render_with_context(&self, ctx: &ConfigContext) -> Result<String, RenderError> {
        let rendered = self
            .tera
            .render(CONFIG_TEMPLATE_NAME, &ctx.to_tera_context()?)?;
        Ok(rendered.replace("\r\n", "\n"))
    }

    pub fn render(&self, base: Option<&str>, environments: &[LocalName]) -> Result<String, RenderError> {
        self.render_with_context(&ConfigContext::new(base, environments))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
