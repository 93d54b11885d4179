use tera::{Context, Tera};

/// Tera-backed engine holding named prompt templates.
pub struct TeraEngine {
    tera: Tera,
}

impl TeraEngine {
    /// Empty engine; templates are registered from strings.
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
        }
    }

    /// Register (or replace) a template. Names without an `.html` suffix are
    /// rendered without autoescaping.
    pub fn add_template(&mut self, name: &str, content: &str) -> anyhow::Result<()> {
        self.tera.add_raw_template(name, content)?;
        Ok(())
    }

    pub fn render(&self, template_name: &str, context: &Context) -> anyhow::Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

impl Default for TeraEngine {
    fn default() -> Self {
        Self::new()
    }
}
