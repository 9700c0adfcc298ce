//! Campaign message personalisation (`{{name}}`, `{{business}}`, `{{reward}}`, `{{visits}}`)

use handlebars::{no_escape, Handlebars, Template};
use serde::Serialize;

use crate::error::DomainError;

/// Values available to a campaign body.
#[derive(Debug, Clone, Serialize)]
pub struct MessageContext {
    pub name: String,
    pub business: String,
    pub reward: String,
    pub visits: i64,
}

pub struct MessageRenderer {
    text: Handlebars<'static>,
    html: Handlebars<'static>,
}

impl MessageRenderer {
    pub fn new() -> Self {
        let mut text = Handlebars::new();
        text.register_escape_fn(no_escape);
        let html = Handlebars::new();
        Self { text, html }
    }

    pub fn validate_template(&self, body: &str) -> Result<(), DomainError> {
        Template::compile(body)
            .map(|_| ())
            .map_err(|e| DomainError::ValidationError(format!("Invalid message template: {}", e)))
    }

    /// Plain text for phone messages.
    pub fn render_text(&self, body: &str, context: &MessageContext) -> Result<String, DomainError> {
        self.text
            .render_template(body, context)
            .map_err(|e| DomainError::ValidationError(format!("Unable to render message: {}", e)))
    }

    /// Escaped HTML with line breaks preserved, for email.
    pub fn render_html(&self, body: &str, context: &MessageContext) -> Result<String, DomainError> {
        self.html
            .render_template(body, context)
            .map(|rendered| rendered.replace("\r\n", "\n").replace('\n', "<br>"))
            .map_err(|e| DomainError::ValidationError(format!("Unable to render message: {}", e)))
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new()
    }
}
