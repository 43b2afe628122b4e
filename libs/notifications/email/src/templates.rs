//! Handlebars notification templates.
//!
//! Two registries back the engine's template seam: an escaping one for
//! HTML bodies and a non-escaping one for subjects and plain-text bodies.
//! The change summary arrives pre-rendered, so both templates insert it
//! with a triple-stash.

use handlebars::Handlebars;

use notify_engine::{
    BodyParams, NotificationTemplates, NotifyError, NotifyResult, SubjectParams, User,
};

const SUBJECT_TEMPLATE: &str = "[{{site_url}}] {{action}}: {{content_name}}";

const BODY_HTML_TEMPLATE: &str = r#"<p>Dear {{recipient_name}},</p>
<p>The task <strong>{{action}}</strong> was performed on <a href="{{edit_url}}">{{content_name}}</a> (id {{content_id}}) by {{acting_user_name}}.</p>
{{{summary}}}
<p><a href="{{edit_url}}">Edit this item</a></p>
"#;

const BODY_TEXT_TEMPLATE: &str = r#"Dear {{recipient_name}},

The task '{{action}}' was performed on '{{content_name}}' (id {{content_id}}) by {{acting_user_name}}.

{{{summary}}}

Edit: {{edit_url}}
"#;

/// Handlebars-backed implementation of the engine's template seam, with
/// overridable defaults.
pub struct HandlebarsTemplates {
    html: Handlebars<'static>,
    text: Handlebars<'static>,
}

impl HandlebarsTemplates {
    /// Create the template set with the default subject and bodies.
    pub fn new() -> NotifyResult<Self> {
        let html = Handlebars::new();
        let mut text = Handlebars::new();
        text.register_escape_fn(handlebars::no_escape);

        let mut templates = Self { html, text };
        templates.register_subject(SUBJECT_TEMPLATE)?;
        templates.register_body_html(BODY_HTML_TEMPLATE)?;
        templates.register_body_text(BODY_TEXT_TEMPLATE)?;
        Ok(templates)
    }

    /// Replace the subject template.
    pub fn register_subject(&mut self, template: &str) -> NotifyResult<()> {
        self.text
            .register_template_string("subject", template)
            .map_err(|e| NotifyError::Template(format!("invalid subject template: {e}")))
    }

    /// Replace the HTML body template.
    pub fn register_body_html(&mut self, template: &str) -> NotifyResult<()> {
        self.html
            .register_template_string("body_html", template)
            .map_err(|e| NotifyError::Template(format!("invalid HTML body template: {e}")))
    }

    /// Replace the plain-text body template.
    pub fn register_body_text(&mut self, template: &str) -> NotifyResult<()> {
        self.text
            .register_template_string("body_text", template)
            .map_err(|e| NotifyError::Template(format!("invalid text body template: {e}")))
    }
}

impl NotificationTemplates for HandlebarsTemplates {
    fn render_subject(&self, _recipient: &User, params: &SubjectParams) -> NotifyResult<String> {
        self.text
            .render("subject", params)
            .map_err(|e| NotifyError::Template(format!("subject rendering failed: {e}")))
    }

    fn render_body(
        &self,
        _recipient: &User,
        params: &BodyParams,
        html: bool,
    ) -> NotifyResult<String> {
        if html {
            self.html
                .render("body_html", params)
                .map_err(|e| NotifyError::Template(format!("HTML body rendering failed: {e}")))
        } else {
            self.text
                .render("body_text", params)
                .map_err(|e| NotifyError::Template(format!("text body rendering failed: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> User {
        User::new(2, "Reviewer", "reviewer@example.com")
    }

    fn subject_params() -> SubjectParams {
        SubjectParams {
            site_url: "example.com/admin".to_string(),
            action: "Publish".to_string(),
            content_name: "Ben's page".to_string(),
        }
    }

    fn body_params(summary: &str) -> BodyParams {
        BodyParams {
            recipient_name: "Reviewer".to_string(),
            action: "Publish".to_string(),
            content_name: "Home".to_string(),
            content_id: 100,
            edit_url: "http://example.com/admin/content/edit/100".to_string(),
            acting_user_name: "Editor".to_string(),
            site_url: "example.com/admin".to_string(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn renders_default_subject_without_escaping() {
        let templates = HandlebarsTemplates::new().unwrap();

        let subject = templates
            .render_subject(&recipient(), &subject_params())
            .unwrap();

        assert_eq!(subject, "[example.com/admin] Publish: Ben's page");
    }

    #[test]
    fn html_body_embeds_summary_unescaped() {
        let templates = HandlebarsTemplates::new().unwrap();
        let summary = "<table>\n<tr><th>Title</th><td>New</td></tr>\n</table>";

        let body = templates
            .render_body(&recipient(), &body_params(summary), true)
            .unwrap();

        assert!(body.contains("Dear Reviewer,"));
        assert!(body.contains(summary));
        assert!(body.contains(
            "<a href=\"http://example.com/admin/content/edit/100\">Home</a>"
        ));
    }

    #[test]
    fn text_body_keeps_quotes_unescaped() {
        let templates = HandlebarsTemplates::new().unwrap();

        let body = templates
            .render_body(&recipient(), &body_params("'English (United States)'"), false)
            .unwrap();

        assert!(body.contains("'English (United States)'"));
        assert!(body.contains("The task 'Publish' was performed on 'Home'"));
        assert!(!body.contains("&#x27;"));
    }

    #[test]
    fn custom_templates_replace_defaults() {
        let mut templates = HandlebarsTemplates::new().unwrap();
        templates.register_subject("{{action}}!").unwrap();
        templates
            .register_body_text("{{content_name}} changed")
            .unwrap();

        let subject = templates
            .render_subject(&recipient(), &subject_params())
            .unwrap();
        let body = templates
            .render_body(&recipient(), &body_params(""), false)
            .unwrap();

        assert_eq!(subject, "Publish!");
        assert_eq!(body, "Home changed");
    }

    #[test]
    fn invalid_template_is_rejected() {
        let mut templates = HandlebarsTemplates::new().unwrap();

        let result = templates.register_subject("{{#if}}");

        assert!(matches!(result, Err(NotifyError::Template(_))));
    }
}
