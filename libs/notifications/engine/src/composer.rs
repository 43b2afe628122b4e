//! Message composition.
//!
//! The composer shapes template parameters, invokes the host-supplied
//! templates, and hands back a queueable request. It never sends anything.

use serde::Serialize;
use url::Url;

use crate::config::NotificationConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::models::{Content, ContentId, EmailMessage, NotificationRequest, User};

/// Parameters handed to the subject template.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectParams {
    /// Site authority plus the back-office path, e.g. `example.com/admin`.
    pub site_url: String,
    pub action: String,
    pub content_name: String,
}

/// Parameters handed to the body template.
#[derive(Debug, Clone, Serialize)]
pub struct BodyParams {
    pub recipient_name: String,
    pub action: String,
    pub content_name: String,
    pub content_id: ContentId,
    /// Absolute back-office edit link for the content item.
    pub edit_url: String,
    pub acting_user_name: String,
    /// Site authority plus the back-office path, e.g. `example.com/admin`.
    pub site_url: String,
    /// Pre-rendered change summary, HTML or plain text to match the body.
    pub summary: String,
}

/// Host-supplied subject and body templates.
///
/// Templating is an external collaborator; the composer only guarantees the
/// shape of the parameters and that `html` matches the summary's rendering.
pub trait NotificationTemplates: Send + Sync {
    fn render_subject(&self, recipient: &User, params: &SubjectParams) -> NotifyResult<String>;

    fn render_body(&self, recipient: &User, params: &BodyParams, html: bool)
    -> NotifyResult<String>;
}

/// Turns a (recipient, content, summary) triple into a queueable request.
pub struct MailComposer {
    sender: String,
    admin_path: String,
    use_https: bool,
    html: bool,
}

impl MailComposer {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            sender: config.sender_address.clone(),
            admin_path: config.admin_path.clone(),
            use_https: config.use_https,
            html: !config.disable_html_email,
        }
    }

    pub fn compose(
        &self,
        acting_user: &User,
        recipient: &User,
        content: &Content,
        summary: String,
        action_name: &str,
        site_url: &Url,
        templates: &dyn NotificationTemplates,
    ) -> NotifyResult<NotificationRequest> {
        let authority = site_authority(site_url)?;
        let site_path = format!("{authority}{}", self.admin_path);
        let scheme = if self.use_https { "https" } else { "http" };
        let edit_url = format!(
            "{scheme}://{authority}{}/content/edit/{}",
            self.admin_path, content.id
        );

        let subject_params = SubjectParams {
            site_url: site_path.clone(),
            action: action_name.to_string(),
            content_name: content.name.clone(),
        };
        let body_params = BodyParams {
            recipient_name: recipient.name.clone(),
            action: action_name.to_string(),
            content_name: content.name.clone(),
            content_id: content.id,
            edit_url,
            acting_user_name: acting_user.name.clone(),
            site_url: site_path,
            summary,
        };

        let subject = templates.render_subject(recipient, &subject_params)?;
        let mut body = templates.render_body(recipient, &body_params, self.html)?;
        if self.use_https {
            // Host-qualified rewrite; unrelated external links stay
            // untouched.
            body = body.replace(
                &format!("http://{authority}"),
                &format!("https://{authority}"),
            );
        }

        let message = EmailMessage {
            from: self.sender.clone(),
            to: recipient.email.clone(),
            subject,
            body,
            html: self.html,
        };
        Ok(NotificationRequest::new(
            message,
            action_name,
            recipient.name.clone(),
        ))
    }
}

fn site_authority(site_url: &Url) -> NotifyResult<String> {
    let host = site_url
        .host_str()
        .ok_or_else(|| NotifyError::InvalidInput(format!("site url has no host: {site_url}")))?;
    Ok(match site_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
