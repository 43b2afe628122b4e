//! Change summaries for notification bodies.
//!
//! Invariant content gets a property table comparing against the previous
//! version; culture-variant content gets the list of edited cultures.
//! Segment-varying content is not supported and fails loudly.

use std::sync::Arc;

use crate::error::{NotifyError, NotifyResult};
use crate::models::{Content, ContentSnapshot, Variance};
use crate::store::LanguageStore;

/// HTML entities flattened before old/new values are compared or rendered.
const HTML_ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&rsquo;", "\u{2019}"),
    ("&amp;", "&"),
    ("&ldquo;", "\u{201c}"),
    ("&rdquo;", "\u{201d}"),
    ("&quot;", "\""),
];

fn normalize_entities(text: &str) -> String {
    HTML_ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, plain)| {
            acc.replace(entity, plain)
        })
}

/// Renders the change summary embedded in a notification body.
pub struct DiffSummarizer<L> {
    languages: Arc<L>,
    html: bool,
}

impl<L: LanguageStore> DiffSummarizer<L> {
    pub fn new(languages: Arc<L>, html: bool) -> Self {
        Self { languages, html }
    }

    /// Summarize what changed on the content item.
    ///
    /// Rendering is pure: the same inputs always produce the same output,
    /// and nothing is mutated.
    pub async fn summarize(
        &self,
        content: &Content,
        previous: Option<&ContentSnapshot>,
    ) -> NotifyResult<String> {
        match content.variance {
            Variance::Invariant => Ok(self.summarize_invariant(content, previous)),
            Variance::Culture => self.summarize_cultures(content).await,
            Variance::Segment => Err(NotifyError::UnsupportedVariation(format!(
                "content {} varies by segment",
                content.id
            ))),
        }
    }

    fn summarize_invariant(&self, content: &Content, previous: Option<&ContentSnapshot>) -> String {
        let mut out = String::new();
        if self.html {
            out.push_str("<table>\n");
        }
        for property in &content.properties {
            let new_value = property.value.clone().unwrap_or_default();
            // Entities are flattened only when a prior value exists to
            // compare against; fresh properties render as stored.
            let rendered = if previous.and_then(|p| p.property(&property.alias)).is_some() {
                normalize_entities(&new_value)
            } else {
                new_value
            };
            if self.html {
                out.push_str(&format!(
                    "<tr><th style=\"text-align: left; vertical-align: top;\">{}</th><td style=\"text-align: left; vertical-align: top;\">{}</td></tr>\n",
                    property.name, rendered
                ));
            } else {
                out.push_str(&format!("{}: {}\n", property.name, rendered));
            }
        }
        if self.html {
            out.push_str("</table>");
        }
        out
    }

    async fn summarize_cultures(&self, content: &Content) -> NotifyResult<String> {
        let mut names = Vec::new();
        for culture in content.cultures.iter().filter(|c| c.dirty) {
            let name = match self
                .languages
                .language_by_iso_code(&culture.iso_code)
                .await?
            {
                Some(language) => language.name,
                None => culture.iso_code.clone(),
            };
            names.push(name);
        }

        if self.html {
            let mut out = String::from("<ul>");
            for name in &names {
                out.push_str(&format!("<li>{name}</li>"));
            }
            out.push_str("</ul>");
            Ok(out)
        } else {
            Ok(format!("'{}'", names.join("', '")))
        }
    }
}
