//! Domain types for the notification engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::NotifyError;

/// Back-office user identifier.
pub type UserId = i32;
/// Tree entity identifier (documents, media).
pub type EntityId = i32;
/// Content item identifier.
pub type ContentId = i32;

/// A back-office user that can subscribe to content notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Only approved users receive notifications.
    pub approved: bool,
}

impl User {
    /// Create an approved user.
    pub fn new(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            approved: true,
        }
    }

    /// Set the approval flag.
    pub fn with_approved(mut self, approved: bool) -> Self {
        self.approved = approved;
        self
    }
}

/// A user's subscription to an action on an entity and, through path
/// inheritance, on all of its descendants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: UserId,
    pub entity_id: EntityId,
    pub action: String,
}

impl Subscription {
    pub fn new(user_id: UserId, entity_id: EntityId, action: impl Into<String>) -> Self {
        Self {
            user_id,
            entity_id,
            action: action.into(),
        }
    }
}

/// Entity class a subscription targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Document,
    Media,
}

/// Ordered chain of ancestor ids from the tree root down to an item.
///
/// The external representation is comma-delimited, e.g. `-1,10,100`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ContentPath(Vec<EntityId>);

impl ContentPath {
    pub fn new(ids: Vec<EntityId>) -> Self {
        Self(ids)
    }

    /// Whether the path contains the given entity id.
    pub fn contains(&self, id: EntityId) -> bool {
        self.0.contains(&id)
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.0
    }
}

impl FromStr for ContentPath {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ids = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<EntityId>()
                    .map_err(|_| NotifyError::InvalidPath(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(ids))
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// How a content type's property values vary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Variance {
    /// One shared value set.
    #[default]
    Invariant,
    /// Values differ per culture (language/region).
    Culture,
    /// Values differ per segment.
    Segment,
}

/// Per-culture state on a culture-variant content item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CultureInfo {
    pub iso_code: String,
    /// Whether this culture's values changed in the current edit.
    pub dirty: bool,
}

impl CultureInfo {
    pub fn new(iso_code: impl Into<String>, dirty: bool) -> Self {
        Self {
            iso_code: iso_code.into(),
            dirty,
        }
    }
}

/// A single content property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Property {
    /// Stable lookup key.
    pub alias: String,
    /// Display name.
    pub name: String,
    pub value: Option<String>,
}

impl Property {
    pub fn new(alias: impl Into<String>, name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
            value,
        }
    }
}

/// A content item being acted upon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Content {
    pub id: ContentId,
    pub name: String,
    pub path: ContentPath,
    pub variance: Variance,
    pub properties: Vec<Property>,
    pub cultures: Vec<CultureInfo>,
}

impl Content {
    /// Create an invariant content item.
    pub fn invariant(
        id: ContentId,
        name: impl Into<String>,
        path: ContentPath,
        properties: Vec<Property>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path,
            variance: Variance::Invariant,
            properties,
            cultures: Vec::new(),
        }
    }

    /// Create a culture-variant content item.
    pub fn variant_by_culture(
        id: ContentId,
        name: impl Into<String>,
        path: ContentPath,
        cultures: Vec<CultureInfo>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            path,
            variance: Variance::Culture,
            properties: Vec::new(),
            cultures,
        }
    }
}

/// Previous persisted state of a content item, used only for diffing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub id: ContentId,
    pub properties: Vec<Property>,
}

impl ContentSnapshot {
    pub fn new(id: ContentId, properties: Vec<Property>) -> Self {
        Self { id, properties }
    }

    /// Look up a property by alias.
    pub fn property(&self, alias: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.alias == alias)
    }
}

/// A language known to the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    pub iso_code: String,
    /// Display name, e.g. "English (United States)".
    pub name: String,
}

impl Language {
    pub fn new(iso_code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            iso_code: iso_code.into(),
            name: name.into(),
        }
    }
}

/// A composed mail message ready for the delivery queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Whether the body is HTML.
    pub html: bool,
}

/// An in-flight unit of delivery work.
///
/// The action and recipient fields exist purely for logging outcomes.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub id: Uuid,
    pub message: EmailMessage,
    pub action: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub queued_at: DateTime<Utc>,
}

impl NotificationRequest {
    pub fn new(
        message: EmailMessage,
        action: impl Into<String>,
        recipient_name: impl Into<String>,
    ) -> Self {
        let recipient_email = message.to.clone();
        Self {
            id: Uuid::new_v4(),
            message,
            action: action.into(),
            recipient_name: recipient_name.into(),
            recipient_email,
            queued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_delimited_paths() {
        let path: ContentPath = "-1,10,100".parse().unwrap();
        assert_eq!(path.ids(), &[-1, 10, 100]);
        assert_eq!(path.to_string(), "-1,10,100");
    }

    #[test]
    fn parses_paths_with_whitespace() {
        let path: ContentPath = "-1, 10, 100".parse().unwrap();
        assert_eq!(path.ids(), &[-1, 10, 100]);
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(
            "abc,10".parse::<ContentPath>(),
            Err(NotifyError::InvalidPath(_))
        ));
        assert!(matches!(
            "".parse::<ContentPath>(),
            Err(NotifyError::InvalidPath(_))
        ));
    }

    #[test]
    fn path_contains_ancestors() {
        let path = ContentPath::new(vec![-1, 10, 100]);
        assert!(path.contains(10));
        assert!(path.contains(100));
        assert!(!path.contains(99));
    }

    #[test]
    fn snapshot_property_lookup_by_alias() {
        let snapshot = ContentSnapshot::new(
            1,
            vec![Property::new("title", "Title", Some("Old".to_string()))],
        );
        assert!(snapshot.property("title").is_some());
        assert!(snapshot.property("body").is_none());
    }

    #[test]
    fn request_copies_recipient_address_from_message() {
        let message = EmailMessage {
            from: "noreply@localhost".to_string(),
            to: "editor@example.com".to_string(),
            subject: "subject".to_string(),
            body: "body".to_string(),
            html: true,
        };
        let request = NotificationRequest::new(message, "publish", "Editor");
        assert_eq!(request.recipient_email, "editor@example.com");
        assert_eq!(request.action, "publish");
    }
}
