//! # Element Validation
//!
//! Every element is validated and marshalled through [`Element`] before it is
//! persisted or published. Validation never has side effects.

use crate::entities::{Action, ActionType, Event, Item, Link, LinkType, Message, Nudge};
use crate::errors::{EngagementError, Result};
use serde::Serialize;
use std::fmt;
use url::Url;

/// The element families carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Item,
    Nudge,
    Action,
    Message,
    Event,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Item => "item",
            ElementKind::Nudge => "nudge",
            ElementKind::Action => "action",
            ElementKind::Message => "message",
            ElementKind::Event => "event",
        };
        f.write_str(name)
    }
}

/// Object-safe view over every publishable element.
pub trait Element: Send + Sync {
    fn kind(&self) -> ElementKind;

    fn element_id(&self) -> &str;

    /// Events carry no sequence number and report 1.
    fn sequence_number(&self) -> i64;

    /// Schema checks. Must not mutate or touch I/O.
    fn validate(&self) -> Result<()>;

    /// Serializes to JSON bytes without validating.
    fn marshal(&self) -> Result<Vec<u8>>;

    /// Validates, then serializes to JSON bytes.
    fn validate_and_marshal(&self) -> Result<Vec<u8>> {
        self.validate()?;
        self.marshal()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(EngagementError::from)
}

fn require(kind: ElementKind, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EngagementError::validation(format!(
            "{kind} {field} is required"
        )));
    }
    Ok(())
}

fn require_identity(kind: ElementKind, id: &str, sequence_number: i64) -> Result<()> {
    require(kind, "id", id)?;
    if sequence_number < 1 {
        return Err(EngagementError::validation(format!(
            "{kind} {id} has invalid sequence number {sequence_number}"
        )));
    }
    Ok(())
}

/// Checks a link's URL against its declared type.
pub fn validate_link(link: &Link) -> Result<()> {
    let parsed = Url::parse(&link.url)
        .map_err(|e| EngagementError::validation(format!("invalid link url {:?}: {e}", link.url)))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(EngagementError::validation(format!(
            "link url {:?} must be http or https",
            link.url
        )));
    }

    let lower = link.url.to_ascii_lowercase();
    let ok = match link.link_type {
        LinkType::PngImage => lower.contains(".png"),
        LinkType::PdfDocument => lower.contains(".pdf"),
        LinkType::SvgImage => lower.contains(".svg"),
        LinkType::YoutubeVideo => matches!(
            parsed.host_str(),
            Some(host) if host.ends_with("youtube.com") || host.ends_with("youtu.be")
        ),
        LinkType::Default => true,
    };
    if !ok {
        return Err(EngagementError::validation(format!(
            "{:?} is not a valid {} link",
            link.url, link.link_type
        )));
    }
    Ok(())
}

fn validate_embedded_actions(kind: ElementKind, actions: &[Action]) -> Result<()> {
    for action in actions {
        if action.action_type == ActionType::Floating {
            return Err(EngagementError::validation(format!(
                "{kind} action {:?}: floating actions are only allowed at the global level",
                action.name
            )));
        }
        action.validate()?;
    }
    Ok(())
}

impl Element for Action {
    fn kind(&self) -> ElementKind {
        ElementKind::Action
    }

    fn element_id(&self) -> &str {
        &self.id
    }

    fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    fn validate(&self) -> Result<()> {
        require_identity(ElementKind::Action, &self.id, self.sequence_number)?;
        require(ElementKind::Action, "name", &self.name)?;
        if !self.icon.url.is_empty() {
            validate_link(&self.icon)?;
        }
        Ok(())
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        to_json(self)
    }
}

impl Element for Nudge {
    fn kind(&self) -> ElementKind {
        ElementKind::Nudge
    }

    fn element_id(&self) -> &str {
        &self.id
    }

    fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    fn validate(&self) -> Result<()> {
        require_identity(ElementKind::Nudge, &self.id, self.sequence_number)?;
        require(ElementKind::Nudge, "title", &self.title)?;
        require(ElementKind::Nudge, "text", &self.text)?;
        self.links.iter().try_for_each(validate_link)?;
        validate_embedded_actions(ElementKind::Nudge, &self.actions)
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        to_json(self)
    }
}

impl Element for Message {
    fn kind(&self) -> ElementKind {
        ElementKind::Message
    }

    fn element_id(&self) -> &str {
        &self.id
    }

    fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    fn validate(&self) -> Result<()> {
        require_identity(ElementKind::Message, &self.id, self.sequence_number)?;
        require(ElementKind::Message, "text", &self.text)?;
        require(ElementKind::Message, "postedByUID", &self.posted_by_uid)?;
        if self.reply_to == self.id {
            return Err(EngagementError::validation(format!(
                "message {} cannot reply to itself",
                self.id
            )));
        }
        Ok(())
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        to_json(self)
    }
}

impl Element for Item {
    fn kind(&self) -> ElementKind {
        ElementKind::Item
    }

    fn element_id(&self) -> &str {
        &self.id
    }

    fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    fn validate(&self) -> Result<()> {
        require_identity(ElementKind::Item, &self.id, self.sequence_number)?;
        require(ElementKind::Item, "tagline", &self.tagline)?;
        require(ElementKind::Item, "summary", &self.summary)?;
        if self.icon.link_type != LinkType::PngImage {
            return Err(EngagementError::validation(format!(
                "item {} icon must be a {} link",
                self.id,
                LinkType::PngImage
            )));
        }
        validate_link(&self.icon)?;
        self.links.iter().try_for_each(validate_link)?;
        validate_embedded_actions(ElementKind::Item, &self.actions)?;
        self.conversations.iter().try_for_each(|m| m.validate())
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        to_json(self)
    }
}

impl Element for Event {
    fn kind(&self) -> ElementKind {
        ElementKind::Event
    }

    fn element_id(&self) -> &str {
        &self.id
    }

    fn sequence_number(&self) -> i64 {
        1
    }

    fn validate(&self) -> Result<()> {
        require(ElementKind::Event, "id", &self.id)?;
        require(ElementKind::Event, "name", &self.name)?;
        require(ElementKind::Event, "context.userID", &self.context.user_id)
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        to_json(self)
    }
}
