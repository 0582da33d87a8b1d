//! # Core Domain Entities
//!
//! Feed elements and their enums. Field names serialize in camelCase and
//! enum values in SCREAMING_SNAKE_CASE, which is the wire format consumed by
//! every client and topic subscriber.

use crate::errors::{EngagementError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Declares a closed string enum with its wire name, `Display` and a
/// case-insensitive `FromStr` that fails with a validation error.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $wire)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EngagementError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        EngagementError::validation(format!(
                            "{wanted:?} is not a valid {}",
                            stringify!($name)
                        ))
                    })
            }
        }
    };
}

wire_enum! {
    /// Audience partition. Every element and feed belongs to exactly one.
    Flavour {
        Consumer => "CONSUMER",
        Pro => "PRO",
    }
}

wire_enum! {
    Status {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Done => "DONE",
    }
}

wire_enum! {
    Visibility {
        Show => "SHOW",
        Hide => "HIDE",
    }
}

wire_enum! {
    /// Outbound notification channel an element may be fanned out to.
    Channel {
        Fcm => "FCM",
        Email => "EMAIL",
        Sms => "SMS",
        Whatsapp => "WHATSAPP",
    }
}

wire_enum! {
    ActionType {
        Primary => "PRIMARY",
        Secondary => "SECONDARY",
        Overflow => "OVERFLOW",
        /// Only permitted on global actions.
        Floating => "FLOATING",
    }
}

wire_enum! {
    Handling {
        Inline => "INLINE",
        FullPage => "FULL_PAGE",
    }
}

wire_enum! {
    LinkType {
        PngImage => "PNG_IMAGE",
        PdfDocument => "PDF_DOCUMENT",
        YoutubeVideo => "YOUTUBE_VIDEO",
        SvgImage => "SVG_IMAGE",
        Default => "DEFAULT",
    }
}

wire_enum! {
    TextType {
        Plain => "PLAIN",
        Markdown => "MARKDOWN",
        Html => "HTML",
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Pending
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Show
    }
}

impl Default for ActionType {
    fn default() -> Self {
        ActionType::Primary
    }
}

impl Default for Handling {
    fn default() -> Self {
        Handling::Inline
    }
}

impl Default for LinkType {
    fn default() -> Self {
        LinkType::Default
    }
}

impl Default for TextType {
    fn default() -> Self {
        TextType::Plain
    }
}

/// Generates a fresh element identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A link to rich media attached to an item, nudge or action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub url: String,
    pub link_type: LinkType,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
}

/// A user-triggerable action, global or embedded in an item or nudge.
///
/// Actions are immutable once published, except for the inverse renaming
/// applied to embedded actions when their parent transitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub sequence_number: i64,
    pub name: String,
    pub action_type: ActionType,
    pub handling: Handling,
    pub allow_anonymous: bool,
    pub icon: Link,
}

/// Who, where and when an event was emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub flavour: Option<Flavour>,
    #[serde(rename = "organizationID")]
    pub organization_id: String,
    #[serde(rename = "locationID")]
    pub location_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    pub data: HashMap<String, serde_json::Value>,
}

/// An observational event reported by a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub context: Context,
    pub payload: Payload,
}

/// Per-transition notification copy for a nudge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationBody {
    pub publish_message: String,
    pub delete_message: String,
    pub resolve_message: String,
    pub unresolve_message: String,
    pub show_message: String,
    pub hide_message: String,
}

/// A short prompt asking the user to do something.
///
/// `title` doubles as a uniqueness key among PENDING nudges of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Nudge {
    pub id: String,
    pub sequence_number: i64,
    pub visibility: Visibility,
    pub status: Status,
    pub expiry: DateTime<Utc>,
    pub title: String,
    pub text: String,
    pub links: Vec<Link>,
    pub actions: Vec<Action>,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub notification_channels: Vec<Channel>,
    pub notification_body: NotificationBody,
}

impl Nudge {
    /// The image shown with this nudge: the last link's thumbnail, or its URL.
    pub fn image_url(&self) -> Option<&str> {
        self.links.last().map(|link| {
            if link.thumbnail.is_empty() {
                link.url.as_str()
            } else {
                link.thumbnail.as_str()
            }
        })
    }
}

/// A conversational message attached to an item.
///
/// `reply_to` is a soft reference to another message ID in the same thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sequence_number: i64,
    pub text: String,
    pub reply_to: String,
    #[serde(rename = "postedByUID")]
    pub posted_by_uid: String,
    pub posted_by_name: String,
    pub timestamp: DateTime<Utc>,
}

/// A feed item: rich content with an optional conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub sequence_number: i64,
    pub expiry: DateTime<Utc>,
    pub persistent: bool,
    pub pinned: bool,
    pub status: Status,
    pub visibility: Visibility,
    pub icon: Link,
    pub author: String,
    pub tagline: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub text: String,
    pub text_type: TextType,
    pub links: Vec<Link>,
    pub actions: Vec<Action>,
    pub conversations: Vec<Message>,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub notification_channels: Vec<Channel>,
}

/// A user's materialized feed for one flavour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: String,
    pub sequence_number: i64,
    pub uid: String,
    pub flavour: Flavour,
    pub is_anonymous: bool,
    pub actions: Vec<Action>,
    pub nudges: Vec<Nudge>,
    pub items: Vec<Item>,
}

impl Feed {
    /// The feed identifier: `{uid}|{flavour}`.
    pub fn compute_id(uid: &str, flavour: Flavour) -> String {
        format!("{uid}|{flavour}")
    }

    /// An empty feed stamped with the given read time.
    pub fn empty(uid: &str, flavour: Flavour, is_anonymous: bool, read_at: i64) -> Self {
        Self {
            id: Self::compute_id(uid, flavour),
            sequence_number: read_at,
            uid: uid.to_string(),
            flavour,
            is_anonymous,
            actions: Vec::new(),
            nudges: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.nudges.is_empty() && self.items.is_empty()
    }
}

/// Extra feed filters supplied by clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub labels: Vec<String>,
}
