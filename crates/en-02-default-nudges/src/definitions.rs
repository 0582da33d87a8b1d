//! Catalogue of well-known nudges.

use chrono::{DateTime, Duration, Utc};
use shared_types::{
    new_id, Action, ActionType, Flavour, Handling, Link, LinkType, NotificationBody, Nudge,
    Status, Visibility, STATIC_BASE,
};

pub const ADD_PRIMARY_EMAIL_TITLE: &str = "Add Primary Email Address";
pub const ADD_INSURANCE_TITLE: &str = "Add Insurance";
pub const ADD_NHIF_TITLE: &str = "Add NHIF";
pub const PARTNER_ACCOUNT_SETUP_TITLE: &str = "Setup your partner account";

pub const VERIFY_EMAIL_ACTION: &str = "VERIFY_EMAIL";
pub const PARTNER_ACCOUNT_SETUP_ACTION: &str = "PARTNER_ACCOUNT_SETUP";

/// Titles that may be resolved by title. Only some are seeded.
pub const KNOWN_TITLES: [&str; 4] = [
    ADD_PRIMARY_EMAIL_TITLE,
    ADD_INSURANCE_TITLE,
    ADD_NHIF_TITLE,
    PARTNER_ACCOUNT_SETUP_TITLE,
];

/// Default content lives for a century of leap years.
pub const DEFAULT_EXPIRY_HOURS: i64 = 878_400;

/// Blank icon carried by embedded actions.
pub fn blank_icon() -> Link {
    let url = format!("{STATIC_BASE}/1px.png");
    Link {
        id: new_id(),
        url: url.clone(),
        link_type: LinkType::PngImage,
        title: "Blank Image".to_string(),
        description: "Default Blank Image".to_string(),
        thumbnail: url,
    }
}

/// Builds an action meant to be embedded in an item or nudge.
pub fn local_action(
    name: &str,
    action_type: ActionType,
    handling: Handling,
    allow_anonymous: bool,
) -> Action {
    Action {
        id: new_id(),
        sequence_number: 1,
        name: name.to_string(),
        action_type,
        handling,
        allow_anonymous,
        icon: blank_icon(),
    }
}

pub fn default_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(DEFAULT_EXPIRY_HOURS)
}

/// Stable ID for a default nudge, derived from its title.
///
/// Concurrent seeders therefore race on one document and the store's
/// create-if-absent write picks a single winner.
pub fn default_nudge_id(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    format!("default-nudge-{}", slug.trim_matches('-'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultNudgeDefinition {
    pub title: &'static str,
    pub text: &'static str,
    pub action_name: &'static str,
    /// Path of the nudge image below the static asset base.
    pub image_path: &'static str,
    pub resolve_message: &'static str,
}

pub const VERIFY_EMAIL: DefaultNudgeDefinition = DefaultNudgeDefinition {
    title: ADD_PRIMARY_EMAIL_TITLE,
    text: "Please add and verify your primary email address",
    action_name: VERIFY_EMAIL_ACTION,
    image_path: "/nudges/verify_email.png",
    resolve_message: "Thank you for adding your primary email address.",
};

pub const PARTNER_ACCOUNT_SETUP: DefaultNudgeDefinition = DefaultNudgeDefinition {
    title: PARTNER_ACCOUNT_SETUP_TITLE,
    text: "Create a partner account to begin transacting on Be.Well",
    action_name: PARTNER_ACCOUNT_SETUP_ACTION,
    image_path: "/nudges/complete_profile.png",
    resolve_message: "Thank you for setting up your partner set up account.",
};

const CONSUMER_NUDGES: [DefaultNudgeDefinition; 1] = [VERIFY_EMAIL];
const PRO_NUDGES: [DefaultNudgeDefinition; 2] = [PARTNER_ACCOUNT_SETUP, VERIFY_EMAIL];

/// Nudges seeded into a fresh feed, in seeding order.
pub fn definitions_for(flavour: Flavour) -> &'static [DefaultNudgeDefinition] {
    match flavour {
        Flavour::Consumer => &CONSUMER_NUDGES,
        Flavour::Pro => &PRO_NUDGES,
    }
}

impl DefaultNudgeDefinition {
    pub fn image_url(&self) -> String {
        format!("{STATIC_BASE}{}", self.image_path)
    }

    /// Materialises the nudge for one user.
    pub fn build(&self, uid: &str, now: DateTime<Utc>) -> Nudge {
        let image = self.image_url();
        Nudge {
            id: default_nudge_id(self.title),
            sequence_number: 1,
            visibility: Visibility::Show,
            status: Status::Pending,
            expiry: default_expiry(now),
            title: self.title.to_string(),
            text: self.text.to_string(),
            links: vec![Link {
                id: new_id(),
                url: image.clone(),
                link_type: LinkType::PngImage,
                title: self.title.to_string(),
                description: self.text.to_string(),
                thumbnail: image,
            }],
            actions: vec![local_action(
                self.action_name,
                ActionType::Primary,
                Handling::FullPage,
                false,
            )],
            users: vec![uid.to_string()],
            groups: Vec::new(),
            notification_channels: Vec::new(),
            notification_body: NotificationBody {
                resolve_message: self.resolve_message.to_string(),
                ..Default::default()
            },
        }
    }
}
