//! Default feed content: the flavour's global actions and the welcome item.
//!
//! Every default element has a deterministic ID so concurrent first reads
//! converge on a single copy.

use chrono::{DateTime, Utc};
use en_01_lifecycle::domain::transitions::{HIDE_ITEM_ACTION, PIN_ITEM_ACTION, RESOLVE_ITEM_ACTION};
use en_02_default_nudges::definitions::{default_expiry, local_action};
use shared_types::{
    Action, ActionType, Flavour, Handling, Item, Link, LinkType, Message, Status, TextType,
    Visibility, DEFAULT_ICON_PATH, DEFAULT_LABEL, STATIC_BASE,
};

pub const WELCOME_ITEM_ID: &str = "default-item-welcome";
pub const DEFAULT_AUTHOR: &str = "Be.Well Team";
pub const DEFAULT_POSTED_BY_UID: &str = "hOcaUv8dqqgmWYf9HEhjdudgf0b2";

struct GlobalAction {
    name: &'static str,
    action_type: ActionType,
    icon: &'static str,
    title: &'static str,
    description: &'static str,
}

const CONSUMER_ACTIONS: [GlobalAction; 4] = [
    GlobalAction {
        name: "GET_INSURANCE",
        action_type: ActionType::Primary,
        icon: "/actions/svg/buy_cover.svg",
        title: "Buy Cover",
        description: "Buy medical insurance",
    },
    GlobalAction {
        name: "GET_TEST",
        action_type: ActionType::Primary,
        icon: "/actions/svg/get_tested.svg",
        title: "Get tests",
        description: "Get diagnostic tests",
    },
    GlobalAction {
        name: "GET_MEDICINE",
        action_type: ActionType::Primary,
        icon: "/actions/svg/medicine.svg",
        title: "Get Medicine",
        description: "Get medicines",
    },
    GlobalAction {
        name: "GET_CONSULTATION",
        action_type: ActionType::Primary,
        icon: "/actions/svg/see_doctor.svg",
        title: "See Doctor",
        description: "See a doctor",
    },
];

const PRO_ACTIONS: [GlobalAction; 2] = [
    GlobalAction {
        name: "ADD_PATIENT",
        action_type: ActionType::Primary,
        icon: "/actions/svg/add_user.svg",
        title: "Register patient",
        description: "Register a patient",
    },
    GlobalAction {
        name: "SEARCH_PATIENT",
        action_type: ActionType::Secondary,
        icon: "/actions/svg/search_user.svg",
        title: "Search a patient",
        description: "Search for a patient",
    },
];

fn slug(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

/// Global actions shown on every feed of the flavour.
pub fn global_actions(flavour: Flavour) -> Vec<Action> {
    let catalogue: &[GlobalAction] = match flavour {
        Flavour::Consumer => &CONSUMER_ACTIONS,
        Flavour::Pro => &PRO_ACTIONS,
    };
    catalogue
        .iter()
        .map(|a| {
            let url = format!("{STATIC_BASE}{}", a.icon);
            Action {
                id: format!("default-action-{}", slug(a.name)),
                sequence_number: 1,
                name: a.name.to_string(),
                action_type: a.action_type,
                handling: Handling::FullPage,
                allow_anonymous: false,
                icon: Link {
                    id: format!("default-action-icon-{}", slug(a.name)),
                    url: url.clone(),
                    link_type: LinkType::SvgImage,
                    title: a.title.to_string(),
                    description: a.description.to_string(),
                    thumbnail: url,
                },
            }
        })
        .collect()
}

fn welcome_videos(flavour: Flavour) -> Vec<Link> {
    if flavour == Flavour::Pro {
        return Vec::new();
    }
    let thumbnail = format!("{STATIC_BASE}/items/videos/thumbs/01_lead.png");
    [
        (
            "https://youtu.be/-mlr9rjRXmc",
            " View your health insurance cover benefits on your Be.Well app.",
        ),
        (
            "https://youtu.be/-iSB8yrSIps",
            "How to add your health insurance cover to your Be.Well app.",
        ),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (url, description))| Link {
        id: format!("welcome-video-{}", i + 1),
        url: url.to_string(),
        link_type: LinkType::YoutubeVideo,
        title: "Slade 360".to_string(),
        description: description.to_string(),
        thumbnail: thumbnail.clone(),
    })
    .collect()
}

/// `(posted by, text, index of the message replied to)`.
type ThreadLine = (&'static str, &'static str, Option<usize>);

const CONSUMER_THREAD: [ThreadLine; 10] = [
    ("Be.Well", "Welcome to Be.Well. We are glad to meet you!", None),
    ("Medications Service", "I'm the medications service. I'll ensure that you get quality and affordable medications, on time. 👋!", Some(0)),
    ("Delivery Assistant", "I'm the delivery assistant. I help the medications service get medicines to you on time. 👋!", Some(1)),
    ("Dispensing Assistant", "I'm the dispensing assistant. I help your preferred pharmacy prepare your order before you go for it. 👋!", Some(1)),
    ("Tests Service", "I'm the tests service. I'll ensure that you get quality and affordable diagnostic tests. 👋!", Some(0)),
    ("Consultations Service", "I'm the consultations service. I'll ensure that you can get in-person or remote(tele) advice from qualified medical professionals. 👋!", Some(0)),
    ("Teleconsultations Assistant", "I'm the teleconsultations assistant. I'll ensure that you can reach a qualified medical professional via video or audio conference, whenever you need to. If you have an emergency, I'll help you find the nearest hospital for emergencies. 👋!", Some(5)),
    ("Booking Assistant", "I'm the booking assistant. I'll help you book appointments for your care and remind you when it's time. 👋!", Some(5)),
    ("Insurance Service", "I'm the insurance service. I'll get you great quotes for medical cover and assist you when you need to use your insurance. 👋!", Some(0)),
    ("Reminders Service", "I'm the reminders service. I'll help you remember things related to your health. It could be an appointment or when you need to take some medication etc. Try me 👋!", Some(0)),
];

const PRO_THREAD: [ThreadLine; 9] = [
    ("Be.Well", "Welcome to Be.Well. We are glad to meet you!", None),
    ("Medications Service", "I'm the medications service. I'll help you deliver quality and affordable medications, on time. 👋!", Some(0)),
    ("Delivery Assistant", "I'm the delivery assistant. I help the medications service deliver medicines on time. 👋!", Some(1)),
    ("Dispensing Assistant", "I'm the dispensing assistant. I help you prepare your orders. 👋!", Some(1)),
    ("Tests Service", "I'm the tests service. I'll help you deliver quality and affordable diagnostic tests. 👋!", Some(0)),
    ("Consultations Service", "I'm the consultations service. I'll set up in-person and remote consultations for you. 👋!", Some(0)),
    ("Teleconsultations Assistant", "I'm the teleconsultations assistant. I'll ensure that you can conduct consultations via video or audio conference, whenever you need to. If you have an emergency, I'll help you find the nearest hospital for emergencies. 👋!", Some(5)),
    ("Booking Assistant", "I'm the booking assistant. I'll help you book appointments and remind you when it's time. 👋!", Some(5)),
    ("Reminders Service", "I'm the reminders service. I'll help you remember things that you need to do. 👋!", Some(0)),
];

fn welcome_message_id(index: usize) -> String {
    format!("welcome-message-{}", index + 1)
}

/// The seeded welcome conversation, in posting order.
pub fn welcome_thread(flavour: Flavour, now: DateTime<Utc>) -> Vec<Message> {
    let lines: &[ThreadLine] = match flavour {
        Flavour::Consumer => &CONSUMER_THREAD,
        Flavour::Pro => &PRO_THREAD,
    };
    lines
        .iter()
        .enumerate()
        .map(|(i, (posted_by, text, reply_to))| Message {
            id: welcome_message_id(i),
            sequence_number: i as i64 + 1,
            text: text.to_string(),
            reply_to: reply_to.map(welcome_message_id).unwrap_or_default(),
            posted_by_uid: DEFAULT_POSTED_BY_UID.to_string(),
            posted_by_name: posted_by.to_string(),
            timestamp: now,
        })
        .collect()
}

/// The persistent welcome item seeded into every fresh feed.
pub fn welcome_item(uid: &str, flavour: Flavour, now: DateTime<Utc>) -> Item {
    let text = match flavour {
        Flavour::Consumer => "Be.Well is a virtual and physical healthcare community. Our goal is to make it easy for you to access affordable high-quality healthcare - whether online or in person.",
        Flavour::Pro => "Be.Well is a virtual and physical healthcare community. Our goal is to make it easy for you to provide affordable high-quality healthcare - whether online or in person.",
    };
    Item {
        id: WELCOME_ITEM_ID.to_string(),
        sequence_number: 1,
        expiry: default_expiry(now),
        persistent: true,
        pinned: false,
        status: Status::Pending,
        visibility: Visibility::Show,
        icon: Link {
            id: "welcome-icon".to_string(),
            url: DEFAULT_ICON_PATH.to_string(),
            link_type: LinkType::PngImage,
            title: "Feed Item Icon".to_string(),
            description: "Feed Item Icon".to_string(),
            thumbnail: DEFAULT_ICON_PATH.to_string(),
        },
        author: DEFAULT_AUTHOR.to_string(),
        tagline: "Welcome to Be.Well".to_string(),
        label: DEFAULT_LABEL.to_string(),
        timestamp: now,
        summary: "What is Be.Well?".to_string(),
        text: text.to_string(),
        text_type: TextType::Markdown,
        links: welcome_videos(flavour),
        actions: vec![
            local_action(RESOLVE_ITEM_ACTION, ActionType::Primary, Handling::Inline, false),
            local_action(PIN_ITEM_ACTION, ActionType::Primary, Handling::Inline, true),
            local_action(HIDE_ITEM_ACTION, ActionType::Primary, Handling::Inline, true),
        ],
        conversations: welcome_thread(flavour, now),
        users: vec![uid.to_string()],
        groups: Vec::new(),
        notification_channels: Vec::new(),
    }
}
