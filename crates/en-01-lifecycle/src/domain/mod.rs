//! Domain layer: the transition state machine and delete tombstones.

pub mod transitions;

pub use transitions::{apply_to_item, apply_to_nudge, Outcome, Transition};

use shared_types::{Action, Item, Link, LinkType, Nudge, DEFAULT_ICON_PATH};

/// Placeholder published on delete when the element never existed, so
/// subscribers still observe the delete. Always passes validation.
pub fn tombstone_item(id: &str) -> Item {
    Item {
        id: id.to_string(),
        sequence_number: 1,
        tagline: "deleted".to_string(),
        summary: "deleted".to_string(),
        icon: Link {
            id: "tombstone".to_string(),
            url: DEFAULT_ICON_PATH.to_string(),
            link_type: LinkType::PngImage,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn tombstone_nudge(id: &str) -> Nudge {
    Nudge {
        id: id.to_string(),
        sequence_number: 1,
        title: "deleted".to_string(),
        text: "deleted".to_string(),
        ..Default::default()
    }
}

pub fn tombstone_action(id: &str) -> Action {
    Action {
        id: id.to_string(),
        sequence_number: 1,
        name: "deleted".to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Element;

    #[test]
    fn test_tombstones_validate() {
        assert!(tombstone_item("x").validate().is_ok());
        assert!(tombstone_nudge("x").validate().is_ok());
        assert!(tombstone_action("x").validate().is_ok());
    }
}
