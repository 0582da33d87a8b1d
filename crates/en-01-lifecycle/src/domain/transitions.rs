//! # Element State Machine
//!
//! ```text
//! PENDING --resolve--> DONE        DONE --unresolve--> PENDING
//! SHOW    --hide-->    HIDE        HIDE --show-->      SHOW
//! (persistent) unpinned --pin--> pinned --unpin--> unpinned
//! ```
//!
//! Transitions are pure. A real transition bumps the sequence number by one;
//! a transition whose target state already holds is reported as unchanged.

use shared_bus::Topic;
use shared_types::{Action, EngagementError, Item, Nudge, Result, Status, Visibility};
use std::fmt;

pub const RESOLVE_ITEM_ACTION: &str = "RESOLVE_ITEM";
pub const UNRESOLVE_ITEM_ACTION: &str = "UNRESOLVE_ITEM";
pub const PIN_ITEM_ACTION: &str = "PIN_ITEM";
pub const UNPIN_ITEM_ACTION: &str = "UNPIN_ITEM";
pub const HIDE_ITEM_ACTION: &str = "HIDE_ITEM";
pub const SHOW_ITEM_ACTION: &str = "SHOW_ITEM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Resolve,
    Unresolve,
    Pin,
    Unpin,
    Hide,
    Show,
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::Resolve,
        Transition::Unresolve,
        Transition::Pin,
        Transition::Unpin,
        Transition::Hide,
        Transition::Show,
    ];

    /// Parses the path segment used by the HTTP surface.
    pub fn from_segment(segment: &str) -> Option<Transition> {
        Transition::ALL
            .into_iter()
            .find(|t| t.segment() == segment.to_ascii_lowercase())
    }

    pub fn segment(&self) -> &'static str {
        match self {
            Transition::Resolve => "resolve",
            Transition::Unresolve => "unresolve",
            Transition::Pin => "pin",
            Transition::Unpin => "unpin",
            Transition::Hide => "hide",
            Transition::Show => "show",
        }
    }

    pub fn item_topic(&self) -> Topic {
        match self {
            Transition::Resolve => Topic::ItemResolve,
            Transition::Unresolve => Topic::ItemUnresolve,
            Transition::Pin => Topic::ItemPin,
            Transition::Unpin => Topic::ItemUnpin,
            Transition::Hide => Topic::ItemHide,
            Transition::Show => Topic::ItemShow,
        }
    }

    /// Nudges cannot be pinned.
    pub fn nudge_topic(&self) -> Option<Topic> {
        match self {
            Transition::Resolve => Some(Topic::NudgeResolve),
            Transition::Unresolve => Some(Topic::NudgeUnresolve),
            Transition::Hide => Some(Topic::NudgeHide),
            Transition::Show => Some(Topic::NudgeShow),
            Transition::Pin | Transition::Unpin => None,
        }
    }

    /// Embedded action renamed by this transition: `(from, to)`.
    fn action_rename(&self) -> (&'static str, &'static str) {
        match self {
            Transition::Resolve => (RESOLVE_ITEM_ACTION, UNRESOLVE_ITEM_ACTION),
            Transition::Unresolve => (UNRESOLVE_ITEM_ACTION, RESOLVE_ITEM_ACTION),
            Transition::Pin => (PIN_ITEM_ACTION, UNPIN_ITEM_ACTION),
            Transition::Unpin => (UNPIN_ITEM_ACTION, PIN_ITEM_ACTION),
            Transition::Hide => (HIDE_ITEM_ACTION, SHOW_ITEM_ACTION),
            Transition::Show => (SHOW_ITEM_ACTION, HIDE_ITEM_ACTION),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Result of applying a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// State changed; carries the next version.
    Applied(T),
    /// Target state already held; carries the input unchanged.
    Unchanged(T),
}

fn rename_actions(actions: &mut [Action], transition: Transition) {
    let (from, to) = transition.action_rename();
    for action in actions.iter_mut().filter(|a| a.name == from) {
        action.name = to.to_string();
        action.sequence_number += 1;
    }
}

fn status_target(transition: Transition) -> Option<Status> {
    match transition {
        Transition::Resolve => Some(Status::Done),
        Transition::Unresolve => Some(Status::Pending),
        _ => None,
    }
}

fn visibility_target(transition: Transition) -> Option<Visibility> {
    match transition {
        Transition::Hide => Some(Visibility::Hide),
        Transition::Show => Some(Visibility::Show),
        _ => None,
    }
}

/// Applies `transition` to an item.
///
/// Pin and unpin on a non-persistent item fail with `InvalidOperation`.
pub fn apply_to_item(item: &Item, transition: Transition) -> Result<Outcome<Item>> {
    let mut next = item.clone();
    let changed = match transition {
        Transition::Pin | Transition::Unpin => {
            if !item.persistent {
                return Err(EngagementError::invalid_operation(format!(
                    "cannot {transition} item {}: only persistent items can be pinned",
                    item.id
                )));
            }
            let target = transition == Transition::Pin;
            let changed = item.pinned != target;
            next.pinned = target;
            changed
        }
        Transition::Resolve | Transition::Unresolve => {
            let target = status_target(transition).unwrap_or(item.status);
            let changed = item.status != target;
            next.status = target;
            changed
        }
        Transition::Hide | Transition::Show => {
            let target = visibility_target(transition).unwrap_or(item.visibility);
            let changed = item.visibility != target;
            next.visibility = target;
            changed
        }
    };

    if !changed {
        return Ok(Outcome::Unchanged(item.clone()));
    }
    next.sequence_number += 1;
    rename_actions(&mut next.actions, transition);
    Ok(Outcome::Applied(next))
}

/// Applies `transition` to a nudge. Nudges have no pin state.
pub fn apply_to_nudge(nudge: &Nudge, transition: Transition) -> Result<Outcome<Nudge>> {
    let mut next = nudge.clone();
    let changed = if let Some(target) = status_target(transition) {
        next.status = target;
        nudge.status != target
    } else if let Some(target) = visibility_target(transition) {
        next.visibility = target;
        nudge.visibility != target
    } else {
        return Err(EngagementError::invalid_operation(format!(
            "cannot {transition} nudge {}: nudges cannot be pinned",
            nudge.id
        )));
    };

    if !changed {
        return Ok(Outcome::Unchanged(nudge.clone()));
    }
    next.sequence_number += 1;
    Ok(Outcome::Applied(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ErrorKind;

    impl<T> Outcome<T> {
        fn into_inner(self) -> T {
            match self {
                Outcome::Applied(v) | Outcome::Unchanged(v) => v,
            }
        }

        fn is_applied(&self) -> bool {
            matches!(self, Outcome::Applied(_))
        }
    }

    fn item(persistent: bool) -> Item {
        Item {
            id: "x".into(),
            sequence_number: 1,
            persistent,
            actions: vec![
                Action {
                    name: RESOLVE_ITEM_ACTION.into(),
                    sequence_number: 1,
                    ..Default::default()
                },
                Action {
                    name: PIN_ITEM_ACTION.into(),
                    sequence_number: 4,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_bumps_sequence_and_renames_action() {
        let next = apply_to_item(&item(false), Transition::Resolve)
            .unwrap()
            .into_inner();
        assert_eq!(next.status, Status::Done);
        assert_eq!(next.sequence_number, 2);
        assert_eq!(next.actions[0].name, UNRESOLVE_ITEM_ACTION);
        assert_eq!(next.actions[0].sequence_number, 2);
        assert_eq!(next.actions[1].name, PIN_ITEM_ACTION);
    }

    #[test]
    fn test_repeated_toggle_is_unchanged() {
        let once = apply_to_item(&item(true), Transition::Hide).unwrap();
        assert!(once.is_applied());
        let once = once.into_inner();
        let twice = apply_to_item(&once, Transition::Hide).unwrap();
        assert_eq!(twice, Outcome::Unchanged(once.clone()));
    }

    #[test]
    fn test_toggles_are_symmetric() {
        let original = item(true);
        for (forward, back) in [
            (Transition::Resolve, Transition::Unresolve),
            (Transition::Pin, Transition::Unpin),
            (Transition::Hide, Transition::Show),
        ] {
            let there = apply_to_item(&original, forward).unwrap().into_inner();
            let again = apply_to_item(&there, back).unwrap().into_inner();
            assert_eq!(again.status, original.status);
            assert_eq!(again.visibility, original.visibility);
            assert_eq!(again.pinned, original.pinned);
            assert_eq!(again.sequence_number, original.sequence_number + 2);
            assert_eq!(
                again.actions.iter().map(|a| &a.name).collect::<Vec<_>>(),
                original.actions.iter().map(|a| &a.name).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_pin_requires_persistent_item() {
        for t in [Transition::Pin, Transition::Unpin] {
            let err = apply_to_item(&item(false), t).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidOperation);
        }
    }

    #[test]
    fn test_nudge_transitions() {
        let nudge = Nudge {
            id: "n".into(),
            sequence_number: 5,
            ..Default::default()
        };
        let resolved = apply_to_nudge(&nudge, Transition::Resolve)
            .unwrap()
            .into_inner();
        assert_eq!(resolved.status, Status::Done);
        assert_eq!(resolved.sequence_number, 6);
        assert!(!apply_to_nudge(&nudge, Transition::Show).unwrap().is_applied());
        assert_eq!(
            apply_to_nudge(&nudge, Transition::Pin).unwrap_err().kind,
            ErrorKind::InvalidOperation
        );
    }

    #[test]
    fn test_segments_round_trip() {
        for t in Transition::ALL {
            assert_eq!(Transition::from_segment(t.segment()), Some(t));
        }
        assert_eq!(Transition::from_segment("explode"), None);
        assert_eq!(Transition::nudge_topic(&Transition::Pin), None);
    }
}
