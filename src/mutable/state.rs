//! Per-element change tracking for mutable views.

use std::fmt;

/// Change state of an element relative to the snapshot a mutable view
/// was opened on.
///
/// Transitions are restricted: an element can only be (re)added when it
/// does not currently exist, and only modified or removed while alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    /// Not present in the base snapshot and not created since.
    NotExistent,
    /// Present in the base snapshot and untouched.
    NotChanged,
    /// Created by this mutable view.
    Added,
    /// Present in the base snapshot and changed by this view.
    Modified,
    /// Removed by this view.
    Removed,
}

impl ElementState {
    /// Whether the element currently exists from the view's perspective.
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            ElementState::NotChanged | ElementState::Added | ElementState::Modified
        )
    }

    /// Whether the element diverges from the base snapshot.
    pub fn is_changed(self) -> bool {
        matches!(
            self,
            ElementState::Added | ElementState::Modified | ElementState::Removed
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ElementState) -> bool {
        match (self, next) {
            (ElementState::NotExistent | ElementState::Removed, ElementState::Added) => true,
            (
                ElementState::NotChanged | ElementState::Added | ElementState::Modified,
                ElementState::Modified | ElementState::Removed,
            ) => true,
            _ => false,
        }
    }

    /// Panics on an illegal transition; mutation entry points check
    /// their own preconditions first, so reaching an illegal transition
    /// is a logic error.
    pub fn assert_legal_transition(self, next: ElementState) {
        assert!(
            self.can_transition_to(next),
            "illegal element state transition from {} to {}",
            self,
            next
        );
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementState::NotExistent => "not_existent",
            ElementState::NotChanged => "not_changed",
            ElementState::Added => "added",
            ElementState::Modified => "modified",
            ElementState::Removed => "removed",
        };
        write!(f, "{}", name)
    }
}
