//! Application review pipeline.
//!
//! `pending → reviewing → shortlisted → interview → hired`, with `rejected` reachable
//! from every non-terminal stage. The legal moves live in [`TRANSITIONS`]; anything
//! not listed there is refused. Re-submitting the current status is always allowed so
//! reviewers can amend notes without moving the candidate.

use crate::errors::AppError;
use crate::models::text_enum;

text_enum! {
    pub enum ApplicationStatus {
        Pending => "pending",
        Reviewing => "reviewing",
        Shortlisted => "shortlisted",
        Interview => "interview",
        Hired => "hired",
        Rejected => "rejected",
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::Pending
    }
}

use ApplicationStatus::*;

/// `(from, to)` pairs a reviewer may apply.
pub const TRANSITIONS: &[(ApplicationStatus, ApplicationStatus)] = &[
    (Pending, Reviewing),
    (Pending, Rejected),
    (Reviewing, Shortlisted),
    (Reviewing, Rejected),
    (Shortlisted, Interview),
    (Shortlisted, Rejected),
    (Interview, Hired),
    (Interview, Rejected),
];

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Hired | Rejected)
    }

    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        self == next || TRANSITIONS.contains(&(self, next))
    }

    /// Statuses reachable from here in one step, for the admin dashboard's picker.
    pub fn next_statuses(self) -> Vec<ApplicationStatus> {
        TRANSITIONS
            .iter()
            .filter(|(from, _)| *from == self)
            .map(|(_, to)| *to)
            .collect()
    }
}

pub fn check_transition(from: ApplicationStatus, to: ApplicationStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}
