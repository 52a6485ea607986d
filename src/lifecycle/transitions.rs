//! Legal project status transitions.

use crate::errors::AppError;
use crate::models::ProjectStatus;

use ProjectStatus::*;

/// Transition table rows. Rows list the current status itself, but a
/// self-transition is always refused by [`validate_transition`].
fn table_row(current: ProjectStatus) -> &'static [ProjectStatus] {
    match current {
        Draft => &[Draft, Submitted, Cancelled],
        Submitted => &[Draft, Active, Rejected, Cancelled],
        Active => &[Active, OnHold, Completed, Cancelled],
        OnHold => &[OnHold, Active, Completed, Cancelled],
        Completed => &[Completed, Active, Archived],
        Rejected => &[Rejected, Archived, Draft],
        Archived | Cancelled => &[],
    }
}

/// Statuses reachable from `current` in one step.
pub fn allowed_next_statuses(current: ProjectStatus) -> Vec<ProjectStatus> {
    table_row(current)
        .iter()
        .copied()
        .filter(|next| *next != current)
        .collect()
}

/// Check that moving from `current` to `requested` is legal.
pub fn validate_transition(
    current: ProjectStatus,
    requested: ProjectStatus,
) -> Result<(), AppError> {
    if current.is_terminal() {
        return Err(AppError::AlreadyFinalized(current));
    }
    if current == requested {
        return Err(AppError::AlreadyInStatus(current));
    }
    if !table_row(current).contains(&requested) {
        return Err(AppError::InvalidTransition {
            from: current,
            to: requested,
        });
    }
    Ok(())
}
