//! Project lifecycle and field-level access control.

pub mod field_filter;
pub mod rights;
pub mod service;
pub mod transitions;
pub mod validation;

pub use field_filter::{filter_for_update, EMPTY_SENTINEL};
pub use rights::RightsResolver;
pub use service::{Approval, ApprovalDecision, ProjectLifecycle, TransitionReceipt};
pub use transitions::{allowed_next_statuses, validate_transition};
