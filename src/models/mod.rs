//! Data models for the projects backend.
//!
//! Field names serialize in camelCase to match the client contract.

mod join_request;
mod member;
mod project;
mod rights;
mod status;

pub use join_request::*;
pub use member::*;
pub use project::*;
pub use rights::*;
pub use status::*;
