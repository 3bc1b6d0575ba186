//! Use-case layer: conversation rules computed over the store contracts.
//!
//! Everything here is synchronous and side-effect free apart from store
//! calls; the service layer decides where these run.

pub mod compose_view_state;
pub mod detach_capability;
pub mod evaluate_security;
pub mod resolve_edit_source;
