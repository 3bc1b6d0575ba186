//! Conversation screen state assembly and live-update pipelines for a secure
//! messaging client.
//!
//! The crate composes a point-in-time [`domain::view_state::ConversationViewState`]
//! snapshot for a conversation screen, keeps security status and unread counts
//! live while the screen is open, and runs small fire-and-forget conversation
//! writes. Storage, contact discovery, blob access, and sync dispatch stay
//! behind the traits in [`store`]; callers wire their own adapters through
//! [`service::ConversationService`].

pub mod domain;
pub mod infra;
pub mod service;
pub mod store;
pub mod usecases;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use service::{ConversationDeps, ConversationService};
