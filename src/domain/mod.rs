//! Domain layer: conversation entities and the rules derived from them.

pub mod message;
pub mod recipient;
pub mod security;
pub mod view_state;
