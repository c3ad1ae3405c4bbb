//! Domain layer types and invariants.

pub mod comments;
pub mod content;
pub mod guestbook;
pub mod site;
