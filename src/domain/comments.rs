//! Comments attached to blog posts.
//!
//! The record itself is a wire type so the server and the comment client share one
//! definition.

pub use vitrine_api_types::CommentRecord;
