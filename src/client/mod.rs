//! Client-side helpers that consume the public JSON API.

pub mod comments;
