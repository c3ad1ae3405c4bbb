//! Vitrine: a content-driven marketing site server.
//!
//! Blog pages and syndication documents are built from a headless CMS; the guestbook and
//! comments live in Postgres; a remote key-value store backs caching, view counts and
//! rate limiting.

pub mod application;
pub mod client;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod util;
