//! Application services: orchestration over the collaborator traits.

pub mod cache_aside;
pub mod comments;
pub mod content;
pub mod error;
pub mod gateways;
pub mod guestbook;
pub mod pagination;
pub mod repos;
pub mod seo;
pub mod sitemap;
pub mod syndication;
