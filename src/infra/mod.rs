//! Infrastructure adapters and runtime bootstrap.

pub mod auth;
pub mod cms;
pub mod db;
pub mod error;
pub mod http;
pub mod kv;
pub mod mail;
pub mod memory;
pub mod rate_limit;
pub mod telemetry;
