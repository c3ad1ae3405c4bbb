//! Small shared helpers.

pub mod xml;
