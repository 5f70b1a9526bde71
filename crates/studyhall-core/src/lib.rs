//! studyhall-core: review chains, trusted reviewers and moderation flags for
//! a campus Q&A platform.
//!
//! The [`core`] module is the entry point for callers; [`store`] holds the
//! SQLite row access it is built on.

pub mod config;
pub mod core;
pub mod identity;
pub mod model;
pub mod store;
