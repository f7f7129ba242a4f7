//! LinkNest: bookmark sync layer.
//!
//! Keeps a local cache of the signed-in user's bookmarks consistent with a
//! remote store through realtime change events, a debounced refetch fallback
//! and optimistic mutations with rollback. This library crate exposes all
//! modules for use by the RPC binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
