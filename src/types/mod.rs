// LinkNest shared type definitions
// Each submodule defines types used across the sync layer.

pub mod bookmark;
pub mod config;
pub mod errors;
pub mod events;
pub mod preferences;
pub mod session;
pub mod toast;
