// LinkNest state managers
// Managers own per-session state: the bookmark cache, realtime reconciliation
// and optimistic mutations.

pub mod bookmark_cache;
pub mod change_reconciler;
pub mod mutation_manager;
