// LinkNest services
// Services talk to the outside world (remote stores, change feeds, local
// preference storage) or compute over bookmarks without holding session state.

pub mod change_feed;
pub mod derived_view;
pub mod notifications;
pub mod preferences_store;
pub mod remote_store;
pub mod rest_store;
pub mod sqlite_store;
pub mod validation;
