//! Toast queue shared by one dashboard session.
//!
//! Toasts are appended in push order and removed either explicitly or by an
//! auto-dismiss timer when a tokio runtime is available.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::types::toast::{Toast, ToastKind};

#[derive(Clone)]
pub struct ToastQueue {
    inner: Arc<Mutex<Vec<Toast>>>,
    ttl: Option<Duration>,
}

impl ToastQueue {
    /// Queue whose toasts dismiss themselves after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            ttl: Some(ttl),
        }
    }

    /// Queue without auto-dismiss.
    pub fn persistent() -> Self {
        let mut queue = Self::new(Duration::ZERO);
        queue.ttl = None;
        queue
    }

    pub fn push(&self, kind: ToastKind, title: &str, message: Option<&str>) -> String {
        let toast = Toast {
            id: Uuid::new_v4().to_string(),
            kind,
            title: title.to_string(),
            message: message.map(str::to_string),
        };
        let id = toast.id.clone();
        debug!(?kind, title, "toast pushed");
        if let Ok(mut toasts) = self.inner.lock() {
            toasts.push(toast);
        }

        if let (Some(ttl), Ok(handle)) = (self.ttl, tokio::runtime::Handle::try_current()) {
            let queue = self.clone();
            let expiring = id.clone();
            handle.spawn(async move {
                tokio::time::sleep(ttl).await;
                queue.dismiss(&expiring);
            });
        }
        id
    }

    pub fn success(&self, title: &str) -> String {
        self.push(ToastKind::Success, title, None)
    }

    pub fn error(&self, title: &str, message: &str) -> String {
        self.push(ToastKind::Error, title, Some(message))
    }

    /// Removes a toast; unknown ids are ignored.
    pub fn dismiss(&self, id: &str) {
        if let Ok(mut toasts) = self.inner.lock() {
            toasts.retain(|t| t.id != id);
        }
    }

    /// Currently visible toasts, oldest first.
    pub fn active(&self) -> Vec<Toast> {
        self.inner.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(Duration::from_millis(3200))
    }
}
