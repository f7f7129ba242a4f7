//! In-process realtime change feed.
//!
//! [`ChangeFeedHub`] fans change events out to every [`Subscription`] whose
//! owner filter matches. A subscriber that falls behind the hub's buffer sees
//! a `ChannelError` status, which callers treat as a broken stream.

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::services::remote_store::ChangeFeed;
use crate::types::errors::StoreError;
use crate::types::events::{ChangeEvent, ChannelStatus, FeedMessage};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Envelope {
    owner_id: String,
    message: FeedMessage,
}

enum Source {
    Hub {
        rx: broadcast::Receiver<Envelope>,
        owner_id: String,
    },
    Channel(mpsc::UnboundedReceiver<FeedMessage>),
}

/// Handle to an open change subscription.
pub struct Subscription {
    source: Option<Source>,
    announced: bool,
}

impl Subscription {
    /// Wraps an arbitrary message channel, e.g. one fed by a network transport.
    pub fn from_channel(rx: mpsc::UnboundedReceiver<FeedMessage>) -> Self {
        Self {
            source: Some(Source::Channel(rx)),
            announced: true,
        }
    }

    /// Waits for the next message. Returns `None` once the subscription has
    /// been closed, either by [`Subscription::unsubscribe`] or by the source.
    pub async fn next(&mut self) -> Option<FeedMessage> {
        if !self.announced {
            self.announced = true;
            if self.source.is_some() {
                return Some(FeedMessage::Status(ChannelStatus::Subscribed));
            }
        }
        loop {
            let received = match self.source.as_mut()? {
                Source::Hub { rx, owner_id } => match rx.recv().await {
                    Ok(env) if env.owner_id == *owner_id => Some(env.message),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "change feed subscriber lagged");
                        Some(FeedMessage::Status(ChannelStatus::ChannelError))
                    }
                    Err(broadcast::error::RecvError::Closed) => None,
                },
                Source::Channel(rx) => rx.recv().await,
            };
            return match received {
                Some(message) => Some(message),
                None => {
                    self.source = None;
                    Some(FeedMessage::Status(ChannelStatus::Closed))
                }
            };
        }
    }

    /// Releases the underlying receiver. Calling it again is a no-op.
    pub fn unsubscribe(&mut self) {
        if self.source.take().is_some() {
            debug!("change feed subscription released");
        }
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }
}

/// Broadcast hub for change events keyed by owner.
#[derive(Clone)]
pub struct ChangeFeedHub {
    tx: broadcast::Sender<Envelope>,
}

impl ChangeFeedHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a change for `owner_id`. Having no subscribers is not an error.
    pub fn publish(&self, owner_id: &str, event: ChangeEvent) {
        self.send(owner_id, FeedMessage::Change(event));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn send(&self, owner_id: &str, message: FeedMessage) {
        let _ = self.tx.send(Envelope {
            owner_id: owner_id.to_string(),
            message,
        });
    }
}

impl Default for ChangeFeedHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for ChangeFeedHub {
    fn subscribe(&self, owner_id: &str) -> Result<Subscription, StoreError> {
        Ok(Subscription {
            source: Some(Source::Hub {
                rx: self.tx.subscribe(),
                owner_id: owner_id.to_string(),
            }),
            announced: false,
        })
    }
}
