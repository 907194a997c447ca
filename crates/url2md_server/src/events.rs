use std::convert::Infallible;

use axum::response::sse::Event;
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, Receiver, Sender};
use url2md_core::NotificationEvent;
use url2md_logging::{conv_debug, conv_warn};

const DEFAULT_CAPACITY: usize = 256;

/// Fan-out of [`NotificationEvent`]s to live observers. Publishing with no
/// subscribers is not an error; the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Sender<NotificationEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: NotificationEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(count) => {
                conv_debug!("Published {} to {} subscribers", kind, count);
                count
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Server-sent events for one observer. Lagging observers skip what they missed.
    pub fn sse_stream(&self) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
        stream::unfold(self.subscribe(), |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => match to_sse_event(&event) {
                        Some(sse) => return Some((Ok(sse), receiver)),
                        None => continue,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        conv_warn!("Event observer lagged behind by {} events", skipped);
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }
}

fn to_sse_event(event: &NotificationEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().event(event.kind()).data(data)),
        Err(err) => {
            conv_warn!("Failed to serialize {} event: {}", event.kind(), err);
            None
        }
    }
}
