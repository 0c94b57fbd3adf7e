use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use avrostub_api::{BoxFuture, Message, MessageStream};
use tokio::sync::mpsc;

/// Live feed of one topic, fed by the router.
///
/// Unbounded and never restarted: it sees every message produced to its
/// topic after it was opened, in produce order. Dropping it unregisters it
/// on the next delivery.
#[derive(Debug)]
pub struct ReadStream {
    topic: String,
    rx: mpsc::UnboundedReceiver<Arc<Message>>,
}

impl ReadStream {
    pub(crate) fn new(topic: String, rx: mpsc::UnboundedReceiver<Arc<Message>>) -> Self {
        Self { topic, rx }
    }
}

impl MessageStream for ReadStream {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn recv(&mut self) -> BoxFuture<'_, Option<Arc<Message>>> {
        Box::pin(async { self.rx.recv().await })
    }

    fn try_recv(&mut self) -> Option<Arc<Message>> {
        self.rx.try_recv().ok()
    }
}

impl futures::Stream for ReadStream {
    type Item = Arc<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
