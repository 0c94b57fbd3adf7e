use std::sync::Arc;

use avrostub_api::{
    AvroConsumer, CommitCallback, ConsumerOptions, DataListener, Message, MessageStream,
};

use crate::invocations::{CommitCall, InvocationLog};
use crate::runtime::StubState;
use crate::stream::ReadStream;

/// Consumer handed out by `BrokerStub`.
///
/// Listeners registered through `on_data` belong to this consumer and are
/// removed on `disconnect` or when the last handle is dropped. Read streams
/// live on independently until their reader drops them.
pub struct Consumer {
    id: u64,
    state: Arc<StubState>,
    options: ConsumerOptions,
    commits: Arc<InvocationLog<CommitCall>>,
}

impl Consumer {
    pub(crate) fn new(
        id: u64,
        state: Arc<StubState>,
        options: ConsumerOptions,
        commits: Arc<InvocationLog<CommitCall>>,
    ) -> Self {
        Self {
            id,
            state,
            options,
            commits,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Options given to `get_consumer`, untouched.
    pub fn options(&self) -> &ConsumerOptions {
        &self.options
    }

    /// Typed variant of `get_read_stream`, usable as a `futures::Stream`.
    pub fn read_stream(&self, topic: &str) -> ReadStream {
        self.state.router.open_stream(topic)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.count()
    }

    pub fn commit_calls(&self) -> Vec<CommitCall> {
        self.commits.calls()
    }
}

impl AvroConsumer for Consumer {
    fn subscribe(&self, topics: &[&str]) {
        tracing::debug!(consumer = self.id, ?topics, "subscribe");
        self.state.router.activate(topics);
    }

    fn consume(&self, topics: &[&str]) {
        tracing::debug!(consumer = self.id, ?topics, "consume");
        self.state.router.activate(topics);
    }

    fn on_data(&self, listener: DataListener) {
        self.state.router.add_listener(self.id, listener);
    }

    fn get_read_stream(&self, topic: &str) -> Box<dyn MessageStream> {
        Box::new(self.read_stream(topic))
    }

    fn commit(&self, message: &Message, callback: Option<CommitCallback>) {
        self.commits.record(CommitCall {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
        });
        tracing::debug!(
            consumer = self.id,
            topic = %message.topic,
            offset = message.offset,
            "commit"
        );
        if let Some(callback) = callback {
            callback(Ok(()));
        }
    }

    fn disconnect(&self) {
        let removed = self.state.router.remove_listeners(self.id);
        tracing::debug!(consumer = self.id, listeners = removed, "consumer disconnected");
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.state.router.remove_listeners(self.id);
    }
}
