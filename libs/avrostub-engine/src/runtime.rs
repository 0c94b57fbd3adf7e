use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use avrostub_api::{
    AvroClient, AvroConsumer, AvroProducer, BoxFuture, ConsumerOptions, Message, RegistryFixture,
    SchemaParser, StubError,
};
use codec_avro::AvroSchemaParser;

use crate::consumer::Consumer;
use crate::invocations::{CallRegistry, CommitCall, ProduceCall};
use crate::lock;
use crate::log::ProducedLog;
use crate::offsets::OffsetTracker;
use crate::producer::Producer;
use crate::router::DeliveryRouter;
use crate::schema::{SchemaEntry, SchemaStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
}

/// Everything the stub and its facades share.
pub(crate) struct StubState {
    pub(crate) schemas: SchemaStore,
    pub(crate) offsets: OffsetTracker,
    pub(crate) log: ProducedLog,
    pub(crate) router: DeliveryRouter,
    lifecycle: Mutex<Lifecycle>,
    fixtures: RwLock<Vec<RegistryFixture>>,
    producer_calls: CallRegistry<ProduceCall>,
    commit_calls: CallRegistry<CommitCall>,
    initialize_calls: AtomicUsize,
    next_facade_id: AtomicU64,
}

impl StubState {
    fn clear_session(&self) {
        self.log.clear();
        self.offsets.reset();
        self.producer_calls.clear();
        self.commit_calls.clear();
        self.initialize_calls.store(0, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════
//  BrokerStub
// ═══════════════════════════════════════════════════════════════

/// In-memory stand-in for a schema-registry-backed broker client.
///
/// Implements `AvroClient`, so code under test takes an
/// `Arc<dyn AvroClient>` and gets either the real client or this stub.
/// Clones share one runtime.
///
/// Fixtures given at construction (or via `stage`) are parsed by
/// `initialize`. Calling `initialize` on an initialized stub resets it and
/// registers the staged fixtures again; a real client has no such
/// behaviour.
#[derive(Clone)]
pub struct BrokerStub {
    state: Arc<StubState>,
}

impl Default for BrokerStub {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl BrokerStub {
    /// Stub encoding with Avro.
    pub fn new(fixtures: Vec<RegistryFixture>) -> Self {
        Self::with_parser(Arc::new(AvroSchemaParser), fixtures)
    }

    /// Stub using another schema parser.
    pub fn with_parser(parser: Arc<dyn SchemaParser>, fixtures: Vec<RegistryFixture>) -> Self {
        Self {
            state: Arc::new(StubState {
                schemas: SchemaStore::new(parser),
                offsets: OffsetTracker::new(),
                log: ProducedLog::new(),
                router: DeliveryRouter::new(),
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                fixtures: RwLock::new(fixtures),
                producer_calls: CallRegistry::default(),
                commit_calls: CallRegistry::default(),
                initialize_calls: AtomicUsize::new(0),
                next_facade_id: AtomicU64::new(1),
            }),
        }
    }

    /// Replace the fixtures the next `initialize` registers.
    pub fn stage(&self, fixtures: Vec<RegistryFixture>) {
        *lock::write(&self.state.fixtures, "staged fixtures") = fixtures;
    }

    fn initialize_now(&self) -> Result<(), StubError> {
        let mut lifecycle = lock::lock(&self.state.lifecycle, "lifecycle");
        if *lifecycle == Lifecycle::Initialized {
            tracing::info!("stub already initialized, resetting before re-registration");
            self.state.clear_session();
            *lifecycle = Lifecycle::Uninitialized;
        }
        self.state.initialize_calls.fetch_add(1, Ordering::SeqCst);

        let fixtures = lock::read(&self.state.fixtures, "staged fixtures").clone();
        self.state.schemas.register(&fixtures)?;

        *lifecycle = Lifecycle::Initialized;
        tracing::info!(
            fixtures = fixtures.len(),
            subjects = self.state.schemas.len(),
            "broker stub initialized"
        );
        Ok(())
    }

    /// Clear produced messages, offsets and call histories.
    ///
    /// Schemas, read streams, listeners and the active topic set survive.
    pub fn reset(&self) {
        self.state.clear_session();
        tracing::info!("broker stub reset");
    }

    pub fn is_initialized(&self) -> bool {
        *lock::lock(&self.state.lifecycle, "lifecycle") == Lifecycle::Initialized
    }

    fn ensure_initialized(&self, operation: &str) -> Result<(), StubError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StubError::Configuration(format!(
                "{operation} called before initialize"
            )))
        }
    }

    fn next_facade_id(&self) -> u64 {
        self.state.next_facade_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Concrete-typed `get_producer`.
    pub fn producer(&self) -> Result<Producer, StubError> {
        self.ensure_initialized("get_producer")?;
        let calls = self.state.producer_calls.track();
        let id = self.next_facade_id();
        tracing::debug!(producer = id, "producer created");
        Ok(Producer::new(id, self.state.clone(), calls))
    }

    /// Concrete-typed `get_consumer`.
    pub fn consumer(&self, options: ConsumerOptions) -> Result<Consumer, StubError> {
        self.ensure_initialized("get_consumer")?;
        let commits = self.state.commit_calls.track();
        let id = self.next_facade_id();
        tracing::debug!(consumer = id, group = ?options.group_id, "consumer created");
        Ok(Consumer::new(id, self.state.clone(), options, commits))
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Messages produced to `topic`, in offset order. Empty if none.
    pub fn messages_produced(&self, topic: &str) -> Vec<Arc<Message>> {
        self.state.log.messages(topic).unwrap_or_default()
    }

    /// Topics with at least one produced message.
    pub fn produced_topics(&self) -> Vec<String> {
        self.state.log.topics()
    }

    pub fn produced_total(&self) -> usize {
        self.state.log.total()
    }

    /// `produce` calls across every producer, dropped ones and failed calls
    /// included.
    pub fn produce_count(&self) -> usize {
        self.state.producer_calls.total()
    }

    /// `commit` calls across every consumer, dropped ones included.
    pub fn commit_count(&self) -> usize {
        self.state.commit_calls.total()
    }

    /// `initialize` calls since construction or the last reset.
    pub fn initialize_count(&self) -> usize {
        self.state.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn registered_schemas(&self) -> Vec<Arc<SchemaEntry>> {
        self.state.schemas.entries()
    }

    pub fn schema(&self, subject: &str) -> Option<Arc<SchemaEntry>> {
        self.state.schemas.lookup(subject)
    }

    /// Next offset `topic` would assign; `None` if never produced to.
    pub fn high_watermark(&self, topic: &str) -> Option<i64> {
        self.state.offsets.high_watermark(topic)
    }

    pub fn active_topics(&self) -> Vec<String> {
        self.state.router.active_topics()
    }

    pub fn stream_count(&self, topic: &str) -> usize {
        self.state.router.stream_count(topic)
    }

    pub fn listener_count(&self) -> usize {
        self.state.router.listener_count()
    }
}

impl AvroClient for BrokerStub {
    fn initialize(&self) -> BoxFuture<'_, Result<(), StubError>> {
        Box::pin(async move { self.initialize_now() })
    }

    fn get_producer(&self) -> BoxFuture<'_, Result<Arc<dyn AvroProducer>, StubError>> {
        Box::pin(async move { Ok(Arc::new(self.producer()?) as Arc<dyn AvroProducer>) })
    }

    fn get_consumer(
        &self,
        options: ConsumerOptions,
    ) -> BoxFuture<'_, Result<Arc<dyn AvroConsumer>, StubError>> {
        Box::pin(async move { Ok(Arc::new(self.consumer(options)?) as Arc<dyn AvroConsumer>) })
    }
}
