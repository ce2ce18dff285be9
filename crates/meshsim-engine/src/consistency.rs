//! Eventual-consistency race between a delayed writer and an eager reader.

use meshsim_types::{TraceHeaders, TransportKind};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::invoker::{Hop, Invoker};
use crate::simulator::root_context;

const WRITER: &str = "eventual-consistency-write-service";
const READER: &str = "eventual-consistency-read-service";
const DATABASE: &str = "database-service";

/// Returned by a read that sees no applied write.
pub const STALE_RESPONSE: &str = "Stale Data (Not Updated Yet)";

const NO_RUNTIME: &str = "no async runtime to schedule the write";

/// Returned by a write as soon as it is accepted.
pub const WRITE_ACCEPTED_RESPONSE: &str = "Write request received. Data will be available soon!";

/// The single `latestData` slot shared by readers and writers.
#[derive(Debug, Default)]
pub struct SimulatedDatabase {
    latest: RwLock<Option<String>>,
}

impl SimulatedDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, value: String) {
        *self.latest.write() = Some(value);
    }

    pub fn latest(&self) -> Option<String> {
        self.latest.read().clone()
    }
}

/// Writer and reader services over one [`SimulatedDatabase`].
#[derive(Clone)]
pub struct EventualConsistency {
    invoker: Invoker,
    database: Arc<SimulatedDatabase>,
    write_delay: Duration,
    pending: Arc<AtomicUsize>,
}

impl EventualConsistency {
    pub fn new(invoker: Invoker, database: Arc<SimulatedDatabase>, write_delay: Duration) -> Self {
        Self {
            invoker,
            database,
            write_delay,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn database(&self) -> &Arc<SimulatedDatabase> {
        &self.database
    }

    /// Writes accepted but not yet applied.
    pub fn pending_writes(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Accept a write and apply it after the configured delay.
    ///
    /// Returns immediately. The hop's end event is recorded by the database
    /// once the value lands, under the context captured here. Outside a Tokio
    /// runtime nothing can be scheduled, so the hop fails with `500`.
    pub fn write(&self, input: impl Into<String>, inbound: Option<&TraceHeaders>) -> String {
        let input = input.into();
        let ctx = root_context(self.invoker.ids(), inbound);
        let open = self.invoker.begin(
            Hop::new(WRITER, "handleWriteRequest", input.clone(), ctx)
                .to(DATABASE)
                .via(TransportKind::Event),
        );

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(error = %err, "No runtime to apply the write");
                return open.fail(format!("Failed to reach {}: {}", DATABASE, NO_RUNTIME));
            }
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        let database = self.database.clone();
        let pending = self.pending.clone();
        let delay = self.write_delay;

        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            database.store(input);
            debug!(span_id = %open.context().span_id, "Write applied");
            open.relabel(DATABASE, Some(WRITER.to_string()), "finalizeWrite")
                .succeed("Updated in DB".to_string());
            pending.fetch_sub(1, Ordering::SeqCst);
        });

        info!(delay_ms = delay.as_millis() as u64, "Write accepted");
        WRITE_ACCEPTED_RESPONSE.to_string()
    }

    /// Read whatever the database holds when the read hop runs.
    pub async fn read(&self, inbound: Option<&TraceHeaders>) -> String {
        let ctx = root_context(self.invoker.ids(), inbound);
        let hop = Hop::new(READER, "handleReadRequest", "Fetch latest", ctx).to(DATABASE);
        self.invoker
            .run(hop, async {
                Ok(self
                    .database
                    .latest()
                    .unwrap_or_else(|| STALE_RESPONSE.to_string()))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::TransportError;
    use crate::sink::MemoryEventSink;
    use crate::transport::{CallRequest, Transport};
    use async_trait::async_trait;
    use meshsim_types::{SequentialIds, StatusCode};

    struct NoTransport;

    #[async_trait]
    impl Transport for NoTransport {
        async fn call(&self, request: CallRequest) -> Result<String, TransportError> {
            Err(TransportError::Unavailable {
                destination: request.destination,
            })
        }
    }

    #[test]
    fn write_without_runtime_fails_the_hop() {
        let sink = Arc::new(MemoryEventSink::new());
        let invoker = Invoker::new(
            sink.clone(),
            Arc::new(SequentialIds::new("w")),
            Arc::new(NoTransport),
            true,
        );
        let consistency = EventualConsistency::new(
            invoker,
            Arc::new(SimulatedDatabase::new()),
            Duration::from_millis(10),
        );

        let response = consistency.write("v", None);
        assert!(response.starts_with("Failed to reach database-service"));
        assert_eq!(consistency.pending_writes(), 0);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, Some(StatusCode::INTERNAL_ERROR));
        assert!(consistency.database().latest().is_none());
    }

    #[test]
    fn database_holds_last_value() {
        let db = SimulatedDatabase::new();
        assert!(db.latest().is_none());
        db.store("first".into());
        db.store("second".into());
        assert_eq!(db.latest().as_deref(), Some("second"));
    }
}
