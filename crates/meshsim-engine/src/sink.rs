//! Event sinks receiving finished and started hop events

use dashmap::DashMap;
use meshsim_types::{TraceEvent, TraceId};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{Result, SimError};

/// Consumer of trace events.
///
/// Recording is fire-and-forget: the engine never waits on a sink and never
/// inspects the outcome.
pub trait EventSink: Send + Sync {
    fn record(&self, event: TraceEvent);
}

/// In-memory sink for testing and inspection
pub struct MemoryEventSink {
    events: RwLock<Vec<TraceEvent>>,
    by_trace: DashMap<TraceId, Vec<TraceEvent>>,
}

impl MemoryEventSink {
    /// Create a new memory sink
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            by_trace: DashMap::new(),
        }
    }

    /// All events in the order they were recorded
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.read().clone()
    }

    /// Events of one trace in the order they were recorded
    pub fn events_for_trace(&self, trace_id: &TraceId) -> Vec<TraceEvent> {
        self.by_trace
            .get(trace_id)
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Distinct trace ids seen so far
    pub fn trace_ids(&self) -> Vec<TraceId> {
        let mut ids: Vec<TraceId> = self.by_trace.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clear all events
    pub fn clear(&self) {
        let mut events = self.events.write();
        events.clear();
        self.by_trace.clear();
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: TraceEvent) {
        // Hold the log lock while indexing so both views agree on order.
        let mut events = self.events.write();
        self.by_trace
            .entry(event.context.trace_id.clone())
            .or_default()
            .push(event.clone());
        events.push(event);
    }
}

/// Sink forwarding events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: TraceEvent) {
        info!(
            target: "meshsim::events",
            phase = ?event.phase,
            source = %event.source,
            destination = event.destination.as_deref().unwrap_or("-"),
            operation = %event.operation,
            transport = %event.transport,
            status = event.status.map(|s| s.as_u16()),
            response = event.response.as_deref(),
            trace_id = %event.context.trace_id,
            span_id = %event.context.span_id,
            parent_span_id = event.context.parent_span_id.as_ref().map(|s| s.as_str()),
            depth = event.context.depth,
            "trace event"
        );
    }
}

enum FileCommand {
    Record(TraceEvent),
    Flush(oneshot::Sender<()>),
}

/// Sink appending events as JSON lines to a file.
///
/// Writes happen on a background task so `record` never blocks the caller.
pub struct FileEventSink {
    path: PathBuf,
    tx: mpsc::UnboundedSender<FileCommand>,
    writer: JoinHandle<()>,
}

impl FileEventSink {
    /// Open (or create) the file and start the writer task.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(file, path.clone(), rx));

        Ok(Self { path, tx, writer })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until every event recorded so far has been written.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(FileCommand::Flush(ack_tx))
            .map_err(|_| SimError::Io(std::io::Error::other("event writer stopped")))?;
        ack_rx
            .await
            .map_err(|_| SimError::Io(std::io::Error::other("event writer stopped")))
    }

    /// Read all events back from the file
    pub async fn read_all(&self) -> Result<Vec<TraceEvent>> {
        read_events(&self.path).await
    }

    /// Stop accepting events and wait for the writer to drain.
    pub async fn close(self) -> Result<()> {
        let Self { tx, writer, .. } = self;
        drop(tx);
        writer
            .await
            .map_err(|e| SimError::Io(std::io::Error::other(e.to_string())))
    }
}

impl EventSink for FileEventSink {
    fn record(&self, event: TraceEvent) {
        if self.tx.send(FileCommand::Record(event)).is_err() {
            warn!(path = %self.path.display(), "Event writer stopped, dropping event");
        }
    }
}

async fn write_loop(
    mut file: File,
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<FileCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            FileCommand::Record(event) => {
                let line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(error = %e, "Failed to serialize trace event");
                        continue;
                    }
                };
                if let Err(e) = append_line(&mut file, &line).await {
                    error!(path = %path.display(), error = %e, "Failed to append trace event");
                }
            }
            FileCommand::Flush(ack) => {
                if let Err(e) = file.flush().await {
                    error!(path = %path.display(), error = %e, "Failed to flush event file");
                }
                let _ = ack.send(());
            }
        }
    }

    if let Err(e) = file.flush().await {
        error!(path = %path.display(), error = %e, "Failed to flush event file");
    }
}

async fn append_line(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}

/// Read JSON-lines trace events from `path`.
pub async fn read_events(path: &Path) -> Result<Vec<TraceEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: TraceEvent = serde_json::from_str(&line)?;
        events.push(event);
    }

    Ok(events)
}

/// Composite sink that records to multiple sinks
pub struct CompositeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeSink {
    /// Create a new composite sink
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    /// Add a sink
    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for CompositeSink {
    fn record(&self, event: TraceEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}
