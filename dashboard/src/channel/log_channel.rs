//! Observable, append-only build-log channel

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::channel::event::{decode_binary_event, decode_event};
use crate::channel::stream;
use crate::errors::DashError;
use crate::models::log_line::LogLine;

/// Connection state of the channel, driven by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// Never opened
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ChannelState {
    /// Whether no further lines will arrive without a fresh `open`
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Errored)
    }
}

/// Counters for what the channel has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    /// Inbound events, decodable or not
    pub received: u64,
    pub appended: u64,
    pub malformed: u64,
    pub stream_errors: u64,
}

/// Handle returned by [`LogChannel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&LogLine) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer)>,
}

/// Appended lines waiting for their observer round
#[derive(Default)]
struct Delivery {
    queue: VecDeque<LogLine>,
    draining: bool,
}

/// State shared between the channel and its connection task
pub(crate) struct Shared {
    lines: Mutex<Vec<LogLine>>,
    observers: Mutex<Observers>,
    stats: Mutex<ChannelStats>,
    /// Orders buffer pushes, observer notification and generation changes.
    /// Never held while an observer runs.
    delivery: Mutex<Delivery>,
    /// Bumped on every open and close; a connection task only acts while
    /// its generation is current
    generation: AtomicU64,
    state_tx: watch::Sender<ChannelState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Idle);
        Self {
            lines: Mutex::new(Vec::new()),
            observers: Mutex::new(Observers::default()),
            stats: Mutex::new(ChannelStats::default()),
            delivery: Mutex::new(Delivery::default()),
            generation: AtomicU64::new(0),
            state_tx,
        }
    }

    /// Start a new generation and move to `state` in one step
    fn begin_generation(&self, state: ChannelState) -> u64 {
        let _delivery = lock(&self.delivery);
        let mut generation = 0;
        self.state_tx.send_modify(|current| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *current = state;
        });
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply a transport-driven transition unless the connection is stale
    pub(crate) fn transition(&self, generation: u64, state: ChannelState) -> bool {
        self.state_tx.send_if_modified(|current| {
            if !self.is_current(generation) || *current == state {
                return false;
            }
            debug!("Build-log channel {:?} -> {:?}", current, state);
            *current = state;
            true
        })
    }

    /// Record a connection-level fault. Never fatal.
    pub(crate) fn stream_error(&self, generation: u64, err: DashError) {
        if !self.is_current(generation) {
            return;
        }
        error!("Build-log {}", err);
        lock(&self.stats).stream_errors += 1;
        self.transition(generation, ChannelState::Errored);
    }

    pub(crate) fn on_text(&self, generation: u64, raw: &str) {
        if self.is_current(generation) {
            self.deliver(Some(generation), decode_event(raw));
        }
    }

    pub(crate) fn on_binary(&self, generation: u64, raw: &[u8]) {
        if self.is_current(generation) {
            self.deliver(Some(generation), decode_binary_event(raw));
        }
    }

    fn deliver(&self, generation: Option<u64>, decoded: Result<LogLine, DashError>) -> Option<LogLine> {
        lock(&self.stats).received += 1;
        match decoded {
            Ok(line) => self.append(generation, line.clone()).then_some(line),
            Err(e) => {
                warn!("Dropping build-log event: {}", e);
                lock(&self.stats).malformed += 1;
                None
            }
        }
    }

    /// Push `line` and run observers for it.
    ///
    /// A line from a connection task is dropped once its generation has
    /// ended. Observers run outside every lock; a line appended while another
    /// caller is notifying is queued and notified by that caller, so buffer
    /// order and notification order stay identical.
    fn append(&self, generation: Option<u64>, line: LogLine) -> bool {
        {
            let mut delivery = lock(&self.delivery);
            if generation.is_some_and(|generation| !self.is_current(generation)) {
                debug!("Dropping build-log line from a closed connection");
                return false;
            }

            lock(&self.lines).push(line.clone());
            lock(&self.stats).appended += 1;
            delivery.queue.push_back(line);
            if delivery.draining {
                return true;
            }
            delivery.draining = true;
        }
        self.drain();
        true
    }

    fn drain(&self) {
        let _unwind = DrainGuard(self);
        loop {
            let line = {
                let mut delivery = lock(&self.delivery);
                match delivery.queue.pop_front() {
                    Some(line) => line,
                    None => {
                        delivery.draining = false;
                        return;
                    }
                }
            };

            let observers: Vec<Observer> = lock(&self.observers)
                .entries
                .iter()
                .map(|(_, observer)| observer.clone())
                .collect();
            for observer in observers {
                observer(&line);
            }
        }
    }
}

/// Hands draining back if an observer panics
struct DrainGuard<'a>(&'a Shared);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(&self.0.delivery).draining = false;
        }
    }
}

struct Connection {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// A single live connection to the build-log stream, presented as a growing
/// sequence of lines.
///
/// Lines are kept in arrival order until [`clear`](Self::clear). Observers
/// are called once per appended line, in buffer order, and may call back into
/// the channel (read, clear, append, close).
pub struct LogChannel {
    shared: Arc<Shared>,
    connection: Mutex<Option<Connection>>,
    endpoint: Mutex<Option<Url>>,
}

impl LogChannel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            connection: Mutex::new(None),
            endpoint: Mutex::new(None),
        }
    }

    /// Connect to `endpoint` in the background.
    ///
    /// Failures never surface here: they are logged and move the channel to
    /// [`ChannelState::Errored`]. A live connection is closed first. Must be
    /// called from within a tokio runtime.
    pub fn open(&self, endpoint: &str) {
        self.close();

        let generation = self.shared.begin_generation(ChannelState::Connecting);

        let url = match Url::parse(endpoint) {
            Ok(url) => url,
            Err(e) => {
                self.shared.stream_error(
                    generation,
                    DashError::StreamError(format!("invalid endpoint {endpoint}: {e}")),
                );
                return;
            }
        };
        *lock(&self.endpoint) = Some(url.clone());

        info!("Opening build-log stream: {}", url);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(stream::run(self.shared.clone(), generation, url, shutdown_rx));
        *lock(&self.connection) = Some(Connection {
            shutdown_tx,
            handle,
        });
    }

    /// Decode one raw event and append it.
    ///
    /// Malformed events are dropped with a diagnostic and `None` is returned.
    pub fn on_message(&self, raw: &str) -> Option<LogLine> {
        self.shared.deliver(None, decode_event(raw))
    }

    /// Register an observer called once per appended line
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&LogLine) + Send + Sync + 'static,
    {
        let mut observers = lock(&self.shared.observers);
        observers.next_id += 1;
        let id = SubscriptionId(observers.next_id);
        observers.entries.push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = lock(&self.shared.observers);
        let before = observers.entries.len();
        observers.entries.retain(|(entry_id, _)| *entry_id != id);
        observers.entries.len() != before
    }

    /// Empty the visible buffer. The connection is untouched.
    pub fn clear(&self) {
        lock(&self.shared.lines).clear();
    }

    /// Release the connection. Safe to call any number of times.
    pub fn close(&self) {
        if let Some(connection) = self.detach() {
            let _ = connection.shutdown_tx.send(());
        }
    }

    /// Close and wait for the connection task to finish its close handshake
    pub async fn shutdown(&self) {
        if let Some(connection) = self.detach() {
            let _ = connection.shutdown_tx.send(());
            if let Err(e) = connection.handle.await {
                warn!("Build-log connection task ended abnormally: {}", e);
            }
        }
    }

    fn detach(&self) -> Option<Connection> {
        let connection = lock(&self.connection).take()?;
        self.shared.begin_generation(ChannelState::Closed);
        info!("Build-log stream closed");
        Some(connection)
    }

    /// Snapshot of the visible lines, oldest first
    pub fn lines(&self) -> Vec<LogLine> {
        lock(&self.shared.lines).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.lines).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    pub fn stats(&self) -> ChannelStats {
        *lock(&self.shared.stats)
    }

    /// The endpoint of the most recent successful `open`
    pub fn endpoint(&self) -> Option<Url> {
        lock(&self.endpoint).clone()
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LogChannel {
    fn drop(&mut self) {
        self.close();
    }
}
