//! Watcher lifecycle controller.
//!
//! A [`Watcher`] owns one pump thread. The pump is the only place where the
//! directory tree and the debouncer are touched: it receives raw signals,
//! keeps the native watches in step, accumulates primitive events and hands
//! flushed batches to the caller's callback. Its select timeout doubles as
//! the debounce timer.

use crate::config::WatcherConfig;
use crate::debounce::Debouncer;
use crate::error::{Error, Result};
use crate::event::{PrimitiveEvent, PrimitiveKind, RawSignal, SemanticEvent};
use crate::exclude::PathExclusions;
use crate::normalize;
use crate::source::{NotifyFactory, SignalSink, SourceFactory};
use crate::table::DescriptorTable;
use crate::tree::DirectoryTree;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use same_file::Handle;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Receives every flushed batch, in flush order, on the pump thread.
pub type EventCallback = Box<dyn FnMut(Vec<SemanticEvent>) + Send>;

/// Receives the one fatal error a watcher can produce.
pub type ErrorHandler = Box<dyn FnOnce(Error) + Send>;

/// Pump wake-up interval while nothing is pending.
const IDLE_TICK: Duration = Duration::from_millis(500);

// ────── public state/useful telemetry ────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Errored,
}

#[derive(Debug, Clone)]
pub struct WatcherStatus {
    pub state: WatcherState,
    pub root: PathBuf,
    pub batches_delivered: usize,
    pub events_delivered: usize,
    pub pending_events: usize,
    pub live_handles: usize,
    pub start_time: Option<Instant>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Telemetry {
    batches: AtomicUsize,
    events: AtomicUsize,
    pending: AtomicUsize,
    live_handles: AtomicUsize,
    last_error: Mutex<Option<String>>,
}

// ────── root identity ────────────────────────────────────────────────────────
#[cfg(any(target_os = "redox", unix))]
fn handle_key(h: &Handle) -> u64 {
    h.ino()
}

#[cfg(not(any(target_os = "redox", unix)))]
fn handle_key(h: &Handle) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    h.hash(&mut hasher);
    hasher.finish()
}

fn identity_of(path: &Path) -> Option<u64> {
    Handle::from_path(path).ok().map(|h| handle_key(&h))
}

// ────── controller ───────────────────────────────────────────────────────────
pub struct Watcher {
    root: PathBuf,
    config: WatcherConfig,
    exclusions: PathExclusions,
    state: Arc<Mutex<WatcherState>>,
    callback: Option<EventCallback>,
    error_handler: Option<ErrorHandler>,
    factory: Box<dyn SourceFactory>,
    /// Open while batches may be delivered. Held for the whole of a
    /// delivery, so closing it waits for an in-flight callback.
    gate: Arc<Mutex<bool>>,
    shutdown_tx: Option<Sender<()>>,
    pump: Option<JoinHandle<()>>,
    telemetry: Arc<Telemetry>,
    start_time: Option<Instant>,
}

impl Watcher {
    /// Prepare a watcher for `root`. Nothing is registered until
    /// [`start`](Self::start).
    pub fn new<F>(root: impl Into<PathBuf>, config: WatcherConfig, callback: F) -> Result<Self>
    where
        F: FnMut(Vec<SemanticEvent>) + Send + 'static,
    {
        config.validate()?;
        let root = root.into();
        let exclusions = PathExclusions::new(&root, &config.exclusions)?;

        Ok(Self {
            root,
            config,
            exclusions,
            state: Arc::new(Mutex::new(WatcherState::Created)),
            callback: Some(Box::new(callback)),
            error_handler: None,
            factory: Box::new(NotifyFactory),
            gate: Arc::new(Mutex::new(true)),
            shutdown_tx: None,
            pump: None,
            telemetry: Arc::new(Telemetry::default()),
            start_time: None,
        })
    }

    pub fn with_error_handler<H>(mut self, handler: H) -> Self
    where
        H: FnOnce(Error) + Send + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Replace the platform backend.
    pub fn with_source<S>(mut self, factory: S) -> Self
    where
        S: SourceFactory + 'static,
    {
        self.factory = Box::new(factory);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, WatcherState>> {
        self.state
            .lock()
            .map_err(|_| Error::InvalidState("state lock poisoned".into()))
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the whole tree and spawn the pump.
    ///
    /// The initial walk runs on the calling thread, so when this returns
    /// every directory that could be watched is watched.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut g = self.lock_state()?;
            match *g {
                WatcherState::Created => *g = WatcherState::Starting,
                WatcherState::Running => return Ok(()), // idempotent
                other => {
                    return Err(Error::InvalidState(format!("cannot start from {other:?}")))
                }
            }
        }

        match self.launch() {
            Ok(()) => {
                let mut g = self.lock_state()?;
                // the pump may already have failed
                if *g == WatcherState::Starting {
                    *g = WatcherState::Running;
                }
                info!(
                    root = %self.root.display(),
                    watched = self.telemetry.live_handles.load(Ordering::SeqCst),
                    "watcher started"
                );
                Ok(())
            }
            Err(e) => {
                *self.lock_state()? = WatcherState::Stopped;
                warn!(root = %self.root.display(), error = %e, "watcher failed to start");
                Err(e)
            }
        }
    }

    fn launch(&mut self) -> Result<()> {
        let meta = fs::metadata(&self.root)
            .map_err(|e| Error::Start(format!("{}: {e}", self.root.display())))?;
        if !meta.is_dir() {
            return Err(Error::Start(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        let root_key = identity_of(&self.root)
            .ok_or_else(|| Error::Start(format!("cannot open {}", self.root.display())))?;

        let (sink, signals) = SignalSink::new(self.config.max_queue_size);
        let overflow = sink.overflow_flag();
        let source = self
            .factory
            .connect(sink)
            .map_err(|e| Error::Start(e.to_string()))?;
        let tree = DirectoryTree::build(
            &self.root,
            DescriptorTable::new(source),
            self.exclusions.clone(),
        )?;
        self.telemetry
            .live_handles
            .store(tree.watched_count(), Ordering::SeqCst);

        let callback = self
            .callback
            .take()
            .ok_or_else(|| Error::InvalidState("watcher was already started once".into()))?;
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let pump = Pump {
            root: self.root.clone(),
            root_key,
            queue_capacity: self.config.max_queue_size,
            tree,
            debouncer: Debouncer::new(self.config.debounce_ms),
            exclusions: self.exclusions.clone(),
            overflow,
            callback,
            error_handler: self.error_handler.take(),
            gate: Arc::clone(&self.gate),
            state: Arc::clone(&self.state),
            telemetry: Arc::clone(&self.telemetry),
        };
        let handle = thread::Builder::new()
            .name("sentinel-pump".into())
            .spawn(move || pump.run(signals, shutdown_rx))?;

        self.shutdown_tx = Some(shutdown_tx);
        self.pump = Some(handle);
        self.start_time = Some(Instant::now());
        Ok(())
    }

    /// Stop delivering, release every native handle and join the pump.
    ///
    /// No batch is delivered once this has been called. Safe to call from
    /// any state, any number of times; an errored watcher stays `Errored`.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut g = self.lock_state()?;
            match *g {
                WatcherState::Stopped => return Ok(()),
                WatcherState::Errored => {}
                _ => *g = WatcherState::Stopping,
            }
        }

        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;

        if let Some(tx) = self.shutdown_tx.take() {
            // the pump may have exited on its own already
            let _ = tx.send(());
        }
        if let Some(h) = self.pump.take() {
            if h.join().is_err() {
                warn!(root = %self.root.display(), "pump thread panicked");
            }
        }
        self.telemetry.pending.store(0, Ordering::SeqCst);

        let mut g = self.lock_state()?;
        if *g != WatcherState::Errored {
            *g = WatcherState::Stopped;
        }
        let state = *g;
        info!(root = %self.root.display(), ?state, "watcher stopped");
        Ok(())
    }

    pub fn status(&self) -> Result<WatcherStatus> {
        let state = *self.lock_state()?;
        let last_error = self
            .telemetry
            .last_error
            .lock()
            .map_err(|_| Error::InvalidState("status lock poisoned".into()))?
            .clone();
        Ok(WatcherStatus {
            state,
            root: self.root.clone(),
            batches_delivered: self.telemetry.batches.load(Ordering::SeqCst),
            events_delivered: self.telemetry.events.load(Ordering::SeqCst),
            pending_events: self.telemetry.pending.load(Ordering::SeqCst),
            live_handles: self.telemetry.live_handles.load(Ordering::SeqCst),
            start_time: self.start_time,
            last_error,
        })
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        let _ = self.stop(); // ignore errors during drop
    }
}

// ────── pump ─────────────────────────────────────────────────────────────────
enum Step {
    Signal(RawSignal),
    Disconnected,
    Shutdown,
    Tick,
}

struct Pump {
    root: PathBuf,
    root_key: u64,
    queue_capacity: usize,
    tree: DirectoryTree,
    debouncer: Debouncer,
    exclusions: PathExclusions,
    overflow: Arc<AtomicBool>,
    callback: EventCallback,
    error_handler: Option<ErrorHandler>,
    gate: Arc<Mutex<bool>>,
    state: Arc<Mutex<WatcherState>>,
    telemetry: Arc<Telemetry>,
}

impl Pump {
    fn run(mut self, signals: Receiver<RawSignal>, shutdown: Receiver<()>) {
        loop {
            let timeout = match self.debouncer.deadline() {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => IDLE_TICK,
            };

            let step = select! {
                recv(shutdown) -> _ => Step::Shutdown,
                recv(signals) -> msg => match msg {
                    Ok(signal) => Step::Signal(signal),
                    Err(_) => Step::Disconnected,
                },
                default(timeout) => Step::Tick,
            };

            match step {
                Step::Shutdown => break,
                Step::Disconnected => {
                    return self.fail("notification source disconnected".into());
                }
                Step::Signal(signal) => {
                    if let Err(reason) = self.handle(signal) {
                        return self.fail(reason);
                    }
                }
                Step::Tick => {}
            }

            if self.overflow.load(Ordering::SeqCst) {
                let reason = format!(
                    "signal queue overflowed ({} entries), events were lost",
                    self.queue_capacity
                );
                return self.fail(reason);
            }

            if self.debouncer.is_due(Instant::now()) {
                self.deliver();
            }
            self.publish();
        }

        let dropped = self.debouncer.discard();
        if dropped > 0 {
            debug!(dropped, "pending events discarded on shutdown");
        }
        self.tree.teardown();
        self.publish();
    }

    /// Feed one signal through the tree and into the debouncer. An `Err`
    /// carries the reason the watcher cannot go on.
    fn handle(&mut self, signal: RawSignal) -> std::result::Result<(), String> {
        let event = match &signal {
            RawSignal::Failure(msg) => return Err(format!("backend failure: {msg}")),
            RawSignal::Rescan => {
                return Err("backend dropped events, the watch tree is no longer accurate".into())
            }
            RawSignal::Change { .. } => match normalize::to_primitive(&signal, Instant::now()) {
                Some(ev) => ev,
                None => return Ok(()),
            },
        };

        if event.path == self.root {
            let gone = matches!(event.kind, PrimitiveKind::Removed | PrimitiveKind::RenamedFrom);
            if gone && identity_of(&self.root) != Some(self.root_key) {
                return Err(format!("watched root {} was removed", self.root.display()));
            }
            trace!(kind = ?event.kind, "event on root itself, not delivered");
            return Ok(());
        }
        if !event.path.starts_with(&self.root) || self.exclusions.is_excluded(&event.path) {
            trace!(path = %event.path.display(), "dropped");
            return Ok(());
        }

        debug!(kind = ?event.kind, path = %event.path.display(), token = ?event.token, "signal");
        let found = self.tree.apply(&event);
        let (kind, timestamp) = (event.kind, event.timestamp);
        self.debouncer.push(event);

        // a new directory's contents may predate its watch
        if kind == PrimitiveKind::Added {
            for path in found {
                self.debouncer.push(PrimitiveEvent::new(PrimitiveKind::Added, path, timestamp));
            }
        }
        Ok(())
    }

    fn deliver(&mut self) {
        let batch = self.debouncer.flush();
        if batch.is_empty() {
            return;
        }

        let gate = Arc::clone(&self.gate);
        let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !*open {
            debug!(events = batch.len(), "gate closed, batch dropped");
            return;
        }

        let count = batch.len();
        let callback = &mut self.callback;
        match catch_unwind(AssertUnwindSafe(|| callback(batch))) {
            Ok(()) => {
                self.telemetry.batches.fetch_add(1, Ordering::SeqCst);
                self.telemetry.events.fetch_add(count, Ordering::SeqCst);
                debug!(events = count, "batch delivered");
            }
            Err(_) => warn!(events = count, "callback panicked, batch dropped"),
        }
    }

    fn publish(&self) {
        self.telemetry
            .pending
            .store(self.debouncer.pending_len(), Ordering::SeqCst);
        self.telemetry
            .live_handles
            .store(self.tree.watched_count(), Ordering::SeqCst);
    }

    fn fail(mut self, reason: String) {
        error!(root = %self.root.display(), %reason, "watcher failed");
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = WatcherState::Errored;
        *self
            .telemetry
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());

        let dropped = self.debouncer.discard();
        if dropped > 0 {
            debug!(dropped, "pending events discarded");
        }

        if let Some(handler) = self.error_handler.take() {
            let err = Error::BackendFatal(reason);
            if catch_unwind(AssertUnwindSafe(|| handler(err))).is_err() {
                warn!("error handler panicked");
            }
        }

        self.tree.teardown();
        self.publish();
    }
}
