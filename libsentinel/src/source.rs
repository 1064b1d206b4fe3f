//! Platform notification sources.
//!
//! A source turns one `open(path)` call into a native, non-recursive watch
//! on that directory and pushes [`RawSignal`]s into a [`SignalSink`]. The
//! default backend adapts the `notify` crate; tests plug in an in-memory
//! source through [`SourceFactory`].

use crate::error::{Error, Result};
use crate::event::{PrimitiveKind, RawSignal};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use notify::{
    event::{ModifyKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcherTrait,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Tokens minted locally carry this bit so they never collide with
/// platform rename cookies.
pub const SYNTHETIC_TOKEN_BIT: u64 = 1 << 63;

/// Native watch primitive as seen by the descriptor table.
pub trait NotificationSource: Send {
    /// Start watching the entries directly inside `path`.
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Stop watching `path`. Closing a watch the backend already dropped
    /// must succeed.
    fn close(&mut self, path: &Path) -> Result<()>;
}

/// Builds a source wired to the pump of one watcher.
pub trait SourceFactory: Send {
    fn connect(&self, sink: SignalSink) -> Result<Box<dyn NotificationSource>>;
}

/// Producer side of the bounded signal queue.
///
/// `emit` never blocks the backend thread: when the queue is full the
/// signal is dropped and the overflow flag is raised, which the pump treats
/// as fatal.
#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: Sender<RawSignal>,
    overflowed: Arc<AtomicBool>,
}

impl SignalSink {
    pub fn new(capacity: usize) -> (Self, Receiver<RawSignal>) {
        let (tx, rx) = bounded(capacity);
        let sink = Self {
            tx,
            overflowed: Arc::new(AtomicBool::new(false)),
        };
        (sink, rx)
    }

    /// Returns false when the signal could not be queued.
    pub fn emit(&self, signal: RawSignal) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflowed.store(true, Ordering::SeqCst);
                false
            }
            // pump already gone, nobody is listening
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::SeqCst)
    }

    /// The overflow flag on its own, for a consumer that must not hold a
    /// sender.
    pub fn overflow_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.overflowed)
    }
}

// ────── notify backend ───────────────────────────────────────────────────────

/// Default factory: one `notify::RecommendedWatcher` per watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyFactory;

impl SourceFactory for NotifyFactory {
    fn connect(&self, sink: SignalSink) -> Result<Box<dyn NotificationSource>> {
        let mut translator = Translator::default();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for signal in translator.translate(event) {
                        sink.emit(signal);
                    }
                }
                Err(e) => {
                    sink.emit(RawSignal::Failure(e.to_string()));
                }
            },
            notify::Config::default(),
        )?;
        Ok(Box::new(NotifySource { watcher }))
    }
}

pub struct NotifySource {
    watcher: RecommendedWatcher,
}

impl NotificationSource for NotifySource {
    fn open(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Registration {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn close(&mut self, path: &Path) -> Result<()> {
        match self.watcher.unwatch(path) {
            Ok(()) => Ok(()),
            // the backend drops watches on its own when the directory goes away
            Err(e) if matches!(e.kind, notify::ErrorKind::WatchNotFound) => Ok(()),
            Err(e) => Err(Error::Watch(e)),
        }
    }
}

/// Maps `notify` events onto raw signals.
///
/// Keeps just enough state to pair a tokenless old-name record with the
/// new-name record that immediately follows it.
#[derive(Debug, Default)]
pub struct Translator {
    pending_from: Option<u64>,
    next_synthetic: u64,
}

impl Translator {
    fn mint(&mut self) -> u64 {
        self.next_synthetic = self.next_synthetic.wrapping_add(1);
        SYNTHETIC_TOKEN_BIT | (self.next_synthetic & !SYNTHETIC_TOKEN_BIT)
    }

    pub fn translate(&mut self, event: Event) -> Vec<RawSignal> {
        if event.need_rescan() {
            self.pending_from = None;
            return vec![RawSignal::Rescan];
        }

        // access notifications carry no change and must not break a pair
        if matches!(event.kind, EventKind::Access(_)) {
            return Vec::new();
        }

        let pending = self.pending_from.take();
        let tracker = event.tracker().map(|t| t as u64);
        trace!(kind = ?event.kind, paths = ?event.paths, ?tracker, "notify event");

        let all = |kind: PrimitiveKind, event: Event| -> Vec<RawSignal> {
            event
                .paths
                .into_iter()
                .map(|p| RawSignal::change(kind, p))
                .collect()
        };

        let kind = event.kind;
        match kind {
            EventKind::Create(_) => all(PrimitiveKind::Added, event),
            EventKind::Remove(_) => all(PrimitiveKind::Removed, event),
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    let token = match tracker {
                        Some(t) => t,
                        None => {
                            let t = self.mint();
                            self.pending_from = Some(t);
                            t
                        }
                    };
                    event
                        .paths
                        .into_iter()
                        .take(1)
                        .map(|p| RawSignal::rename_half(PrimitiveKind::RenamedFrom, p, token))
                        .collect()
                }
                RenameMode::To => {
                    let token = tracker.or(pending);
                    event
                        .paths
                        .into_iter()
                        .take(1)
                        .map(|p| match token {
                            Some(t) => RawSignal::rename_half(PrimitiveKind::RenamedTo, p, t),
                            None => RawSignal::change(PrimitiveKind::RenamedTo, p),
                        })
                        .collect()
                }
                RenameMode::Both => {
                    // with a tracker both halves were already reported separately
                    if tracker.is_some() || event.paths.len() < 2 {
                        debug!(paths = ?event.paths, "skipping combined rename record");
                        return Vec::new();
                    }
                    let token = self.mint();
                    let mut paths = event.paths.into_iter();
                    let (from, to) = match (paths.next(), paths.next()) {
                        (Some(from), Some(to)) => (from, to),
                        _ => return Vec::new(),
                    };
                    vec![
                        RawSignal::rename_half(PrimitiveKind::RenamedFrom, from, token),
                        RawSignal::rename_half(PrimitiveKind::RenamedTo, to, token),
                    ]
                }
                RenameMode::Any | RenameMode::Other => event
                    .paths
                    .into_iter()
                    .map(|p| {
                        let kind = if p.symlink_metadata().is_ok() {
                            PrimitiveKind::RenamedTo
                        } else {
                            PrimitiveKind::RenamedFrom
                        };
                        RawSignal::change(kind, p)
                    })
                    .collect(),
            },
            EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
                all(PrimitiveKind::Modified, event)
            }
            EventKind::Access(_) => Vec::new(),
        }
    }
}
