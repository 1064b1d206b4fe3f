use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::source::{NotificationSource, SignalSink, SourceFactory};

lazy_static! {
    /// Global mutex to serialize environment-variable modifications in tests.
    pub static ref ENV_MUTEX: Mutex<()> = Mutex::new(());
}

/// Shared ledger of what a [`RecordingSource`] has been asked to watch.
#[derive(Debug, Default)]
pub struct Ledger {
    pub open: HashSet<PathBuf>,
    pub opened_total: usize,
    pub closed_total: usize,
    /// Paths whose `open` must fail, simulating vanished entries.
    pub refuse: HashSet<PathBuf>,
}

/// In-memory notification source: records registrations and never emits
/// signals on its own; tests push signals through the captured sink.
#[derive(Debug, Clone, Default)]
pub struct RecordingSource {
    pub ledger: Arc<Mutex<Ledger>>,
    pub sink: Arc<Mutex<Option<SignalSink>>>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.ledger.lock().unwrap().open.len()
    }

    pub fn is_open(&self, path: &Path) -> bool {
        self.ledger.lock().unwrap().open.contains(path)
    }

    pub fn refuse(&self, path: &Path) {
        self.ledger.lock().unwrap().refuse.insert(path.to_path_buf());
    }

    /// Sink handed over by the watcher on `connect`.
    pub fn sink(&self) -> SignalSink {
        self.sink.lock().unwrap().clone().expect("source was never connected")
    }
}

impl NotificationSource for RecordingSource {
    fn open(&mut self, path: &Path) -> Result<()> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.refuse.contains(path) || !path.is_dir() {
            return Err(Error::Registration {
                path: path.to_path_buf(),
                reason: "refused by recording source".into(),
            });
        }
        ledger.open.insert(path.to_path_buf());
        ledger.opened_total += 1;
        Ok(())
    }

    fn close(&mut self, path: &Path) -> Result<()> {
        let mut ledger = self.ledger.lock().unwrap();
        if ledger.open.remove(path) {
            ledger.closed_total += 1;
        }
        Ok(())
    }
}

impl SourceFactory for RecordingSource {
    fn connect(&self, sink: SignalSink) -> Result<Box<dyn NotificationSource>> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Box::new(self.clone()))
    }
}
