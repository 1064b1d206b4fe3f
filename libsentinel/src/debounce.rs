//! Sliding-window debouncing and batch coalescing.
//!
//! `Idle → Accumulating → Flushing → Idle`. Every pushed event moves the
//! deadline to `arrival + window`, so a batch is only flushed once activity
//! has been quiet for a full window. The pump owns one debouncer and polls
//! its single deadline; there is no timer per event.

use crate::event::{Action, PrimitiveEvent, PrimitiveKind, SemanticEvent};
use crate::normalize::{merge_rename, to_semantic};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Accumulating,
    Flushing,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Vec<PrimitiveEvent>,
    deadline: Option<Instant>,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(debounce_window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(debounce_window_ms),
            pending: Vec::new(),
            deadline: None,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn push(&mut self, event: PrimitiveEvent) {
        let deadline = event.timestamp + self.window;
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.max(deadline)));
        self.pending.push(event);
        self.state = DebounceState::Accumulating;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Throw the pending batch away without producing anything.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.deadline = None;
        self.state = DebounceState::Idle;
        dropped
    }

    /// Drain the pending batch and turn it into semantic events.
    ///
    /// The batch is cleared before anything else happens, so whatever the
    /// caller does with the result it is never seen twice.
    pub fn flush(&mut self) -> Vec<SemanticEvent> {
        self.state = DebounceState::Flushing;
        let batch = std::mem::take(&mut self.pending);
        self.deadline = None;
        let out = coalesce(batch);
        self.state = DebounceState::Idle;
        out
    }
}

/// Pair rename halves by token, degrade the rest, then collapse repeats.
fn coalesce(batch: Vec<PrimitiveEvent>) -> Vec<SemanticEvent> {
    let partner = pair_renames(&batch);
    let mut consumed = vec![false; batch.len()];
    let mut merged = Vec::with_capacity(batch.len());

    for (i, ev) in batch.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        match partner[i] {
            Some(j) => {
                consumed[j] = true;
                let (from, to) = if ev.kind == PrimitiveKind::RenamedFrom {
                    (ev, &batch[j])
                } else {
                    (&batch[j], ev)
                };
                merged.push(merge_rename(from, to));
            }
            None => merged.push(to_semantic(ev)),
        }
    }

    collapse_repeats(merged)
}

/// For every event, the index of its rename partner in the same batch.
/// Halves sharing a token are matched in arrival order.
fn pair_renames(batch: &[PrimitiveEvent]) -> Vec<Option<usize>> {
    let mut halves: HashMap<u64, (VecDeque<usize>, VecDeque<usize>)> = HashMap::new();
    for (i, ev) in batch.iter().enumerate() {
        let Some(token) = ev.token else { continue };
        let entry = halves.entry(token).or_default();
        match ev.kind {
            PrimitiveKind::RenamedFrom => entry.0.push_back(i),
            PrimitiveKind::RenamedTo => entry.1.push_back(i),
            _ => {}
        }
    }

    let mut partner = vec![None; batch.len()];
    for (mut froms, mut tos) in halves.into_values() {
        while let (Some(f), Some(t)) = (froms.pop_front(), tos.pop_front()) {
            partner[f] = Some(t);
            partner[t] = Some(f);
        }
    }
    partner
}

/// Drop an event that repeats the last surviving action for the same path.
fn collapse_repeats(events: Vec<SemanticEvent>) -> Vec<SemanticEvent> {
    let mut last: HashMap<PathBuf, Action> = HashMap::new();
    let mut out = Vec::with_capacity(events.len());

    for ev in events {
        let path = ev.path();
        if ev.action == Action::Renamed {
            last.insert(path, Action::Deleted);
            if let Some(new_path) = ev.new_path() {
                last.insert(new_path, Action::Created);
            }
            out.push(ev);
            continue;
        }
        if last.get(&path) == Some(&ev.action) {
            continue;
        }
        last.insert(path, ev.action);
        out.push(ev);
    }
    out
}
