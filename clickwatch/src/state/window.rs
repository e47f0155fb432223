// clickwatch/src/state/window.rs
//
// Per-actor rolling click windows.
// DashMap = sharded concurrent HashMap; every actor's queue sits behind its own
// mutex, so ingestion for one actor never contends with sampling of another.
//
// Design:
//   - One VecDeque<ClickEvent> per actor, arrival-ordered
//   - Orientation stored inline as Option<Orientation>, so the timestamp and
//     orientation sequences cannot drift apart when pruned
//   - Pruning is a monotonic queue pop against `now - window_millis`, run on
//     both the ingestion path (record) and the sampling path (snapshot)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::events::{ActorId, ClickEvent, Orientation};

// ── Per-actor window ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ActorWindow {
    events: VecDeque<ClickEvent>,
    last_seen: i64,
}

impl ActorWindow {
    pub fn push(&mut self, event: ClickEvent) {
        self.last_seen = self.last_seen.max(event.timestamp);
        self.events.push_back(event);
    }

    /// Drop events older than `now - window_millis`. Returns how many were dropped.
    pub fn prune(&mut self, now: i64, window_millis: i64) -> usize {
        let cutoff = now.saturating_sub(window_millis);
        let mut dropped = 0;
        while self.events.front().map(|e| e.timestamp < cutoff).unwrap_or(false) {
            self.events.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    fn timestamps(&self) -> Vec<i64> {
        self.events.iter().map(|e| e.timestamp).collect()
    }

    fn orientations(&self) -> Vec<Option<Orientation>> {
        self.events.iter().map(|e| e.orientation).collect()
    }
}

/// Copy of a pruned window, taken under a single lock so both sequences line
/// up index for index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSnapshot {
    pub timestamps: Vec<i64>,
    pub orientations: Vec<Option<Orientation>>,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

// ── Event collector ───────────────────────────────────────────────────────────

pub struct EventCollector {
    windows: DashMap<ActorId, Arc<Mutex<ActorWindow>>>,
    window_millis: i64,
    total_events: AtomicU64,
}

impl EventCollector {
    pub fn new(window_millis: i64) -> Self {
        Self {
            windows: DashMap::new(),
            window_millis,
            total_events: AtomicU64::new(0),
        }
    }

    pub fn window_millis(&self) -> i64 {
        self.window_millis
    }

    /// Append a click and prune the actor's window with `timestamp` as "now".
    /// The window is created on the actor's first click.
    pub fn record(&self, actor: &ActorId, timestamp: i64, orientation: Option<Orientation>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        // Clone the Arc so the shard lock is released before the actor lock is taken.
        let window = self
            .windows
            .entry(actor.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ActorWindow::default())))
            .clone();

        let mut w = window.lock();
        w.push(ClickEvent { timestamp, orientation });
        w.prune(timestamp, self.window_millis);
    }

    /// Pruned copy of the actor's timestamps. Empty for unknown actors.
    pub fn window_snapshot(&self, actor: &ActorId, now: i64) -> Vec<i64> {
        self.with_pruned(actor, now, |w| w.timestamps()).unwrap_or_default()
    }

    /// Pruned copy of the actor's orientations, aligned with `window_snapshot`.
    pub fn orientation_snapshot(&self, actor: &ActorId, now: i64) -> Vec<Option<Orientation>> {
        self.with_pruned(actor, now, |w| w.orientations()).unwrap_or_default()
    }

    /// Both sequences from one prune.
    pub fn snapshot(&self, actor: &ActorId, now: i64) -> WindowSnapshot {
        self.with_pruned(actor, now, |w| WindowSnapshot {
            timestamps: w.timestamps(),
            orientations: w.orientations(),
        })
        .unwrap_or_default()
    }

    /// Discard all state for an actor (disconnect). Returns false if unknown.
    pub fn remove(&self, actor: &ActorId) -> bool {
        let removed = self.windows.remove(actor).is_some();
        if removed {
            debug!(actor = %actor, "window removed");
        }
        removed
    }

    /// Actors currently holding a window.
    pub fn active_actors(&self) -> Vec<ActorId> {
        self.windows.iter().map(|e| e.key().clone()).collect()
    }

    /// Actors whose newest click is older than `cutoff`.
    pub fn idle_actors(&self, cutoff: i64) -> Vec<ActorId> {
        self.windows
            .iter()
            .filter(|e| e.value().lock().last_seen() < cutoff)
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn contains(&self, actor: &ActorId) -> bool {
        self.windows.contains_key(actor)
    }

    pub fn n_actors(&self) -> usize {
        self.windows.len()
    }

    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    fn with_pruned<T>(&self, actor: &ActorId, now: i64, f: impl FnOnce(&ActorWindow) -> T) -> Option<T> {
        let window = self.windows.get(actor).map(|w| Arc::clone(w.value()))?;
        let mut w = window.lock();
        w.prune(now, self.window_millis);
        Some(f(&w))
    }
}
