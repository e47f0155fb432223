// clickwatch/src/engine/pipeline.rs
//
// Detection pipeline for one host: rolling windows, feature extraction and the
// ordered check chain. Owns all per-actor state; nothing here is global.
//
// Per (actor, tick):
//   snapshot(now) → extract(now - window, now) → run checks in order → TickReport

use std::sync::Arc;

use tracing::debug;

use crate::checks::{
    Check, CheckManager, CrosshairSteadinessCheck, DoubleClickCheck, HighCpsCheck,
    IntervalUniformityCheck, LevelEscalationCheck, MomentumCheck,
};
use crate::config::{ClickwatchConfig, ConfigError};
use crate::events::{ActorId, Orientation, TickReport};
use crate::features::FeatureExtractor;
use crate::state::window::EventCollector;

pub struct Pipeline {
    collector: EventCollector,
    extractor: FeatureExtractor,
    checks: CheckManager,
    escalation: Arc<LevelEscalationCheck>,
    idle_evict_ms: i64,
}

impl Pipeline {
    /// Validates `cfg` and registers the built-in checks:
    /// high_cps, double_click, momentum, crosshair_steadiness,
    /// interval_uniformity, level_escalation.
    pub fn from_config(cfg: &ClickwatchConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let c = &cfg.checks;
        let escalation = Arc::new(LevelEscalationCheck::new(c.escalation.clone()));
        let checks = CheckManager::new()
            .add(Arc::new(HighCpsCheck::new(c.high_cps.clone())))
            .add(Arc::new(DoubleClickCheck::new(c.double_click.clone())))
            .add(Arc::new(MomentumCheck::new(c.momentum.clone())))
            .add(Arc::new(CrosshairSteadinessCheck::new(c.crosshair.clone())))
            .add(Arc::new(IntervalUniformityCheck::new(c.uniformity.clone())))
            .add(Arc::clone(&escalation) as Arc<dyn Check>);

        Ok(Self {
            collector: EventCollector::new(cfg.detection.window_millis),
            extractor: FeatureExtractor::new(),
            checks,
            escalation,
            idle_evict_ms: cfg.detection.idle_evict_ms,
        })
    }

    /// Append a host-specific check after the built-ins.
    pub fn with_check(mut self, check: Arc<dyn Check>) -> Self {
        self.checks = self.checks.add(check);
        self
    }

    // ── Ingestion ─────────────────────────────────────────────────────────────

    pub fn record(&self, actor: &ActorId, timestamp: i64, orientation: Option<Orientation>) {
        self.collector.record(actor, timestamp, orientation);
    }

    /// Drop the actor's window and suspicion level. The window goes first so
    /// a concurrent `evaluate` sees the removal and cleans up after itself.
    pub fn remove(&self, actor: &ActorId) -> bool {
        let removed = self.collector.remove(actor);
        self.escalation.forget(actor);
        removed
    }

    // ── Sampling ──────────────────────────────────────────────────────────────

    /// One tick for one actor. None if the actor has no window (never seen or
    /// removed); an actor whose clicks all aged out still gets a report.
    pub fn evaluate(&self, actor: &ActorId, now: i64) -> Option<TickReport> {
        if !self.collector.contains(actor) {
            return None;
        }
        let snap = self.collector.snapshot(actor, now);
        let window_start = now - self.collector.window_millis();
        let features = Arc::new(self.extractor.extract(
            actor,
            &snap.timestamps,
            &snap.orientations,
            window_start,
            now,
        ));
        let results = self.checks.run_all(&features);

        // Removed while the checks ran: escalation may have re-created a level.
        if !self.collector.contains(actor) {
            self.escalation.forget(actor);
            return None;
        }

        debug!(actor = %actor, clicks = features.click_count, cps = features.cps, "evaluated");
        Some(TickReport { actor: actor.clone(), sampled_at: now, features, results })
    }

    /// Remove actors idle since `now - idle_evict_ms`. No-op when eviction is off.
    pub fn evict_idle(&self, now: i64) -> Vec<ActorId> {
        if self.idle_evict_ms <= 0 {
            return Vec::new();
        }
        let idle = self.collector.idle_actors(now - self.idle_evict_ms);
        for actor in &idle {
            self.remove(actor);
            debug!(actor = %actor, "evicted idle actor");
        }
        idle
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Latest suspicion level; 0 for unknown actors.
    pub fn level(&self, actor: &ActorId) -> i64 {
        self.escalation.level(actor)
    }

    pub fn active_actors(&self) -> Vec<ActorId> {
        self.collector.active_actors()
    }

    pub fn collector(&self) -> &EventCollector {
        &self.collector
    }

    pub fn checks(&self) -> &CheckManager {
        &self.checks
    }
}
