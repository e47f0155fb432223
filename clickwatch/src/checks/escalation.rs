// clickwatch/src/checks/escalation.rs
//
// Suspicion level per actor: a leaky bucket over ticks.
//
//   suspicious tick  → level += increase_on_hit
//   clean tick       → level = max(0, level - decay_on_miss)
//   flag             → level >= flag_level
//
// A tick is suspicious when any indicator holds: high CPS, enough double
// clicks, uniform intervals or steady aim (the last two need a full sample).
// Isolated bursts leak away; sustained automation climbs past the flag level.

use dashmap::DashMap;
use tracing::debug;

use crate::checks::{Check, MIN_SAMPLE_CLICKS};
use crate::config::EscalationConfig;
use crate::events::{ActorId, CheckResult};
use crate::features::FeatureVector;

pub const NAME: &str = "level_escalation";

pub struct LevelEscalationCheck {
    cfg: EscalationConfig,
    levels: DashMap<ActorId, i64>,
}

impl LevelEscalationCheck {
    pub fn new(cfg: EscalationConfig) -> Self {
        Self { cfg, levels: DashMap::new() }
    }

    /// Latest level for an actor; 0 if never evaluated.
    pub fn level(&self, actor: &ActorId) -> i64 {
        self.levels.get(actor).map(|l| *l).unwrap_or(0)
    }

    /// Drop an actor's level (disconnect / eviction).
    pub fn forget(&self, actor: &ActorId) {
        self.levels.remove(actor);
    }

    pub fn n_tracked(&self) -> usize {
        self.levels.len()
    }

    fn is_suspicious(&self, fv: &FeatureVector) -> bool {
        let full_sample = fv.click_count >= MIN_SAMPLE_CLICKS;
        fv.cps >= self.cfg.min_cps
            || fv.double_click_count as i64 >= self.cfg.min_double_clicks
            || (full_sample && fv.jitter <= self.cfg.max_uniform_jitter)
            || (full_sample && fv.steady_aim_ratio >= self.cfg.min_steady_aim_ratio)
    }
}

impl Check for LevelEscalationCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, fv: &FeatureVector) -> CheckResult {
        let suspicious = self.is_suspicious(fv);

        // Read-modify-write under the shard's write lock.
        let level = {
            let mut entry = self.levels.entry(fv.actor.clone()).or_insert(0);
            let next = if suspicious {
                entry.saturating_add(self.cfg.increase_on_hit)
            } else {
                entry.saturating_sub(self.cfg.decay_on_miss).max(0)
            };
            *entry = next;
            next
        };

        debug!(actor = %fv.actor, level, suspicious, "escalation");
        CheckResult::new(NAME, level >= self.cfg.flag_level, level as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::fv;

    fn cfg() -> EscalationConfig {
        EscalationConfig { increase_on_hit: 2, decay_on_miss: 1, flag_level: 4, ..Default::default() }
    }

    fn hot() -> FeatureVector {
        fv(100, 20.0)
    }

    fn cold() -> FeatureVector {
        let mut v = fv(3, 1.0);
        v.jitter = 0.9;
        v
    }

    #[test]
    fn test_leaky_bucket_sequence() {
        let check = LevelEscalationCheck::new(cfg());
        let levels: Vec<i64> = [hot(), hot(), cold(), cold(), cold()]
            .iter()
            .map(|v| check.execute(v).score as i64)
            .collect();
        assert_eq!(levels, vec![2, 4, 3, 2, 1]);
    }

    #[test]
    fn test_level_never_negative() {
        let check = LevelEscalationCheck::new(cfg());
        check.execute(&hot());
        for _ in 0..10 {
            check.execute(&cold());
        }
        assert_eq!(check.level(&ActorId::from("steve")), 0);
    }

    #[test]
    fn test_flags_at_flag_level() {
        let check = LevelEscalationCheck::new(cfg());
        assert!(!check.execute(&hot()).flagged);
        let r = check.execute(&hot());
        assert!(r.flagged);
        assert_eq!(r.score, 4.0);
        // one miss drops back below
        assert!(!check.execute(&cold()).flagged);
    }

    #[test]
    fn test_indicators() {
        let check = LevelEscalationCheck::new(cfg());
        assert!(check.is_suspicious(&hot()));
        assert!(!check.is_suspicious(&cold()));

        let mut dc = cold();
        dc.double_click_count = 3;
        assert!(check.is_suspicious(&dc));

        // uniform / steady need six clicks
        let mut uniform = fv(5, 1.0);
        uniform.jitter = 0.0;
        assert!(!check.is_suspicious(&uniform));
        uniform.click_count = 6;
        assert!(check.is_suspicious(&uniform));

        let mut steady = cold();
        steady.click_count = 6;
        steady.steady_aim_ratio = 0.8;
        assert!(check.is_suspicious(&steady));
    }

    #[test]
    fn test_unknown_actor_and_forget() {
        let check = LevelEscalationCheck::new(cfg());
        let steve = ActorId::from("steve");
        assert_eq!(check.level(&steve), 0);
        check.execute(&hot());
        assert_eq!(check.level(&steve), 2);
        assert_eq!(check.n_tracked(), 1);
        check.forget(&steve);
        assert_eq!(check.level(&steve), 0);
        assert_eq!(check.n_tracked(), 0);
    }

    #[test]
    fn test_actors_are_independent() {
        let check = LevelEscalationCheck::new(cfg());
        check.execute(&hot());
        let mut other = cold();
        other.actor = ActorId::from("alex");
        check.execute(&other);
        assert_eq!(check.level(&ActorId::from("steve")), 2);
        assert_eq!(check.level(&ActorId::from("alex")), 0);
    }
}
