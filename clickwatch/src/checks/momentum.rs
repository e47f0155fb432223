// clickwatch/src/checks/momentum.rs
//
// CPS change between the two halves of the window. Suspicious at both ends:
// a rate that never moves (|delta| <= stable) and a sudden burst
// (|delta| >= spike). Score is the signed delta.

use crate::checks::{Check, MIN_SAMPLE_CLICKS};
use crate::config::MomentumConfig;
use crate::events::CheckResult;
use crate::features::FeatureVector;

pub const NAME: &str = "momentum";

pub struct MomentumCheck {
    cfg: MomentumConfig,
}

impl MomentumCheck {
    pub fn new(cfg: MomentumConfig) -> Self {
        Self { cfg }
    }
}

impl Check for MomentumCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, fv: &FeatureVector) -> CheckResult {
        let delta = fv.momentum_delta();
        let magnitude = delta.abs();
        let flagged = fv.click_count >= MIN_SAMPLE_CLICKS
            && fv.cps >= self.cfg.min_cps
            && (magnitude <= self.cfg.stable_delta || magnitude >= self.cfg.spike_delta);
        CheckResult::new(NAME, flagged, delta)
    }
}
