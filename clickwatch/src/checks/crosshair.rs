// clickwatch/src/checks/crosshair.rs
//
// Fast clicking with a crosshair that barely moves between clicks.

use crate::checks::{Check, MIN_SAMPLE_CLICKS};
use crate::config::CrosshairConfig;
use crate::events::CheckResult;
use crate::features::FeatureVector;

pub const NAME: &str = "crosshair_steadiness";

pub struct CrosshairSteadinessCheck {
    cfg: CrosshairConfig,
}

impl CrosshairSteadinessCheck {
    pub fn new(cfg: CrosshairConfig) -> Self {
        Self { cfg }
    }
}

impl Check for CrosshairSteadinessCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, fv: &FeatureVector) -> CheckResult {
        let flagged = fv.click_count >= MIN_SAMPLE_CLICKS
            && fv.cps >= self.cfg.min_cps
            && fv.steady_aim_ratio >= self.cfg.min_steady_ratio;
        CheckResult::new(NAME, flagged, fv.steady_aim_ratio)
    }
}
