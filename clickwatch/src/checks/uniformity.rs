// clickwatch/src/checks/uniformity.rs
//
// Intervals too regular for a human hand: low coefficient of variation, or a
// tight interquartile range. Score is the jitter.

use crate::checks::{Check, MIN_SAMPLE_CLICKS};
use crate::config::UniformityConfig;
use crate::events::CheckResult;
use crate::features::FeatureVector;

pub const NAME: &str = "interval_uniformity";

pub struct IntervalUniformityCheck {
    cfg: UniformityConfig,
}

impl IntervalUniformityCheck {
    pub fn new(cfg: UniformityConfig) -> Self {
        Self { cfg }
    }
}

impl Check for IntervalUniformityCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, fv: &FeatureVector) -> CheckResult {
        let uniform = fv.jitter <= self.cfg.max_jitter_cv || fv.iqr_interval <= self.cfg.max_iqr_millis;
        let flagged = fv.click_count >= MIN_SAMPLE_CLICKS && fv.cps >= self.cfg.min_cps && uniform;
        CheckResult::new(NAME, flagged, fv.jitter)
    }
}
