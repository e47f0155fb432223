// clickwatch/src/checks/high_cps.rs
//
// Raw click rate. No minimum click count: CPS is already normalized by the
// window length.

use crate::checks::Check;
use crate::config::HighCpsConfig;
use crate::events::CheckResult;
use crate::features::FeatureVector;

pub const NAME: &str = "high_cps";

pub struct HighCpsCheck {
    threshold: f64,
}

impl HighCpsCheck {
    pub fn new(cfg: HighCpsConfig) -> Self {
        Self { threshold: cfg.threshold }
    }
}

impl Check for HighCpsCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, fv: &FeatureVector) -> CheckResult {
        CheckResult::new(NAME, fv.cps >= self.threshold, fv.cps)
    }
}
