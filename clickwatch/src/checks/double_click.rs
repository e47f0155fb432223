// clickwatch/src/checks/double_click.rs
//
// Count of sub-110 ms intervals in the window.

use crate::checks::{Check, MIN_SAMPLE_CLICKS};
use crate::config::DoubleClickConfig;
use crate::events::CheckResult;
use crate::features::FeatureVector;

pub const NAME: &str = "double_click";

pub struct DoubleClickCheck {
    min_count: usize,
}

impl DoubleClickCheck {
    pub fn new(cfg: DoubleClickConfig) -> Self {
        Self { min_count: cfg.min_count.max(0) as usize }
    }
}

impl Check for DoubleClickCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, fv: &FeatureVector) -> CheckResult {
        let flagged = fv.click_count >= MIN_SAMPLE_CLICKS && fv.double_click_count >= self.min_count;
        CheckResult::new(NAME, flagged, fv.double_click_count as f64)
    }
}
