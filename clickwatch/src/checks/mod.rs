// clickwatch/src/checks/mod.rs
//
// Check framework. A check turns one FeatureVector into one CheckResult.
// All built-ins are pure except escalation, which keeps a per-actor level.

pub mod crosshair;
pub mod double_click;
pub mod escalation;
pub mod high_cps;
pub mod momentum;
pub mod uniformity;

use std::sync::Arc;

use tokio::task::JoinError;

use crate::events::CheckResult;
use crate::features::FeatureVector;

pub use crosshair::CrosshairSteadinessCheck;
pub use double_click::DoubleClickCheck;
pub use escalation::LevelEscalationCheck;
pub use high_cps::HighCpsCheck;
pub use momentum::MomentumCheck;
pub use uniformity::IntervalUniformityCheck;

/// Windows with fewer clicks are too small to judge, for every check but HighCps.
pub const MIN_SAMPLE_CLICKS: usize = 6;

pub trait Check: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(&self, fv: &FeatureVector) -> CheckResult;
}

/// Deferred `execute` on the blocking pool. Same result as the direct call.
pub async fn execute_async(check: Arc<dyn Check>, fv: Arc<FeatureVector>) -> Result<CheckResult, JoinError> {
    tokio::task::spawn_blocking(move || check.execute(&fv)).await
}

/// Ordered check registry. Results come back in registration order.
#[derive(Default, Clone)]
pub struct CheckManager {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, check: Arc<dyn Check>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn checks(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn run_all(&self, fv: &FeatureVector) -> Vec<CheckResult> {
        self.checks.iter().map(|c| c.execute(fv)).collect()
    }

    /// Every check on the blocking pool, joined in registration order.
    pub async fn run_all_async(&self, fv: Arc<FeatureVector>) -> Result<Vec<CheckResult>, JoinError> {
        let handles: Vec<_> = self
            .checks
            .iter()
            .map(|c| tokio::spawn(execute_async(Arc::clone(c), Arc::clone(&fv))))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for h in handles {
            results.push(h.await??);
        }
        Ok(results)
    }
}
