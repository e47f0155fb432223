// clickwatch/src/features/extractor.rs
//
// Window → FeatureVector. Pure and deterministic given its inputs.
//
// Two speed signals:
//   burstiness     relative; intervals at or below half the actor's own median
//   double clicks  absolute; intervals at or below 110 ms

use crate::events::{ActorId, Orientation};
use crate::features::stats;
use crate::features::FeatureVector;

/// Intervals at or below this are counted as double clicks.
pub const DOUBLE_CLICK_MS: f64 = 110.0;
/// Combined yaw/pitch movement (degrees) at or below which a pair counts as steady aim.
pub const STEADY_AIM_DEG: f64 = 0.7;
/// Floor for any elapsed span, so near-empty windows never divide by zero.
const MIN_SPAN_SECS: f64 = 0.001;
const MAX_JITTER: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// `timestamps` in arrival order; `orientations` aligned with them
    /// (it may be shorter or empty when the host has no orientation data).
    pub fn extract(
        &self,
        actor: &ActorId,
        timestamps: &[i64],
        orientations: &[Option<Orientation>],
        window_start: i64,
        window_end: i64,
    ) -> FeatureVector {
        let n = timestamps.len();
        let cps = n as f64 / span_secs(window_start, window_end);

        if n < 2 {
            return FeatureVector::degenerate(actor.clone(), window_start, window_end, n, cps);
        }

        let mut intervals: Vec<f64> = timestamps
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]).max(0) as f64)
            .collect();
        intervals.sort_by(|a, b| a.total_cmp(b));

        let mean = stats::mean(&intervals);
        let median = stats::median(&intervals);
        let std = stats::population_std(&intervals, mean);
        let iqr = stats::iqr(&intervals);
        let jitter = if mean > 0.0 { (std / mean).clamp(0.0, MAX_JITTER) } else { 0.0 };

        let burst_threshold = (median / 2.0).max(1.0);
        let bursts = intervals.iter().filter(|&&x| x <= burst_threshold).count();
        let burstiness = bursts as f64 / intervals.len() as f64;

        let double_click_count = intervals.iter().filter(|&&x| x <= DOUBLE_CLICK_MS).count();

        let (cps_first_half, cps_second_half) = half_rates(timestamps, window_start, window_end);
        let aim = AimStats::from_orientations(orientations);

        FeatureVector {
            actor: actor.clone(),
            window_start,
            window_end,
            click_count: n,
            cps,
            mean_interval: mean,
            median_interval: median,
            std_interval: std,
            iqr_interval: iqr,
            min_interval: intervals[0],
            max_interval: intervals[intervals.len() - 1],
            jitter,
            burstiness,
            double_click_count,
            cps_first_half,
            cps_second_half,
            avg_yaw_delta: aim.avg_yaw,
            std_yaw_delta: aim.std_yaw,
            avg_pitch_delta: aim.avg_pitch,
            std_pitch_delta: aim.std_pitch,
            steady_aim_ratio: aim.steady_ratio,
        }
    }
}

fn span_secs(start: i64, end: i64) -> f64 {
    (end.saturating_sub(start) as f64 / 1000.0).max(MIN_SPAN_SECS)
}

/// CPS in each temporal half; clicks exactly at the midpoint count toward the second half.
fn half_rates(timestamps: &[i64], window_start: i64, window_end: i64) -> (f64, f64) {
    let mid = window_start.saturating_add(window_end.saturating_sub(window_start) / 2);
    let first = timestamps.iter().filter(|&&t| t < mid).count();
    let second = timestamps.len() - first;
    (
        first as f64 / span_secs(window_start, mid),
        second as f64 / span_secs(mid, window_end),
    )
}

// ── Crosshair movement ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AimStats {
    avg_yaw: f64,
    std_yaw: f64,
    avg_pitch: f64,
    std_pitch: f64,
    steady_ratio: f64,
}

impl AimStats {
    /// Deltas are taken only between consecutive clicks that both carry a
    /// reading; an unset orientation breaks the chain.
    fn from_orientations(orientations: &[Option<Orientation>]) -> Self {
        let (yaw_d, pitch_d): (Vec<f64>, Vec<f64>) = orientations
            .windows(2)
            .filter_map(|w| match (w[0], w[1]) {
                (Some(a), Some(b)) => Some((
                    stats::normalize_angle(b.yaw as f64 - a.yaw as f64).abs(),
                    (b.pitch as f64 - a.pitch as f64).abs(),
                )),
                _ => None,
            })
            .unzip();

        if yaw_d.is_empty() {
            return Self::default();
        }

        let steady = yaw_d
            .iter()
            .zip(&pitch_d)
            .filter(|(y, p)| y.hypot(**p) <= STEADY_AIM_DEG)
            .count();

        let avg_yaw = stats::mean(&yaw_d);
        let avg_pitch = stats::mean(&pitch_d);
        Self {
            avg_yaw,
            std_yaw: stats::population_std(&yaw_d, avg_yaw),
            avg_pitch,
            std_pitch: stats::population_std(&pitch_d, avg_pitch),
            steady_ratio: steady as f64 / yaw_d.len() as f64,
        }
    }
}
