// clickwatch/src/features/mod.rs
//
// Immutable per-(actor, tick) statistics over a click window, and the flat
// export record built from them.
//
// Export record (one row per actor per tick, floats at 5 decimals):
//   base:     actorId,windowStart,windowEnd,count,cps,meanInterval,medianInterval,
//             stdInterval,iqrInterval,jitter,burstiness
//   extended: base + minInterval,maxInterval,cpsFirstHalf,cpsSecondHalf,
//             avgYawDelta,stdYawDelta,avgPitchDelta,stdPitchDelta,
//             steadyAimRatio,doubleClickCount

pub mod extractor;
pub mod stats;

use serde::Serialize;

use crate::events::ActorId;

pub use extractor::FeatureExtractor;

const CSV_BASE_HEADER: &str = "actorId,windowStart,windowEnd,count,cps,meanInterval,\
medianInterval,stdInterval,iqrInterval,jitter,burstiness";

const CSV_EXTENDED_HEADER: &str = "minInterval,maxInterval,cpsFirstHalf,cpsSecondHalf,\
avgYawDelta,stdYawDelta,avgPitchDelta,stdPitchDelta,steadyAimRatio,doubleClickCount";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub actor: ActorId,
    pub window_start: i64,
    pub window_end: i64,

    pub click_count: usize,
    pub cps: f64,

    // Inter-click interval stats (ms)
    pub mean_interval: f64,
    pub median_interval: f64,
    pub std_interval: f64, // population std
    pub iqr_interval: f64,
    pub min_interval: f64,
    pub max_interval: f64,

    // Pattern scores
    pub jitter: f64,     // coefficient of variation, clamped to [0, 10]
    pub burstiness: f64, // [0, 1]
    pub double_click_count: usize,

    // Momentum
    pub cps_first_half: f64,
    pub cps_second_half: f64,

    // Crosshair movement between consecutive clicks (degrees)
    pub avg_yaw_delta: f64,
    pub std_yaw_delta: f64,
    pub avg_pitch_delta: f64,
    pub std_pitch_delta: f64,
    pub steady_aim_ratio: f64, // [0, 1]
}

impl FeatureVector {
    /// Fewer than two clicks: count and CPS only, everything else zero.
    pub fn degenerate(actor: ActorId, window_start: i64, window_end: i64, click_count: usize, cps: f64) -> Self {
        Self {
            actor,
            window_start,
            window_end,
            click_count,
            cps,
            mean_interval: 0.0,
            median_interval: 0.0,
            std_interval: 0.0,
            iqr_interval: 0.0,
            min_interval: 0.0,
            max_interval: 0.0,
            jitter: 0.0,
            burstiness: 0.0,
            double_click_count: 0,
            cps_first_half: 0.0,
            cps_second_half: 0.0,
            avg_yaw_delta: 0.0,
            std_yaw_delta: 0.0,
            avg_pitch_delta: 0.0,
            std_pitch_delta: 0.0,
            steady_aim_ratio: 0.0,
        }
    }

    /// Signed CPS change from the first to the second half of the window.
    pub fn momentum_delta(&self) -> f64 {
        self.cps_second_half - self.cps_first_half
    }

    pub fn csv_header(extended: bool) -> String {
        if extended {
            format!("{},{}", CSV_BASE_HEADER, CSV_EXTENDED_HEADER)
        } else {
            CSV_BASE_HEADER.to_string()
        }
    }

    pub fn to_csv_row(&self, extended: bool) -> String {
        let mut row = format!(
            "{},{},{},{},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5}",
            csv_field(self.actor.as_str()),
            self.window_start,
            self.window_end,
            self.click_count,
            self.cps,
            self.mean_interval,
            self.median_interval,
            self.std_interval,
            self.iqr_interval,
            self.jitter,
            self.burstiness,
        );
        if extended {
            row.push_str(&format!(
                ",{:.5},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5},{:.5},{}",
                self.min_interval,
                self.max_interval,
                self.cps_first_half,
                self.cps_second_half,
                self.avg_yaw_delta,
                self.std_yaw_delta,
                self.avg_pitch_delta,
                self.std_pitch_delta,
                self.steady_aim_ratio,
                self.double_click_count,
            ));
        }
        row
    }
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
