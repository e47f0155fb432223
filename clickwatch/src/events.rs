// clickwatch/src/events.rs
//
// Shared domain types flowing through Clickwatch.
//
//   ActorId        opaque, hashable identity of the monitored entity (player)
//   Orientation    yaw/pitch reading attached to a click, when the host has one
//   ClickEvent     one timestamped click as stored in the rolling window
//   FeedRecord     one line of the JSONL ingestion feed
//   CheckResult    outcome of one check against one feature vector
//   TickReport     everything produced for one (actor, tick)
//   FlagRecord     flag notification written by the dispatcher

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

// ── Actor identity ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── Orientation ───────────────────────────────────────────────────────────────

/// Crosshair orientation in degrees at the moment of a click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
}

impl Orientation {
    /// Non-finite readings are treated as unset.
    pub fn new(yaw: f32, pitch: f32) -> Option<Self> {
        if yaw.is_finite() && pitch.is_finite() {
            Some(Self { yaw, pitch })
        } else {
            None
        }
    }
}

// ── Click events ──────────────────────────────────────────────────────────────

/// A single click in an actor's rolling window.
/// `orientation` is `None` when the host had no reading, which is distinct
/// from a real 0°/0° crosshair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub timestamp: i64, // ms since epoch
    pub orientation: Option<Orientation>,
}

/// One line of the ingestion feed.
///
/// ```json
/// {"type":"click","actor":"steve","ts":1700000000000,"yaw":12.5,"pitch":-3.0}
/// {"type":"disconnect","actor":"steve"}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedRecord {
    Click {
        actor: ActorId,
        #[serde(default)]
        ts: Option<i64>,
        #[serde(default)]
        yaw: Option<f32>,
        #[serde(default)]
        pitch: Option<f32>,
    },
    Disconnect {
        actor: ActorId,
    },
}

impl FeedRecord {
    pub fn actor(&self) -> &ActorId {
        match self {
            Self::Click { actor, .. } | Self::Disconnect { actor } => actor,
        }
    }

    /// Host timestamp of a click record, if it carried one.
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Self::Click { ts, .. } => *ts,
            Self::Disconnect { .. } => None,
        }
    }

    /// Orientation of a click record; both angles must be present.
    pub fn orientation(&self) -> Option<Orientation> {
        match self {
            Self::Click { yaw: Some(yaw), pitch: Some(pitch), .. } => Orientation::new(*yaw, *pitch),
            _ => None,
        }
    }
}

// ── Detection types ───────────────────────────────────────────────────────────

/// Outcome of one check. `score` is check-specific (a CPS value, a jitter
/// value, a level, a delta) and not comparable across checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckResult {
    pub check: &'static str,
    pub flagged: bool,
    pub score: f64,
}

impl CheckResult {
    pub fn new(check: &'static str, flagged: bool, score: f64) -> Self {
        Self { check, flagged, score }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(flagged={}, score={:.4})", self.check, self.flagged, self.score)
    }
}

/// Everything the sampler produced for one actor on one tick.
/// `results` keeps the registration order of the checks.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub actor: ActorId,
    pub sampled_at: i64,
    pub features: Arc<FeatureVector>,
    pub results: Vec<CheckResult>,
}

impl TickReport {
    pub fn flags(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.flagged)
    }

    pub fn is_flagged(&self) -> bool {
        self.results.iter().any(|r| r.flagged)
    }

    pub fn result(&self, check: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check == check)
    }
}

/// One line of flags.jsonl: actor X flagged by check Y with score Z.
#[derive(Debug, Clone, Serialize)]
pub struct FlagRecord {
    pub actor: ActorId,
    pub check: &'static str,
    pub score: f64,
    pub cps: f64,
    pub click_count: usize,
    pub window_start: i64,
    pub window_end: i64,
    pub timestamp: DateTime<Utc>,
}

impl FlagRecord {
    pub fn from_report(report: &TickReport, result: &CheckResult) -> Self {
        Self {
            actor: report.actor.clone(),
            check: result.check,
            score: result.score,
            cps: report.features.cps,
            click_count: report.features.click_count,
            window_start: report.features.window_start,
            window_end: report.features.window_end,
            timestamp: Utc::now(),
        }
    }

    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
