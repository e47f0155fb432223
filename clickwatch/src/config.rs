// clickwatch/src/config.rs
//
// Detector configuration. Loaded from JSON, every section optional; missing
// fields fall back to the defaults below. `validate()` must pass before a
// pipeline is built, and reports the first failing key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickwatchConfig {
    /// Raise the default log directive to debug
    pub debug: bool,
    pub detection: DetectionConfig,
    pub checks: ChecksConfig,
    pub export: ExportConfig,
    pub flags: FlagsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Rolling window length (ms)
    pub window_millis: i64,
    /// Tick period of the sampling scheduler (ms)
    pub sample_period_ms: i64,
    /// Evict actors with no click for this long (ms); 0 disables eviction
    pub idle_evict_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    pub high_cps: HighCpsConfig,
    pub double_click: DoubleClickConfig,
    pub momentum: MomentumConfig,
    pub crosshair: CrosshairConfig,
    pub uniformity: UniformityConfig,
    pub escalation: EscalationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighCpsConfig {
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleClickConfig {
    pub min_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub min_cps: f64,
    /// |delta| at or below this is "too stable"
    pub stable_delta: f64,
    /// |delta| at or above this is a spike
    pub spike_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosshairConfig {
    pub min_cps: f64,
    pub min_steady_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniformityConfig {
    pub min_cps: f64,
    pub max_jitter_cv: f64,
    pub max_iqr_millis: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub flag_level: i64,
    pub increase_on_hit: i64,
    pub decay_on_miss: i64,
    pub min_cps: f64,
    pub min_double_clicks: i64,
    pub max_uniform_jitter: f64,
    pub min_steady_aim_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub path: PathBuf,
    /// Append the orientation/momentum/double-click columns
    pub extended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagsConfig {
    pub path: PathBuf,
    /// Suppress repeat notifications for the same (actor, check) within this many ms
    pub cooldown_ms: i64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for DetectionConfig {
    fn default() -> Self {
        Self { window_millis: 5000, sample_period_ms: 1000, idle_evict_ms: 0 }
    }
}

impl Default for HighCpsConfig {
    fn default() -> Self {
        Self { threshold: 18.0 }
    }
}

impl Default for DoubleClickConfig {
    fn default() -> Self {
        Self { min_count: 3 }
    }
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self { min_cps: 10.0, stable_delta: 0.2, spike_delta: 4.0 }
    }
}

impl Default for CrosshairConfig {
    fn default() -> Self {
        Self { min_cps: 10.0, min_steady_ratio: 0.7 }
    }
}

impl Default for UniformityConfig {
    fn default() -> Self {
        Self { min_cps: 10.0, max_jitter_cv: 0.15, max_iqr_millis: 12.0 }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            flag_level: 6,
            increase_on_hit: 2,
            decay_on_miss: 1,
            min_cps: 15.0,
            min_double_clicks: 3,
            max_uniform_jitter: 0.15,
            min_steady_aim_ratio: 0.7,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("clickwatch_output/features.csv"),
            extended: true,
        }
    }
}

impl Default for FlagsConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("clickwatch_output/flags.jsonl"), cooldown_ms: 0 }
    }
}

// ── Loading & validation ──────────────────────────────────────────────────────

impl ClickwatchConfig {
    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Move the export and flag files into `dir`, keeping their file names.
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.export.path = rebase(&self.export.path, dir, "features.csv");
        self.flags.path = rebase(&self.flags.path, dir, "flags.jsonl");
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        positive("detection.window_millis", d.window_millis)?;
        positive("detection.sample_period_ms", d.sample_period_ms)?;
        non_negative_int("detection.idle_evict_ms", d.idle_evict_ms)?;

        let c = &self.checks;
        non_negative("checks.high_cps.threshold", c.high_cps.threshold)?;

        non_negative_int("checks.double_click.min_count", c.double_click.min_count)?;

        non_negative("checks.momentum.min_cps", c.momentum.min_cps)?;
        non_negative("checks.momentum.stable_delta", c.momentum.stable_delta)?;
        non_negative("checks.momentum.spike_delta", c.momentum.spike_delta)?;
        if c.momentum.stable_delta >= c.momentum.spike_delta {
            return Err(ConfigError::Invalid {
                key: "checks.momentum.stable_delta",
                reason: format!(
                    "must be below spike_delta ({} >= {})",
                    c.momentum.stable_delta, c.momentum.spike_delta
                ),
            });
        }

        non_negative("checks.crosshair.min_cps", c.crosshair.min_cps)?;
        ratio("checks.crosshair.min_steady_ratio", c.crosshair.min_steady_ratio)?;

        non_negative("checks.uniformity.min_cps", c.uniformity.min_cps)?;
        non_negative("checks.uniformity.max_jitter_cv", c.uniformity.max_jitter_cv)?;
        non_negative("checks.uniformity.max_iqr_millis", c.uniformity.max_iqr_millis)?;

        let e = &c.escalation;
        non_negative_int("checks.escalation.flag_level", e.flag_level)?;
        non_negative_int("checks.escalation.increase_on_hit", e.increase_on_hit)?;
        non_negative_int("checks.escalation.decay_on_miss", e.decay_on_miss)?;
        non_negative("checks.escalation.min_cps", e.min_cps)?;
        non_negative_int("checks.escalation.min_double_clicks", e.min_double_clicks)?;
        non_negative("checks.escalation.max_uniform_jitter", e.max_uniform_jitter)?;
        ratio("checks.escalation.min_steady_aim_ratio", e.min_steady_aim_ratio)?;

        non_negative_int("flags.cooldown_ms", self.flags.cooldown_ms)?;
        Ok(())
    }
}

fn rebase(path: &Path, dir: &Path, fallback: &str) -> PathBuf {
    let name = path.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(fallback));
    dir.join(name)
}

fn non_negative(key: &'static str, v: f64) -> Result<(), ConfigError> {
    if !v.is_finite() {
        return Err(ConfigError::Invalid { key, reason: format!("must be finite, got {v}") });
    }
    if v < 0.0 {
        return Err(ConfigError::Invalid { key, reason: format!("must be >= 0, got {v}") });
    }
    Ok(())
}

fn ratio(key: &'static str, v: f64) -> Result<(), ConfigError> {
    non_negative(key, v)?;
    if v > 1.0 {
        return Err(ConfigError::Invalid { key, reason: format!("must be within [0, 1], got {v}") });
    }
    Ok(())
}

fn non_negative_int(key: &'static str, v: i64) -> Result<(), ConfigError> {
    if v < 0 {
        return Err(ConfigError::Invalid { key, reason: format!("must be >= 0, got {v}") });
    }
    Ok(())
}

fn positive(key: &'static str, v: i64) -> Result<(), ConfigError> {
    if v <= 0 {
        return Err(ConfigError::Invalid { key, reason: format!("must be > 0, got {v}") });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_key(json: &str) -> &'static str {
        match ClickwatchConfig::from_json_str(json) {
            Err(ConfigError::Invalid { key, .. }) => key,
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ClickwatchConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.detection.window_millis, 5000);
        assert_eq!(cfg.checks.high_cps.threshold, 18.0);
        assert_eq!(cfg.checks.escalation.flag_level, 6);
        assert!(cfg.export.extended);
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let cfg = ClickwatchConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ClickwatchConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg = ClickwatchConfig::from_json_str(
            r#"{"checks":{"uniformity":{"max_jitter_cv":0.3}},"detection":{"window_millis":2000}}"#,
        )
        .unwrap();
        assert_eq!(cfg.checks.uniformity.max_jitter_cv, 0.3);
        assert_eq!(cfg.checks.uniformity.min_cps, 10.0);
        assert_eq!(cfg.detection.window_millis, 2000);
        assert_eq!(cfg.detection.sample_period_ms, 1000);
    }

    #[test]
    fn test_rejects_negative_threshold() {
        assert_eq!(
            invalid_key(r#"{"checks":{"high_cps":{"threshold":-1.0}}}"#),
            "checks.high_cps.threshold"
        );
    }

    #[test]
    fn test_rejects_ratio_above_one() {
        assert_eq!(
            invalid_key(r#"{"checks":{"crosshair":{"min_steady_ratio":1.5}}}"#),
            "checks.crosshair.min_steady_ratio"
        );
        assert_eq!(
            invalid_key(r#"{"checks":{"escalation":{"min_steady_aim_ratio":2.0}}}"#),
            "checks.escalation.min_steady_aim_ratio"
        );
    }

    #[test]
    fn test_rejects_zero_window() {
        assert_eq!(invalid_key(r#"{"detection":{"window_millis":0}}"#), "detection.window_millis");
        assert_eq!(
            invalid_key(r#"{"detection":{"sample_period_ms":-5}}"#),
            "detection.sample_period_ms"
        );
    }

    #[test]
    fn test_rejects_inverted_momentum_deltas() {
        assert_eq!(
            invalid_key(r#"{"checks":{"momentum":{"stable_delta":5.0,"spike_delta":4.0}}}"#),
            "checks.momentum.stable_delta"
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut cfg = ClickwatchConfig::default();
        cfg.checks.uniformity.max_iqr_millis = f64::NAN;
        match cfg.validate() {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "checks.uniformity.max_iqr_millis"),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_error_message_names_key() {
        let err = ClickwatchConfig::from_json_str(r#"{"checks":{"escalation":{"decay_on_miss":-1}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("checks.escalation.decay_on_miss"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(ClickwatchConfig::from_json_str("{not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClickwatchConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clickwatch.json");
        std::fs::write(&path, r#"{"debug":true,"flags":{"cooldown_ms":3000}}"#).unwrap();
        let cfg = ClickwatchConfig::load(&path).unwrap();
        assert!(cfg.debug);
        assert_eq!(cfg.flags.cooldown_ms, 3000);
    }

    #[test]
    fn test_with_output_dir() {
        let cfg = ClickwatchConfig::default().with_output_dir(Path::new("/var/lib/cw"));
        assert_eq!(cfg.export.path, PathBuf::from("/var/lib/cw/features.csv"));
        assert_eq!(cfg.flags.path, PathBuf::from("/var/lib/cw/flags.jsonl"));
    }
}
