// clickwatch/src/engine/dispatcher.rs
//
// Flag notifications. One JSONL line per flagged (actor, check) per tick:
//   {"actor":"steve","check":"high_cps","score":21.4,"cps":21.4,...}
// Wire the file to a moderation queue / command bridge in production.
//
// Re-alert cooldown is keyed by (actor, check) and measured on the tick clock,
// so a check that keeps firing notifies at most once per `cooldown_ms`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::FlagsConfig;
use crate::engine::sink::TickSink;
use crate::events::{ActorId, FlagRecord, TickReport};

pub struct FlagDispatcher {
    path: PathBuf,
    cooldown_ms: i64,
    last_alert: DashMap<(ActorId, &'static str), i64>,
    written: AtomicU64,
}

impl FlagDispatcher {
    pub fn new(cfg: &FlagsConfig) -> Result<Self> {
        if let Some(dir) = cfg.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating flag output directory {}", dir.display()))?;
        }
        Ok(Self {
            path: cfg.path.clone(),
            cooldown_ms: cfg.cooldown_ms,
            last_alert: DashMap::new(),
            written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flag lines written so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn should_alert(&self, actor: &ActorId, check: &'static str, now: i64) -> bool {
        if self.cooldown_ms == 0 {
            return true;
        }
        self.last_alert
            .get(&(actor.clone(), check))
            .map(|t| now - *t >= self.cooldown_ms)
            .unwrap_or(true)
    }

    pub fn record_alert(&self, actor: &ActorId, check: &'static str, now: i64) {
        self.last_alert.insert((actor.clone(), check), now);
    }

    /// Drop cooldown state for an actor.
    pub fn forget(&self, actor: &ActorId) {
        self.last_alert.retain(|(a, _), _| a != actor);
    }

    async fn write(&self, content: &str) -> Result<()> {
        let mut f = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        f.write_all(content.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl TickSink for FlagDispatcher {
    fn name(&self) -> &'static str {
        "flags"
    }

    async fn handle(&self, report: &TickReport) -> Result<()> {
        let mut lines = String::new();
        let mut n = 0u64;

        for result in report.flags() {
            if !self.should_alert(&report.actor, result.check, report.sampled_at) {
                continue;
            }
            self.record_alert(&report.actor, result.check, report.sampled_at);
            info!(
                actor = %report.actor,
                check = result.check,
                score = result.score,
                cps = report.features.cps,
                "FLAG"
            );
            lines.push_str(&FlagRecord::from_report(report, result).to_jsonl());
            lines.push('\n');
            n += 1;
        }

        if n > 0 {
            self.write(&lines).await?;
            self.written.fetch_add(n, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn on_remove(&self, actor: &ActorId) -> Result<()> {
        self.forget(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::CheckResult;
    use crate::features::FeatureVector;

    fn report(actor: &str, at: i64, results: Vec<CheckResult>) -> TickReport {
        TickReport {
            actor: ActorId::from(actor),
            sampled_at: at,
            features: Arc::new(FeatureVector::degenerate(ActorId::from(actor), at - 5000, at, 100, 20.0)),
            results,
        }
    }

    fn dispatcher(dir: &Path, cooldown_ms: i64) -> FlagDispatcher {
        FlagDispatcher::new(&FlagsConfig { path: dir.join("out").join("flags.jsonl"), cooldown_ms }).unwrap()
    }

    #[tokio::test]
    async fn test_writes_one_line_per_flag() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path(), 0);
        let r = report(
            "steve",
            5000,
            vec![
                CheckResult::new("high_cps", true, 20.0),
                CheckResult::new("momentum", false, 1.0),
                CheckResult::new("level_escalation", true, 6.0),
            ],
        );
        d.handle(&r).await.unwrap();

        let text = std::fs::read_to_string(d.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["actor"], "steve");
        assert_eq!(first["check"], "high_cps");
        assert_eq!(first["score"], 20.0);
        assert_eq!(first["click_count"], 100);
        assert_eq!(d.written(), 2);
    }

    #[tokio::test]
    async fn test_clean_report_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path(), 0);
        d.handle(&report("steve", 5000, vec![CheckResult::new("high_cps", false, 3.0)]))
            .await
            .unwrap();
        assert!(!d.path().exists());
    }

    #[tokio::test]
    async fn test_cooldown_per_actor_and_check() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path(), 3000);
        let hit = || vec![CheckResult::new("high_cps", true, 20.0)];

        d.handle(&report("steve", 1000, hit())).await.unwrap();
        d.handle(&report("steve", 2000, hit())).await.unwrap(); // suppressed
        d.handle(&report("alex", 2000, hit())).await.unwrap();
        d.handle(&report("steve", 4000, hit())).await.unwrap();

        assert_eq!(d.written(), 3);
        d.forget(&ActorId::from("steve"));
        assert!(d.should_alert(&ActorId::from("steve"), "high_cps", 4001));
        assert!(!d.should_alert(&ActorId::from("alex"), "high_cps", 4001));
    }

    #[tokio::test]
    async fn test_removed_actor_alerts_again() {
        let dir = tempfile::tempdir().unwrap();
        let d = dispatcher(dir.path(), 60_000);
        let hit = || vec![CheckResult::new("high_cps", true, 20.0)];

        d.handle(&report("steve", 1000, hit())).await.unwrap();
        d.on_remove(&ActorId::from("steve")).await.unwrap();
        // same actor id reconnects well inside the cooldown
        d.handle(&report("steve", 2000, hit())).await.unwrap();
        assert_eq!(d.written(), 2);
    }
}
