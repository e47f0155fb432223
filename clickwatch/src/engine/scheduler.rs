// clickwatch/src/engine/scheduler.rs
//
// Periodic sampler. Three tasks, chained by channels:
//
//   tick loop        every period: read clock, snapshot active actors,
//                    try_send a TickJob (skip + warn if the worker is behind)
//   sampling worker  one job at a time: evict idle actors, evaluate every
//                    actor of the job on the blocking pool, forward reports
//   sink worker      one message at a time through every sink, in order:
//                    a report, or the removal of an evicted actor
//
// Jobs are processed strictly in order, so reports for an actor never go back
// in time. Sink I/O never runs on the tick loop.
//
// stop() only signals; work already queued still reaches the sinks.
// shutdown() signals and waits for both workers to drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn, Instrument, Span};

use crate::clock::Clock;
use crate::engine::pipeline::Pipeline;
use crate::engine::sink::TickSink;
use crate::events::{ActorId, TickReport};

const REPORT_QUEUE: usize = 1024;

struct TickJob {
    now: i64,
    actors: Vec<ActorId>,
}

enum SinkMsg {
    Report(TickReport),
    Removed(ActorId),
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    skipped: AtomicU64,
    reports: AtomicU64,
    flags: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks handed to the sampling worker
    pub ticks: u64,
    /// Ticks dropped because the worker was still busy
    pub skipped: u64,
    pub reports: u64,
    /// Flagged check results across all reports
    pub flags: u64,
}

pub struct SamplingScheduler {
    stop_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl SamplingScheduler {
    /// Spawn the tick loop and both workers on the current runtime. Every
    /// task runs inside `span`.
    pub fn start(
        pipeline: Arc<Pipeline>,
        clock: Arc<dyn Clock>,
        sinks: Vec<Arc<dyn TickSink>>,
        period: Duration,
        span: Span,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (job_tx, job_rx) = mpsc::channel::<TickJob>(1);
        let (report_tx, report_rx) = mpsc::channel::<SinkMsg>(REPORT_QUEUE);
        let counters = Arc::new(Counters::default());

        let tasks = vec![
            tokio::spawn(
                tick_loop(Arc::clone(&pipeline), clock, period, job_tx, stop_rx, Arc::clone(&counters))
                    .instrument(span.clone()),
            ),
            tokio::spawn(
                sampling_worker(pipeline, job_rx, report_tx, Arc::clone(&counters)).instrument(span.clone()),
            ),
            tokio::spawn(sink_worker(sinks, report_rx).instrument(span)),
        ];

        Self { stop_tx, tasks: Mutex::new(tasks), counters }
    }

    /// Stop scheduling new ticks. Returns immediately; in-flight output may
    /// still land afterwards.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Stop, then wait until every queued report has passed through the sinks.
    pub async fn shutdown(&self) {
        self.stop();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for t in tasks {
            if let Err(e) = t.await {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            reports: c.reports.load(Ordering::Relaxed),
            flags: c.flags.load(Ordering::Relaxed),
        }
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

async fn tick_loop(
    pipeline: Arc<Pipeline>,
    clock: Arc<dyn Clock>,
    period: Duration,
    job_tx: mpsc::Sender<TickJob>,
    mut stop_rx: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(period_ms = period.as_millis() as u64, "tick loop started");

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = timer.tick() => {}
        }

        let job = TickJob { now: clock.now_millis(), actors: pipeline.active_actors() };
        match job_tx.try_send(job) {
            Ok(()) => {
                counters.ticks.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                warn!(now = job.now, actors = job.actors.len(), "sampling worker behind; tick skipped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
    debug!("tick loop stopped");
}

async fn sampling_worker(
    pipeline: Arc<Pipeline>,
    mut job_rx: mpsc::Receiver<TickJob>,
    report_tx: mpsc::Sender<SinkMsg>,
    counters: Arc<Counters>,
) {
    while let Some(TickJob { now, mut actors }) = job_rx.recv().await {
        let evicted = pipeline.evict_idle(now);
        if !evicted.is_empty() {
            actors.retain(|a| !evicted.contains(a));
            debug!(n = evicted.len(), "idle actors evicted");
        }
        for actor in evicted {
            if report_tx.send(SinkMsg::Removed(actor)).await.is_err() {
                return;
            }
        }

        let n_actors = actors.len();
        let mut set = JoinSet::new();
        for actor in actors {
            let p = Arc::clone(&pipeline);
            let span = Span::current();
            set.spawn_blocking(move || {
                let _entered = span.enter();
                p.evaluate(&actor, now)
            });
        }

        let mut tick_flags = 0u64;
        while let Some(joined) = set.join_next().await {
            let report = match joined {
                Ok(Some(report)) => report,
                Ok(None) => continue, // removed since the snapshot
                Err(e) => {
                    warn!(error = %e, "evaluation task failed");
                    continue;
                }
            };
            tick_flags += report.flags().count() as u64;
            counters.reports.fetch_add(1, Ordering::Relaxed);
            if report_tx.send(SinkMsg::Report(report)).await.is_err() {
                return;
            }
        }

        counters.flags.fetch_add(tick_flags, Ordering::Relaxed);
        debug!(now, actors = n_actors, flags = tick_flags, "tick sampled");
    }
}

async fn sink_worker(sinks: Vec<Arc<dyn TickSink>>, mut report_rx: mpsc::Receiver<SinkMsg>) {
    while let Some(msg) = report_rx.recv().await {
        match msg {
            SinkMsg::Report(report) => {
                for sink in &sinks {
                    if let Err(e) = sink.handle(&report).await {
                        warn!(sink = sink.name(), actor = %report.actor, error = %e, "sink failed");
                    }
                }
            }
            SinkMsg::Removed(actor) => {
                for sink in &sinks {
                    if let Err(e) = sink.on_remove(&actor).await {
                        warn!(sink = sink.name(), actor = %actor, error = %e, "sink removal failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{ClickwatchConfig, FlagsConfig};
    use crate::engine::dispatcher::FlagDispatcher;
    use crate::engine::sink::ChannelSink;
    use crate::events::Orientation;

    const PERIOD: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(5);

    fn pipeline(cfg: ClickwatchConfig) -> Arc<Pipeline> {
        Arc::new(Pipeline::from_config(&cfg).unwrap())
    }

    struct FailingSink;

    #[async_trait]
    impl TickSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn handle(&self, _report: &TickReport) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_tick_reaches_sink() {
        let p = pipeline(ClickwatchConfig::default());
        let a = ActorId::from("steve");
        for t in [0, 50, 1000, 1050, 2000] {
            p.record(&a, t, Orientation::new(1.0, 1.0));
        }
        let (sink, mut rx) = ChannelSink::channel(REPORT_QUEUE);
        let sched = SamplingScheduler::start(
            Arc::clone(&p),
            Arc::new(ManualClock::new(2000)),
            vec![Arc::new(sink)],
            PERIOD,
            Span::none(),
        );

        let report = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(report.actor, a);
        assert_eq!(report.sampled_at, 2000);
        assert_eq!(report.features.click_count, 5);
        assert_eq!(report.features.median_interval, 500.0);
        assert_eq!(report.features.double_click_count, 2);
        assert_eq!(report.results.len(), 6);

        sched.shutdown().await;
        assert!(sched.is_stopped());
        assert!(sched.stats().ticks >= 1);
        assert!(sched.stats().reports >= 1);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let p = pipeline(ClickwatchConfig::default());
        p.record(&ActorId::from("steve"), 100, None);
        let (sink, mut rx) = ChannelSink::channel(REPORT_QUEUE);
        let sched = SamplingScheduler::start(
            p,
            Arc::new(ManualClock::new(1000)),
            vec![Arc::new(FailingSink), Arc::new(sink)],
            PERIOD,
            Span::none(),
        );

        // two reports: the failure did not end the sink worker
        for _ in 0..2 {
            let r = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(r.actor.as_str(), "steve");
        }
        sched.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let p = pipeline(ClickwatchConfig::default());
        p.record(&ActorId::from("steve"), 100, None);
        let (sink, mut rx) = ChannelSink::channel(REPORT_QUEUE);
        let sched = SamplingScheduler::start(
            p,
            Arc::new(ManualClock::new(1000)),
            vec![Arc::new(sink)],
            PERIOD,
            Span::none(),
        );
        timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        sched.shutdown().await;

        let ticks = sched.stats().ticks;
        // sink worker has exited, so the channel closes after the backlog
        while timeout(WAIT, rx.recv()).await.unwrap().is_some() {}
        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(sched.stats().ticks, ticks);
    }

    #[tokio::test]
    async fn test_flags_are_counted() {
        let p = pipeline(ClickwatchConfig::default());
        let a = ActorId::from("bot");
        for i in 0..100 {
            p.record(&a, 5050 + i * 50, Orientation::new(0.0, 0.0));
        }
        let (sink, mut rx) = ChannelSink::channel(REPORT_QUEUE);
        let sched = SamplingScheduler::start(
            p,
            Arc::new(ManualClock::new(10_000)),
            vec![Arc::new(sink)],
            PERIOD,
            Span::none(),
        );
        let report = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(report.is_flagged());
        sched.shutdown().await;
        assert!(sched.stats().flags >= report.flags().count() as u64);
    }

    #[tokio::test]
    async fn test_idle_actors_are_evicted() {
        let mut cfg = ClickwatchConfig::default();
        cfg.detection.idle_evict_ms = 1000;
        let p = pipeline(cfg);
        p.record(&ActorId::from("gone"), 0, None);
        let (sink, mut rx) = ChannelSink::channel(REPORT_QUEUE);
        let sched = SamplingScheduler::start(
            Arc::clone(&p),
            Arc::new(ManualClock::new(10_000)),
            vec![Arc::new(sink)],
            PERIOD,
            Span::none(),
        );

        timeout(WAIT, async {
            while p.collector().n_actors() > 0 {
                tokio::time::sleep(PERIOD).await;
            }
        })
        .await
        .unwrap();
        sched.shutdown().await;

        assert!(rx.recv().await.is_none());
        assert_eq!(sched.stats().reports, 0);
    }

    #[tokio::test]
    async fn test_eviction_clears_sink_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ClickwatchConfig::default();
        cfg.detection.idle_evict_ms = 1000;
        let p = pipeline(cfg);
        let gone = ActorId::from("gone");
        p.record(&gone, 0, None);

        let flags = Arc::new(
            FlagDispatcher::new(&FlagsConfig { path: dir.path().join("flags.jsonl"), cooldown_ms: 60_000 })
                .unwrap(),
        );
        flags.record_alert(&gone, "high_cps", 9_000);
        assert!(!flags.should_alert(&gone, "high_cps", 10_000));

        let sched = SamplingScheduler::start(
            Arc::clone(&p),
            Arc::new(ManualClock::new(10_000)),
            vec![Arc::clone(&flags) as Arc<dyn TickSink>],
            PERIOD,
            Span::none(),
        );
        timeout(WAIT, async {
            while p.collector().n_actors() > 0 {
                tokio::time::sleep(PERIOD).await;
            }
        })
        .await
        .unwrap();
        sched.shutdown().await;

        assert!(flags.should_alert(&gone, "high_cps", 10_000));
    }
}
