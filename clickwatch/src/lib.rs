// clickwatch/src/lib.rs
//
// Clickwatch: autoclicker detection over per-actor click streams.
//
//   tail_jsonl → FeedRecord             JSONL feed from the host
//   record(actor, ts, orientation)      ingestion, any thread
//     → EventCollector                  rolling window per actor
//   SamplingScheduler tick              every sample period
//     → FeatureExtractor                FeatureVector per actor
//     → CheckManager                    ordered CheckResults
//     → TickSinks                       CSV export, flag JSONL, channels

pub mod checks;
pub mod clock;
pub mod config;
pub mod csv_export;
pub mod engine;
pub mod events;
pub mod features;
pub mod feed;
pub mod state;

pub use checks::{Check, CheckManager};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClickwatchConfig, ConfigError};
pub use csv_export::CsvExporter;
pub use engine::dispatcher::FlagDispatcher;
pub use engine::pipeline::Pipeline;
pub use engine::scheduler::{SamplingScheduler, SchedulerStats};
pub use engine::sink::{ChannelSink, TickSink};
pub use events::{ActorId, CheckResult, FeedRecord, Orientation, TickReport};
pub use features::{FeatureExtractor, FeatureVector};
pub use state::window::EventCollector;
