// clickwatch/src/csv_export.rs
//
// Feature export: one CSV row per (actor, tick), header written once per file.
// An existing non-empty file is appended to without a second header.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::ExportConfig;
use crate::engine::sink::TickSink;
use crate::events::TickReport;
use crate::features::FeatureVector;

pub struct CsvExporter {
    path: PathBuf,
    extended: bool,
    header_written: AtomicBool,
    rows: AtomicU64,
    // Serializes header check + append across concurrent callers.
    write_lock: Mutex<()>,
}

impl CsvExporter {
    pub fn new(cfg: &ExportConfig) -> Result<Self> {
        if let Some(dir) = cfg.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating export directory {}", dir.display()))?;
        }
        let has_content = std::fs::metadata(&cfg.path).map(|m| m.len() > 0).unwrap_or(false);
        Ok(Self {
            path: cfg.path.clone(),
            extended: cfg.extended,
            header_written: AtomicBool::new(has_content),
            rows: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    pub async fn export(&self, fv: &FeatureVector) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut content = String::new();
        if !self.header_written.load(Ordering::Acquire) {
            content.push_str(&FeatureVector::csv_header(self.extended));
            content.push('\n');
        }
        content.push_str(&fv.to_csv_row(self.extended));
        content.push('\n');

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        f.write_all(content.as_bytes()).await?;

        self.header_written.store(true, Ordering::Release);
        self.rows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl TickSink for CsvExporter {
    fn name(&self) -> &'static str {
        "csv"
    }

    async fn handle(&self, report: &TickReport) -> Result<()> {
        self.export(&report.features).await
    }
}
