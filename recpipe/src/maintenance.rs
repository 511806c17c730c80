//! Scheduled maintenance: deleting the segments of old recordings.
//!
//! Once a recording has an indexed deliverable and is old enough, its live
//! segments and playlist are no longer needed. The [`CleanupJob`] wakes
//! periodically, and when no recorder is busy, sweeps the whole catalog.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::catalog::RecordingCatalog;
use crate::config::CleanupConfig;
use crate::domain::{Recording, SegmentLayout};
use crate::job::{Job, JobContext, JobOutcome};

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub eligible: usize,
    pub files_deleted: usize,
    pub failures: usize,
}

/// Finds and deletes stale segment files.
pub struct SegmentCleaner {
    catalog: Arc<dyn RecordingCatalog>,
    layout: SegmentLayout,
    minimum_age: chrono::Duration,
}

impl SegmentCleaner {
    pub fn new(
        catalog: Arc<dyn RecordingCatalog>,
        layout: SegmentLayout,
        config: &CleanupConfig,
    ) -> Self {
        Self {
            catalog,
            layout,
            minimum_age: config.minimum_age(),
        }
    }

    /// Not recording, indexed file present, and `now > end + duration + minimum_age`.
    pub async fn is_eligible(&self, recording: &Recording, now: DateTime<Utc>) -> bool {
        if recording.is_recording() {
            return false;
        }
        let Some(indexed) = recording.indexed_path() else {
            return false;
        };
        if !fs::try_exists(&indexed).await.unwrap_or(false) {
            return false;
        }
        let duration =
            chrono::Duration::milliseconds((recording.duration_secs() * 1000.0) as i64);
        now > recording.end() + duration + self.minimum_age
    }

    /// Sweep every recording, unless a recorder is busy.
    ///
    /// Returns `None` when the sweep was skipped.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Option<SweepReport> {
        if self.catalog.any_recorder_active().await {
            debug!("Recorder active, skipping cleanup");
            return None;
        }
        Some(self.sweep(now).await)
    }

    /// Delete the segments and playlist of every eligible recording.
    ///
    /// A failed deletion is logged and counted; it never stops the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for recording in self.catalog.recordings().await {
            report.examined += 1;
            if !self.is_eligible(&recording, now).await {
                continue;
            }
            report.eligible += 1;

            let mut targets = vec![recording.playlist_path(&self.layout)];
            targets.extend(recording.segments(&self.layout).await);

            for path in targets {
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!(path = %path.display(), "Deleted");
                        report.files_deleted += 1;
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to delete segment file");
                        report.failures += 1;
                    }
                }
            }
        }

        if report.files_deleted > 0 || report.failures > 0 {
            info!(
                examined = report.examined,
                eligible = report.eligible,
                deleted = report.files_deleted,
                failures = report.failures,
                "Segment cleanup finished"
            );
        }
        report
    }
}

/// Long-running job driving a [`SegmentCleaner`].
///
/// Sleeps `initial_delay`, then sweeps and sleeps the current value of the
/// interval channel, so a new "time between cleanings" takes effect after the
/// next sweep.
pub struct CleanupJob {
    cleaner: SegmentCleaner,
    initial_delay: Duration,
    interval: watch::Receiver<Duration>,
}

impl CleanupJob {
    pub fn new(
        cleaner: SegmentCleaner,
        initial_delay: Duration,
        interval: watch::Receiver<Duration>,
    ) -> Self {
        Self {
            cleaner,
            initial_delay,
            interval,
        }
    }

    /// Build the job from config, returning the sender that updates the
    /// interval.
    pub fn from_config(
        catalog: Arc<dyn RecordingCatalog>,
        layout: SegmentLayout,
        config: &CleanupConfig,
    ) -> (Self, watch::Sender<Duration>) {
        let (tx, rx) = watch::channel(config.time_between_cleanings());
        let cleaner = SegmentCleaner::new(catalog, layout, config);
        let job = Self::new(
            cleaner,
            Duration::from_secs(config.initial_delay_secs),
            rx,
        );
        (job, tx)
    }
}

#[async_trait]
impl Job for CleanupJob {
    fn name(&self) -> &'static str {
        "segment-cleanup"
    }

    fn sleep_time(&self) -> Duration {
        *self.interval.borrow()
    }

    async fn run(&mut self, ctx: &JobContext) -> JobOutcome {
        if !ctx.sleep(self.initial_delay).await {
            return JobOutcome::stopped();
        }

        loop {
            if let Some(report) = self.cleaner.run_once(Utc::now()).await {
                ctx.update(format!(
                    "swept {} recording(s), deleted {} file(s)",
                    report.examined, report.files_deleted
                ));
            }

            let interval = *self.interval.borrow_and_update();
            if !ctx.sleep(interval).await {
                return JobOutcome::stopped();
            }
        }
    }
}
