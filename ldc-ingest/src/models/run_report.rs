//! Per-run statistics
//!
//! Written to `data/run_report.json` at the end of every run and logged as a summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Stage;

/// Counters for a single pipeline run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Stages whose table was read back instead of recomputed
    pub resumed_stages: Vec<Stage>,

    pub catalog_entries: usize,
    pub selected_entries: usize,
    pub search_failures: usize,

    pub acquisition: AcquisitionStats,

    pub transcoded: usize,
    pub transcode_failures: usize,

    pub segments: usize,
    pub segment_failures: usize,
    pub short_tracks: usize,

    pub features: usize,
    pub feature_failures: usize,
}

/// Acquisition counters, summed over catalog entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    pub candidates_seen: usize,
    pub downloaded: usize,
    pub cache_hits: usize,
    pub too_long: usize,
    pub malformed_durations: usize,
    pub failures: usize,
}

impl AcquisitionStats {
    /// Successful acquisitions (fresh downloads and reused files)
    pub fn successes(&self) -> usize {
        self.downloaded + self.cache_hits
    }

    pub fn merge(&mut self, other: &AcquisitionStats) {
        self.candidates_seen += other.candidates_seen;
        self.downloaded += other.downloaded;
        self.cache_hits += other.cache_hits;
        self.too_long += other.too_long;
        self.malformed_durations += other.malformed_durations;
        self.failures += other.failures;
    }
}

impl RunReport {
    pub fn mark_resumed(&mut self, stage: Stage) {
        if !self.resumed_stages.contains(&stage) {
            self.resumed_stages.push(stage);
        }
    }

    /// Wall-clock duration of the run, once finished
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_counters() {
        let mut total = AcquisitionStats::default();
        total.merge(&AcquisitionStats {
            candidates_seen: 3,
            downloaded: 1,
            cache_hits: 1,
            too_long: 1,
            ..Default::default()
        });
        total.merge(&AcquisitionStats {
            candidates_seen: 2,
            failures: 2,
            ..Default::default()
        });

        assert_eq!(total.candidates_seen, 5);
        assert_eq!(total.successes(), 2);
        assert_eq!(total.failures, 2);
    }

    #[test]
    fn test_mark_resumed_is_deduplicated() {
        let mut report = RunReport::default();
        report.mark_resumed(Stage::Acquire);
        report.mark_resumed(Stage::Acquire);
        assert_eq!(report.resumed_stages, vec![Stage::Acquire]);
    }
}
