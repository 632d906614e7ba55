//! Persisted stage tables
//!
//! Every stage writes one CSV table through the [`BlobStore`] before the next stage starts,
//! and a later run reads it back instead of recomputing. Column order is part of the format
//! and is fixed by [`TableRow::HEADERS`].

use ldc_common::BlobStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{AcquiredTrack, CanonicalAudio, CatalogEntry, FeatureVector, Segment};

pub const CATALOG_TABLE: &str = "data/catalog.csv";
pub const ACQUISITION_TABLE: &str = "data/results.csv";
pub const CANONICAL_TABLE: &str = "data/results_wav.csv";
pub const SEGMENT_TABLE: &str = "data/segments.csv";
pub const FEATURE_TABLE: &str = "data/features.csv";
pub const RUN_REPORT: &str = "data/run_report.json";

/// Delimiter between coefficients in the `mfcc` column
pub const MFCC_DELIMITER: char = ';';

/// Row type of a persisted table
pub trait TableRow: Serialize + DeserializeOwned {
    /// Header row, in column order
    const HEADERS: &'static [&'static str];
}

impl TableRow for CatalogEntry {
    const HEADERS: &'static [&'static str] = &["title", "region"];
}

/// `data/results.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRow {
    pub title: String,
    pub catalog_title: String,
    pub region: String,
    pub duration: u64,
    pub url: String,
    /// Empty when the download failed
    pub path: Option<String>,
}

impl TableRow for AcquisitionRow {
    const HEADERS: &'static [&'static str] =
        &["title", "catalog_title", "region", "duration", "url", "path"];
}

impl From<&AcquiredTrack> for AcquisitionRow {
    fn from(track: &AcquiredTrack) -> Self {
        Self {
            title: track.source_title.clone(),
            catalog_title: track.catalog_title.clone(),
            region: track.region.clone(),
            duration: track.duration_seconds,
            url: track.source_url.clone(),
            path: track.local_path.clone(),
        }
    }
}

impl From<AcquisitionRow> for AcquiredTrack {
    fn from(row: AcquisitionRow) -> Self {
        Self {
            source_title: row.title,
            catalog_title: row.catalog_title,
            region: row.region,
            duration_seconds: row.duration,
            source_url: row.url,
            local_path: row.path.filter(|p| !p.is_empty()),
        }
    }
}

/// `data/results_wav.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub title: String,
    pub catalog_title: String,
    pub region: String,
    pub duration: u64,
    pub url: String,
    pub path: String,
    pub wav_path: String,
}

impl TableRow for CanonicalRow {
    const HEADERS: &'static [&'static str] = &[
        "title",
        "catalog_title",
        "region",
        "duration",
        "url",
        "path",
        "wav_path",
    ];
}

impl From<&CanonicalAudio> for CanonicalRow {
    fn from(audio: &CanonicalAudio) -> Self {
        let track = &audio.track;
        Self {
            title: track.source_title.clone(),
            catalog_title: track.catalog_title.clone(),
            region: track.region.clone(),
            duration: track.duration_seconds,
            url: track.source_url.clone(),
            path: track.local_path.clone().unwrap_or_default(),
            wav_path: audio.wav_path.clone(),
        }
    }
}

impl CanonicalRow {
    fn into_canonical(self) -> Result<CanonicalAudio, String> {
        let identity = stem_of(&self.wav_path)
            .ok_or_else(|| format!("wav_path '{}' has no file name", self.wav_path))?;
        Ok(CanonicalAudio {
            track: AcquiredTrack {
                source_title: self.title,
                catalog_title: self.catalog_title,
                region: self.region,
                duration_seconds: self.duration,
                source_url: self.url,
                local_path: Some(self.path).filter(|p| !p.is_empty()),
            },
            identity,
            wav_path: self.wav_path,
        })
    }
}

/// `data/segments.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    pub title: String,
    pub segment_path: String,
    pub region: String,
    pub segment_index: u32,
}

impl TableRow for SegmentRow {
    const HEADERS: &'static [&'static str] = &["title", "segment_path", "region", "segment_index"];
}

impl From<&Segment> for SegmentRow {
    fn from(segment: &Segment) -> Self {
        Self {
            title: segment.title.clone(),
            region: segment.region.clone(),
            segment_index: segment.segment_index,
            segment_path: segment.segment_path.clone(),
        }
    }
}

impl SegmentRow {
    /// Segments live in `.../{identity}/{identity}_segment{i}.wav`
    fn into_segment(self) -> Result<Segment, String> {
        let track_identity = Path::new(&self.segment_path)
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("segment_path '{}' has no track directory", self.segment_path))?;
        Ok(Segment {
            title: self.title,
            region: self.region,
            track_identity,
            segment_index: self.segment_index,
            segment_path: self.segment_path,
        })
    }
}

/// `data/features.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub title: String,
    pub segment_path: String,
    pub mfcc: String,
    pub region: String,
    pub segment_index: u32,
}

impl TableRow for FeatureRow {
    const HEADERS: &'static [&'static str] =
        &["title", "segment_path", "mfcc", "region", "segment_index"];
}

impl From<&FeatureVector> for FeatureRow {
    fn from(feature: &FeatureVector) -> Self {
        let segment = SegmentRow::from(&feature.segment);
        Self {
            title: segment.title,
            region: segment.region,
            segment_index: segment.segment_index,
            segment_path: segment.segment_path,
            mfcc: format_mfcc(&feature.vector),
        }
    }
}

impl FeatureRow {
    fn into_feature(self) -> Result<FeatureVector, String> {
        let vector = parse_mfcc(&self.mfcc)?;
        let segment = SegmentRow {
            title: self.title,
            region: self.region,
            segment_index: self.segment_index,
            segment_path: self.segment_path,
        }
        .into_segment()?;
        Ok(FeatureVector { segment, vector })
    }
}

pub fn format_mfcc(vector: &[f32]) -> String {
    vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&MFCC_DELIMITER.to_string())
}

pub fn parse_mfcc(text: &str) -> Result<Vec<f32>, String> {
    if text.trim().is_empty() {
        return Err("empty mfcc column".to_string());
    }
    text.split(MFCC_DELIMITER)
        .map(|field| {
            field
                .trim()
                .parse::<f32>()
                .map_err(|e| format!("bad coefficient '{}': {}", field, e))
        })
        .collect()
}

fn stem_of(key: &str) -> Option<String> {
    Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Encode rows as CSV with a header row (written even when there are no rows)
pub fn encode_table<R: TableRow>(key: &str, rows: &[R]) -> PipelineResult<Vec<u8>> {
    let corrupt = |reason: String| PipelineError::CorruptTable {
        key: key.to_string(),
        reason,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(R::HEADERS)
        .map_err(|e| corrupt(e.to_string()))?;
    for row in rows {
        writer.serialize(row).map_err(|e| corrupt(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| corrupt(e.to_string()))
}

/// Decode a CSV table, checking its header row
pub fn decode_table<R: TableRow>(key: &str, bytes: &[u8]) -> PipelineResult<Vec<R>> {
    let corrupt = |reason: String| PipelineError::CorruptTable {
        key: key.to_string(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let headers = reader.headers().map_err(|e| corrupt(e.to_string()))?.clone();
    if headers.iter().ne(R::HEADERS.iter().copied()) {
        return Err(corrupt(format!(
            "expected columns [{}], found [{}]",
            R::HEADERS.join(", "),
            headers.iter().collect::<Vec<_>>().join(", ")
        )));
    }

    reader
        .deserialize()
        .collect::<Result<Vec<R>, _>>()
        .map_err(|e| corrupt(e.to_string()))
}

pub async fn write_table<R: TableRow>(
    store: &dyn BlobStore,
    key: &str,
    rows: &[R],
) -> PipelineResult<()> {
    let bytes = encode_table(key, rows)?;
    store.write(key, &bytes).await?;
    tracing::info!(table = key, rows = rows.len(), "Table persisted");
    Ok(())
}

pub async fn read_table<R: TableRow>(store: &dyn BlobStore, key: &str) -> PipelineResult<Vec<R>> {
    let bytes = store.read(key).await?;
    let rows = decode_table(key, &bytes)?;
    tracing::info!(table = key, rows = rows.len(), "Table loaded");
    Ok(rows)
}

pub async fn table_exists(store: &dyn BlobStore, key: &str) -> PipelineResult<bool> {
    Ok(store.exists(key).await?)
}

pub async fn write_catalog(store: &dyn BlobStore, entries: &[CatalogEntry]) -> PipelineResult<()> {
    write_table(store, CATALOG_TABLE, entries).await
}

pub async fn read_catalog(store: &dyn BlobStore) -> PipelineResult<Vec<CatalogEntry>> {
    read_table(store, CATALOG_TABLE).await
}

pub async fn write_acquisitions(store: &dyn BlobStore, tracks: &[AcquiredTrack]) -> PipelineResult<()> {
    let rows: Vec<AcquisitionRow> = tracks.iter().map(AcquisitionRow::from).collect();
    write_table(store, ACQUISITION_TABLE, &rows).await
}

pub async fn read_acquisitions(store: &dyn BlobStore) -> PipelineResult<Vec<AcquiredTrack>> {
    let rows: Vec<AcquisitionRow> = read_table(store, ACQUISITION_TABLE).await?;
    Ok(rows.into_iter().map(AcquiredTrack::from).collect())
}

pub async fn write_canonical(store: &dyn BlobStore, audio: &[CanonicalAudio]) -> PipelineResult<()> {
    let rows: Vec<CanonicalRow> = audio.iter().map(CanonicalRow::from).collect();
    write_table(store, CANONICAL_TABLE, &rows).await
}

pub async fn read_canonical(store: &dyn BlobStore) -> PipelineResult<Vec<CanonicalAudio>> {
    let rows: Vec<CanonicalRow> = read_table(store, CANONICAL_TABLE).await?;
    rows.into_iter()
        .map(CanonicalRow::into_canonical)
        .collect::<Result<_, _>>()
        .map_err(|reason| PipelineError::CorruptTable {
            key: CANONICAL_TABLE.to_string(),
            reason,
        })
}

pub async fn write_segments(store: &dyn BlobStore, segments: &[Segment]) -> PipelineResult<()> {
    let rows: Vec<SegmentRow> = segments.iter().map(SegmentRow::from).collect();
    write_table(store, SEGMENT_TABLE, &rows).await
}

pub async fn read_segments(store: &dyn BlobStore) -> PipelineResult<Vec<Segment>> {
    let rows: Vec<SegmentRow> = read_table(store, SEGMENT_TABLE).await?;
    rows.into_iter()
        .map(SegmentRow::into_segment)
        .collect::<Result<_, _>>()
        .map_err(|reason| PipelineError::CorruptTable {
            key: SEGMENT_TABLE.to_string(),
            reason,
        })
}

pub async fn write_features(store: &dyn BlobStore, features: &[FeatureVector]) -> PipelineResult<()> {
    let rows: Vec<FeatureRow> = features.iter().map(FeatureRow::from).collect();
    write_table(store, FEATURE_TABLE, &rows).await
}

pub async fn read_features(store: &dyn BlobStore) -> PipelineResult<Vec<FeatureVector>> {
    let rows: Vec<FeatureRow> = read_table(store, FEATURE_TABLE).await?;
    rows.into_iter()
        .map(FeatureRow::into_feature)
        .collect::<Result<_, _>>()
        .map_err(|reason| PipelineError::CorruptTable {
            key: FEATURE_TABLE.to_string(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldc_common::MemoryStore;

    fn track(path: Option<&str>) -> AcquiredTrack {
        AcquiredTrack {
            source_title: "Ampar Ampar Pisang, Lagu Daerah".to_string(),
            catalog_title: "Ampar_Ampar_Pisang".to_string(),
            region: "Kalimantan_Selatan".to_string(),
            duration_seconds: 130,
            source_url: "https://www.youtube.com/watch?v=a1".to_string(),
            local_path: path.map(str::to_string),
        }
    }

    #[test]
    fn test_acquisition_header_order() {
        let bytes = encode_table::<AcquisitionRow>(ACQUISITION_TABLE, &[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "title,catalog_title,region,duration,url,path\n"
        );
    }

    #[test]
    fn test_segment_and_feature_header_order() {
        let segments = encode_table::<SegmentRow>(SEGMENT_TABLE, &[]).unwrap();
        assert_eq!(
            String::from_utf8(segments).unwrap(),
            "title,segment_path,region,segment_index\n"
        );

        let features = encode_table::<FeatureRow>(FEATURE_TABLE, &[]).unwrap();
        assert_eq!(
            String::from_utf8(features).unwrap(),
            "title,segment_path,mfcc,region,segment_index\n"
        );
    }

    #[test]
    fn test_feature_row_leads_with_title_and_path() {
        let row = FeatureRow {
            title: "Yamko Rambe Yamko".to_string(),
            segment_path: "datasets/segments/papua/yamko/yamko_segment0.wav".to_string(),
            mfcc: format_mfcc(&[1.5, -2.0]),
            region: "Papua".to_string(),
            segment_index: 0,
        };
        let bytes = encode_table(FEATURE_TABLE, &[row]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text.lines().nth(1).unwrap(),
            "Yamko Rambe Yamko,datasets/segments/papua/yamko/yamko_segment0.wav,1.5;-2,Papua,0"
        );
    }

    #[test]
    fn test_failed_download_has_empty_path() {
        let rows = vec![AcquisitionRow::from(&track(None))];
        let bytes = encode_table(ACQUISITION_TABLE, &rows).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with(','));

        let decoded: Vec<AcquisitionRow> = decode_table(ACQUISITION_TABLE, &bytes).unwrap();
        assert_eq!(AcquiredTrack::from(decoded[0].clone()).local_path, None);
    }

    #[test]
    fn test_wrong_columns_are_rejected() {
        let result = decode_table::<SegmentRow>(SEGMENT_TABLE, b"a,b\n1,2\n");
        assert!(matches!(result, Err(PipelineError::CorruptTable { .. })));
    }

    #[test]
    fn test_mfcc_column_format() {
        let text = format_mfcc(&[-512.25, 0.5, 3.0]);
        assert_eq!(text, "-512.25;0.5;3");
        assert_eq!(parse_mfcc(&text).unwrap(), vec![-512.25, 0.5, 3.0]);
        assert!(parse_mfcc("").is_err());
        assert!(parse_mfcc("1;x").is_err());
    }

    #[tokio::test]
    async fn test_segments_recover_track_identity() {
        let store = MemoryStore::new();
        let segment = Segment {
            title: "Ampar Ampar Pisang".to_string(),
            region: "Kalimantan_Selatan".to_string(),
            track_identity: "ampar_ampar_pisang".to_string(),
            segment_index: 2,
            segment_path:
                "datasets/segments/kalimantan_selatan/ampar_ampar_pisang/ampar_ampar_pisang_segment2.wav"
                    .to_string(),
        };
        write_segments(&store, std::slice::from_ref(&segment)).await.unwrap();
        assert_eq!(read_segments(&store).await.unwrap(), vec![segment]);
    }

    #[tokio::test]
    async fn test_canonical_table_keeps_track_fields() {
        let store = MemoryStore::new();
        let audio = CanonicalAudio {
            track: track(Some("datasets/songs/ampar_ampar_pisang_lagu_daerah.m4a")),
            identity: "ampar_ampar_pisang_lagu_daerah".to_string(),
            wav_path: "datasets/wav_songs/ampar_ampar_pisang_lagu_daerah.wav".to_string(),
        };
        write_canonical(&store, std::slice::from_ref(&audio)).await.unwrap();
        assert_eq!(read_canonical(&store).await.unwrap(), vec![audio]);
    }
}
