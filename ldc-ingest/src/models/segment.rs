//! Fixed-length audio windows

/// One fixed-length, non-overlapping window of a canonical track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Source title of the track the window was cut from
    pub title: String,
    pub region: String,
    /// Identity of the parent canonical track
    pub track_identity: String,
    /// Zero-based window number; covers `[i * W, (i + 1) * W)` seconds
    pub segment_index: u32,
    /// Store key of the segment WAV
    pub segment_path: String,
}

impl Segment {
    /// Identity of this segment (`{track}_segment{i}`)
    pub fn identity(&self) -> String {
        format!("{}_segment{}", self.track_identity, self.segment_index)
    }
}
