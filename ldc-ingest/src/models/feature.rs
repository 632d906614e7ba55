//! Feature vectors

use super::Segment;

/// Mean cepstral coefficients of one segment
///
/// `vector.len()` equals the configured coefficient count for every row of a corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub segment: Segment,
    pub vector: Vec<f32>,
}
