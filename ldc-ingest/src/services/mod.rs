//! Pipeline services: one module per stage plus the external collaborator seams

pub mod audio_converter;
pub mod candidate_resolver;
pub mod catalog_source;
pub mod feature_extractor;
pub mod media_acquirer;
pub mod media_source;
pub mod mfcc;
pub mod search_index;
pub mod segmenter;
pub mod transcoder;

pub use audio_converter::{AudioConverter, ConvertError, FfmpegConverter};
pub use candidate_resolver::CandidateResolver;
pub use catalog_source::{CatalogError, CatalogSource, HtmlCatalogSource, TableCatalogSource};
pub use feature_extractor::FeatureExtractor;
pub use media_acquirer::{AcquisitionOutcome, MediaAcquirer};
pub use media_source::{MediaError, MediaSource, YtDlpSource};
pub use mfcc::{MfccExtractor, MfccParams};
pub use search_index::{HttpSearchIndex, SearchError, SearchIndex, YtDlpSearchIndex};
pub use segmenter::Segmenter;
pub use transcoder::Transcoder;
