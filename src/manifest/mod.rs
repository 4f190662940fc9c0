//! # Topic Manifests
//!
//! Key grammar, JSON codec and the filter that picks which manifests a
//! recovery should act on.

pub mod errors;
pub mod filter;
pub mod path;
pub mod topic_manifest;

pub use errors::{ManifestError, ManifestResult};
pub use filter::{filter_existing_topics, Candidate, CandidateFilter};
pub use path::{manifest_path_for, parse_manifest_path, TOPIC_MANIFEST_FILE};
pub use topic_manifest::{download_manifest, TopicManifest, TOPIC_MANIFEST_VERSION};
