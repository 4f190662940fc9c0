//! Manifest Filter
//!
//! Turns a bucket listing into the manifests of topics that should be
//! recreated. Selection is a pure function over the listing; downloading the
//! survivors is a separate async step so that selection can be tested on its
//! own.

use std::collections::HashSet;

use futures_util::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, error};

use super::path::parse_manifest_path;
use super::topic_manifest::{download_manifest, TopicManifest};
use crate::cluster::{TopicNamespace, TopicTable};
use crate::object_store::{ListItem, Remote};
use crate::recovery::RecoveryError;
use crate::retry::RetryPolicy;

/// Manifest downloads kept in flight at once
const DOWNLOAD_CONCURRENCY: usize = 8;

/// A listing entry that passed selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub tp_ns: TopicNamespace,
}

/// Selection rules for manifest keys
#[derive(Debug)]
pub struct CandidateFilter<'a> {
    pattern: Option<&'a Regex>,
    namespace: Option<&'a str>,
    existing: HashSet<TopicNamespace>,
}

impl<'a> CandidateFilter<'a> {
    pub fn new(
        pattern: Option<&'a Regex>,
        namespace: Option<&'a str>,
        existing: impl IntoIterator<Item = TopicNamespace>,
    ) -> Self {
        Self {
            pattern,
            namespace,
            existing: existing.into_iter().collect(),
        }
    }

    /// Whether a parsed manifest identity should be recovered
    pub fn accepts(&self, tp_ns: &TopicNamespace) -> bool {
        if let Some(ns) = self.namespace {
            if tp_ns.ns != ns {
                return false;
            }
        }
        if let Some(pattern) = self.pattern {
            if !pattern.is_match(&tp_ns.topic) {
                return false;
            }
        }
        !self.existing.contains(tp_ns)
    }

    /// Select candidates from a listing, preserving listing order
    pub fn select(&self, items: &[ListItem]) -> Vec<Candidate> {
        items
            .iter()
            .filter_map(|item| {
                let tp_ns = parse_manifest_path(&item.key)?;
                if !self.accepts(&tp_ns) {
                    debug!(key = %item.key, topic = %tp_ns, "skipping manifest");
                    return None;
                }
                Some(Candidate {
                    key: item.key.clone(),
                    tp_ns,
                })
            })
            .collect()
    }
}

/// Select manifests of topics missing from the cluster and download them.
///
/// A candidate whose download or parse fails is dropped and logged. The
/// output keeps listing order.
pub async fn filter_existing_topics(
    remote: &Remote,
    bucket: &str,
    items: &[ListItem],
    pattern: Option<&Regex>,
    namespace: Option<&str>,
    topics: &dyn TopicTable,
    retry: &RetryPolicy,
) -> Vec<TopicManifest> {
    let filter = CandidateFilter::new(pattern, namespace, topics.all_topics());
    let candidates = filter.select(items);
    debug!(candidates = candidates.len(), "downloading candidate manifests");

    stream::iter(candidates)
        .map(|candidate| async move {
            let chain = retry.chain();
            match download_manifest(remote, bucket, &candidate.key, &chain).await {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    let err = RecoveryError::downloading_manifest(format!(
                        "failed to download manifest {}: {}",
                        candidate.key, e
                    ));
                    error!(code = err.code.as_str(), error = %err, "dropping manifest");
                    None
                }
            }
        })
        .buffered(DOWNLOAD_CONCURRENCY)
        .filter_map(|m| async move { m })
        .collect()
        .await
}
