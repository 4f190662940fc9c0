//! Topic manifest key grammar
//!
//! Manifests live at `<prefix>/meta/<ns>/<topic>/topic_manifest.json`, where
//! `<prefix>` is a word of hex digits derived from the topic identity so that
//! keys spread across the bucket's key space.

use std::sync::OnceLock;

use regex::Regex;

use crate::cluster::TopicNamespace;

/// File name of every topic manifest
pub const TOPIC_MANIFEST_FILE: &str = "topic_manifest.json";

fn manifest_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\w+/meta/([^/]+)/([^/]+)/topic_manifest\.json$")
            .unwrap_or_else(|e| unreachable!("static manifest regex is valid: {e}"))
    })
}

/// Extract the topic identity from a manifest key.
///
/// Returns `None` for any key that is not a topic manifest, including
/// partition manifests and segment objects stored under the same prefixes.
pub fn parse_manifest_path(key: &str) -> Option<TopicNamespace> {
    let caps = manifest_key_regex().captures(key)?;
    Some(TopicNamespace::new(&caps[1], &caps[2]))
}

/// Key under which the manifest of `tp_ns` is stored
pub fn manifest_path_for(tp_ns: &TopicNamespace) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tp_ns.ns.as_bytes());
    hasher.update(b"/");
    hasher.update(tp_ns.topic.as_bytes());
    let prefix = hasher.finalize() & 0xf000_0000;

    format!(
        "{:08x}/meta/{}/{}/{}",
        prefix, tp_ns.ns, tp_ns.topic, TOPIC_MANIFEST_FILE
    )
}
