//! tiered-recovery: restore topics from tiered object storage
//!
//! A recovery lists the topic manifests stored in a bucket, recreates the
//! topics the cluster is missing, then waits for every partition to report
//! that its data has been downloaded before restoring normal retention.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod http_server;
pub mod manifest;
pub mod object_store;
pub mod observability;
pub mod recovery;
pub mod retry;
