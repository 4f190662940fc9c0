//! # Object Store
//!
//! Bucket access for recovery. [`ObjectStore`] is a single-attempt backend;
//! [`Remote`] layers the retry envelope on top.
//!
//! Backends:
//! - [`LocalObjectStore`]: buckets are directories under a root path
//! - [`MemoryObjectStore`]: in-process, with operation recording and
//!   failure injection

pub mod backend;
pub mod errors;
pub mod local;
pub mod memory;
pub mod remote;

pub use backend::{ListItem, ObjectStore};
pub use errors::{ObjectStoreError, ObjectStoreResult};
pub use local::LocalObjectStore;
pub use memory::{MemoryObjectStore, StoreOp, StoreOpKind};
pub use remote::{Remote, RemoteError};
