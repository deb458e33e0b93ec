//! Shared Git LFS batch-protocol types for the caching proxy.
//!
//! The wire model lives here so that the object store, the upstream client
//! and the server agree on one representation of object ids, actions and
//! batch messages.

pub mod action;
pub mod batch;
pub mod codec;
pub mod error;
pub mod file_utils;
pub mod host;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use action::{ActionHeaders, ActionMode, BatchObjectAction};
pub use batch::{
    BatchEntity, BatchObject, BatchObjectError, BatchRequest, BatchTransfer, GitRef, Operation,
    TransferMode,
};
pub use codec::{parse, parse_slice, serialize, LfsMessage, LFS_CONTENT_TYPE};
pub use error::{ErrorResponse, ParseError, StatusCodeError};
pub use host::GitHost;
pub use stream::ByteStream;

/// Identity of an LFS object: content hash plus byte size.
///
/// Equality and hashing are structural over both fields, so two ids built
/// from the same pointer are interchangeable as cache keys.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    #[serde(rename = "oid")]
    hash: String,
    size: i64,
}

impl ObjectId {
    pub fn new(hash: impl Into<String>, size: i64) -> Self {
        Self {
            hash: hash.into(),
            size,
        }
    }

    /// Hex content hash (the LFS `oid`)
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Object size in bytes
    pub fn size(&self) -> i64 {
        self.size
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hash, self.size)
    }
}

/// Response from health check endpoint
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String, // "ok" when healthy
}
