//! Batch request and response messages.

use crate::action::{ActionMode, BatchObjectAction, WireActions};
use crate::error::ParseError;
use crate::ObjectId;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Direction of a batch request
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Upload,
    Download,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Download => "download",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Operation::Upload),
            "download" => Ok(Operation::Download),
            other => Err(ParseError::UnknownTag {
                kind: "operation",
                value: other.to_string(),
            }),
        }
    }
}

/// Transfer adapter. Only `basic` is supported.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Basic,
}

impl FromStr for TransferMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(TransferMode::Basic),
            other => Err(ParseError::UnknownTag {
                kind: "transfer",
                value: other.to_string(),
            }),
        }
    }
}

/// Git ref the request is made on behalf of
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GitRef {
    pub name: String,
}

/// Batch request sent by a Git client, and reduced by the proxy for upstream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BatchRequest {
    pub operation: Operation,
    #[serde(default, deserialize_with = "supported_transfers")]
    pub transfers: Vec<TransferMode>,
    pub objects: Vec<ObjectId>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<GitRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algo: Option<String>,
}

impl BatchRequest {
    pub fn new(operation: Operation, objects: Vec<ObjectId>) -> Self {
        Self {
            operation,
            transfers: vec![TransferMode::Basic],
            objects,
            git_ref: None,
            hash_algo: None,
        }
    }

    /// Same request restricted to `objects`
    pub fn with_objects(&self, objects: Vec<ObjectId>) -> Self {
        Self {
            operation: self.operation,
            transfers: self.transfers.clone(),
            objects,
            git_ref: self.git_ref.clone(),
            hash_algo: self.hash_algo.clone(),
        }
    }
}

/// Clients advertise every adapter they know (`lfs-standalone-file`, `ssh`, ...);
/// only the ones this side understands are kept.
fn supported_transfers<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<TransferMode>, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names
        .iter()
        .filter_map(|name| TransferMode::from_str(name).ok())
        .collect())
}

/// Successful per-object result of a batch call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchObject {
    pub id: ObjectId,
    pub authenticated: Option<bool>,
    pub actions: BTreeMap<ActionMode, BatchObjectAction>,
}

impl BatchObject {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            authenticated: None,
            actions: BTreeMap::new(),
        }
    }

    /// Add an action, keyed by its own mode
    pub fn with_action(mut self, action: BatchObjectAction) -> Self {
        self.actions.insert(action.mode, action);
        self
    }

    pub fn action(&self, mode: ActionMode) -> Option<&BatchObjectAction> {
        self.actions.get(&mode)
    }
}

/// Failed per-object result of a batch call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchObjectError {
    pub id: ObjectId,
    pub code: i32,
    pub message: String,
}

/// One entry of a batch response: either actions for the object or an error.
///
/// The variant is decided once, while parsing, by the presence of `error`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "RawEntity", into = "RawEntity")]
pub enum BatchEntity {
    Success(BatchObject),
    Error(BatchObjectError),
}

impl BatchEntity {
    pub fn id(&self) -> &ObjectId {
        match self {
            BatchEntity::Success(object) => &object.id,
            BatchEntity::Error(error) => &error.id,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawError {
    code: i32,
    message: String,
}

#[derive(Serialize, Deserialize)]
struct RawEntity {
    oid: String,
    size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    authenticated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actions: Option<WireActions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RawError>,
}

impl TryFrom<RawEntity> for BatchEntity {
    type Error = ParseError;

    fn try_from(raw: RawEntity) -> Result<Self, ParseError> {
        let id = ObjectId::new(raw.oid, raw.size);
        if let Some(error) = raw.error {
            return Ok(BatchEntity::Error(BatchObjectError {
                id,
                code: error.code,
                message: error.message,
            }));
        }
        Ok(BatchEntity::Success(BatchObject {
            id,
            authenticated: raw.authenticated,
            actions: raw.actions.map(|a| a.0).unwrap_or_default(),
        }))
    }
}

impl From<BatchEntity> for RawEntity {
    fn from(entity: BatchEntity) -> Self {
        match entity {
            BatchEntity::Success(object) => RawEntity {
                oid: object.id.hash().to_string(),
                size: object.id.size(),
                authenticated: object.authenticated,
                actions: if object.actions.is_empty() {
                    None
                } else {
                    Some(WireActions(object.actions))
                },
                error: None,
            },
            BatchEntity::Error(error) => RawEntity {
                oid: error.id.hash().to_string(),
                size: error.id.size(),
                authenticated: None,
                actions: None,
                error: Some(RawError {
                    code: error.code,
                    message: error.message,
                }),
            },
        }
    }
}

/// Batch response: the transfer adapter chosen and one entity per object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BatchTransfer {
    #[serde(rename = "transfer", default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TransferMode>,
    pub objects: Vec<BatchEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algo: Option<String>,
}

impl BatchTransfer {
    pub fn basic(objects: Vec<BatchEntity>) -> Self {
        Self {
            mode: Some(TransferMode::Basic),
            objects,
            hash_algo: None,
        }
    }
}
