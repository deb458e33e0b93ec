//! Per-object transfer actions returned by a batch response.

use crate::error::ParseError;
use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which transfer an action authorizes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    Upload,
    Download,
    Verify,
}

impl ActionMode {
    pub const ALL: [ActionMode; 3] = [ActionMode::Upload, ActionMode::Download, ActionMode::Verify];

    /// Lower-case wire tag, also used as the pending-action file suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Upload => "upload",
            ActionMode::Download => "download",
            ActionMode::Verify => "verify",
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(ActionMode::Upload),
            "download" => Ok(ActionMode::Download),
            "verify" => Ok(ActionMode::Verify),
            other => Err(ParseError::UnknownTag {
                kind: "action",
                value: other.to_string(),
            }),
        }
    }
}

/// HTTP headers attached to an action.
///
/// Kept as an ordered list of pairs: the wire object may repeat a key and
/// the order it was received in is the order it is replayed in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionHeaders(Vec<(String, String)>);

impl ActionHeaders {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// First value for `key`, compared case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ActionHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Serialize for ActionHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ActionHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeadersVisitor;

        impl<'de> Visitor<'de> for HeadersVisitor {
            type Value = ActionHeaders;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    pairs.push((key, value));
                }
                Ok(ActionHeaders(pairs))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(ActionHeaders::new())
            }
        }

        deserializer.deserialize_any(HeadersVisitor)
    }
}

/// A single authorized HTTP call against one object.
///
/// Standalone serialization (the form persisted as a pending action)
/// carries `mode`; inside a batch response the mode is the key of the
/// `actions` object instead.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BatchObjectAction {
    pub mode: ActionMode,
    pub href: String,
    #[serde(rename = "header", default, skip_serializing_if = "ActionHeaders::is_empty")]
    pub headers: ActionHeaders,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl BatchObjectAction {
    pub fn new(mode: ActionMode, href: impl Into<String>) -> Self {
        Self {
            mode,
            href: href.into(),
            headers: ActionHeaders::new(),
            expires_in: None,
            expires_at: None,
        }
    }
}

#[derive(Serialize)]
struct WireActionRef<'a> {
    href: &'a str,
    #[serde(rename = "header", skip_serializing_if = "ActionHeaders::is_empty")]
    headers: &'a ActionHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<&'a DateTime<Utc>>,
}

#[derive(Deserialize)]
struct WireAction {
    href: String,
    #[serde(rename = "header", default)]
    headers: ActionHeaders,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// The `actions` object of a successful batch entity, keyed by mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct WireActions(pub BTreeMap<ActionMode, BatchObjectAction>);

impl Serialize for WireActions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (mode, action) in &self.0 {
            let wire = WireActionRef {
                href: &action.href,
                headers: &action.headers,
                expires_in: action.expires_in,
                expires_at: action.expires_at.as_ref(),
            };
            map.serialize_entry(mode.as_str(), &wire)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for WireActions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, WireAction>::deserialize(deserializer)?;
        let mut actions = BTreeMap::new();
        for (key, wire) in raw {
            let mode = ActionMode::from_str(&key).map_err(de::Error::custom)?;
            actions.insert(
                mode,
                BatchObjectAction {
                    mode,
                    href: wire.href,
                    headers: wire.headers,
                    expires_in: wire.expires_in,
                    expires_at: wire.expires_at,
                },
            );
        }
        Ok(WireActions(actions))
    }
}
