//! The untyped wire message: a mapping from field name to raw bytes.
//!
//! On the wire a message is a JSON object whose values are standard base64
//! strings. This is the only layer that sees unknown fields; the typed
//! [`crate::messages`] layer reads what it needs and ignores the rest.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Well-known field names.
pub mod fields {
    pub const CMD: &str = "cmd";
    pub const STATUS: &str = "status";
    pub const ERROR: &str = "error";
    /// Echo of a rejected request, itself a serialized message.
    pub const REQUEST: &str = "request";
    pub const CLIENT_PUBLIC_KEY: &str = "cli_pub";
    pub const SERVER_PUBLIC_KEY: &str = "srv_pub";
    /// Wrapped symmetric key.
    pub const KEY: &str = "key";
    /// IV-prefixed ciphertext.
    pub const DATA: &str = "data";
    pub const SIGNATURE: &str = "sign";
    pub const DIGEST: &str = "digest";
}

/// Field name → raw bytes. Keys are unique and unordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    fields: BTreeMap<String, Vec<u8>>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, returning the previous value if any.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Option<Vec<u8>> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Field value as text (lossy UTF-8).
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// Field value, or [`ProtocolError::MissingField`].
    pub fn require(&self, name: &'static str) -> ProtocolResult<&[u8]> {
        self.get(name).ok_or(ProtocolError::MissingField(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The `cmd` field, trimmed and lower-cased.
    pub fn command(&self) -> Option<String> {
        self.get_str(fields::CMD).map(|c| c.trim().to_ascii_lowercase())
    }

    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, &BASE64.encode(value))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `null` decodes to an empty value
        let raw = BTreeMap::<String, Option<String>>::deserialize(deserializer)?;
        let mut fields = BTreeMap::new();
        for (name, value) in raw {
            let bytes = match value {
                Some(text) => BASE64
                    .decode(text.as_bytes())
                    .map_err(|e| de::Error::custom(format!("field `{}`: {}", name, e)))?,
                None => Vec::new(),
            };
            fields.insert(name, bytes);
        }
        Ok(Self { fields })
    }
}
