// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value-change events.
//!
//! A [`ValueChangeEvent`] is the wire-neutral record posted to the
//! registry's event collection. It is built per notification, posted, and
//! dropped; nothing here is persisted.
//!
//! ```text
//! {
//!   "serverId": 1,
//!   "namespaceIndex": 2,
//!   "identifier": "temp",
//!   "type": "float",
//!   "value": 23.5,
//!   "timestamp": "2024-05-01T12:00:00.000Z"
//! }
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used on the wire: UTC, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a timestamp as `YYYY-MM-DDThh:mm:ss.sssZ`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a timestamp produced by [`format_timestamp`].
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

// =============================================================================
// TypeTag
// =============================================================================

/// The fixed enumeration of payload type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTC timestamp, formatted like the event timestamp.
    DateTime,
    /// Status code, as its raw 32-bit value.
    StatusCode,
}

impl TypeTag {
    /// Every tag, in declaration order.
    pub const ALL: [TypeTag; 14] = [
        TypeTag::String,
        TypeTag::Bool,
        TypeTag::Int8,
        TypeTag::UInt8,
        TypeTag::Int16,
        TypeTag::UInt16,
        TypeTag::Int32,
        TypeTag::UInt32,
        TypeTag::Int64,
        TypeTag::UInt64,
        TypeTag::Float,
        TypeTag::Double,
        TypeTag::DateTime,
        TypeTag::StatusCode,
    ];

    /// Returns the wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::DateTime => "datetime",
            Self::StatusCode => "statuscode",
        }
    }

    /// Returns `true` for the integer tags.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::UInt8
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown type tag: {}", s))
    }
}

// =============================================================================
// ValueChangeEvent
// =============================================================================

/// A normalized value change, ready to post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChangeEvent {
    /// Owning server.
    pub server_id: i32,

    /// Namespace of the monitored node.
    pub namespace_index: u16,

    /// Identifier of the monitored node.
    pub identifier: String,

    /// Payload type; absent when the value could not be classified.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<TypeTag>,

    /// Payload; absent when the value could not be classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Source timestamp, `YYYY-MM-DDThh:mm:ss.sssZ`.
    pub timestamp: String,
}

impl ValueChangeEvent {
    /// Returns `true` if the event carries a value and should be forwarded.
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.value.is_some()
    }
}

impl fmt::Display for ValueChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "server {} ns={};s={}",
            self.server_id, self.namespace_index, self.identifier
        )?;
        match (&self.type_tag, &self.value) {
            (Some(tag), Some(value)) => write!(f, " {}={} @ {}", tag, value, self.timestamp),
            _ => write!(f, " <no payload> @ {}", self.timestamp),
        }
    }
}
