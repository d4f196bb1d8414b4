// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node addresses.
//!
//! Every data point the gateway touches is addressed by a
//! `(namespace index, identifier)` pair. Configuration only ever names
//! string identifiers, but a folder walk can surface children of any
//! identifier kind, so the full set is modelled here.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// NodeIdentifier
// =============================================================================

/// The identifier half of a node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum NodeIdentifier {
    /// Numeric identifier (`i=`).
    Numeric(u32),
    /// String identifier (`s=`).
    String(String),
    /// GUID identifier (`g=`).
    Guid(Uuid),
    /// Opaque byte-string identifier (`b=`, base64 in text form).
    Opaque(Vec<u8>),
}

impl NodeIdentifier {
    /// Returns the short kind prefix used in the text form.
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "i",
            Self::String(_) => "s",
            Self::Guid(_) => "g",
            Self::Opaque(_) => "b",
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Guid(v) => write!(f, "{}", v),
            Self::Opaque(v) => write!(f, "{}", BASE64.encode(v)),
        }
    }
}

// =============================================================================
// NodeAddress
// =============================================================================

/// A node address: namespace index plus identifier.
///
/// # Examples
///
/// ```
/// use sluice_core::NodeAddress;
///
/// let addr: NodeAddress = "ns=2;s=Line1.Temperature".parse().unwrap();
/// assert_eq!(addr.namespace_index, 2);
/// assert_eq!(addr.as_string(), Some("Line1.Temperature"));
/// assert_eq!(addr.to_string(), "ns=2;s=Line1.Temperature");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Namespace index.
    pub namespace_index: u16,

    /// Identifier within the namespace.
    pub identifier: NodeIdentifier,
}

impl NodeAddress {
    /// Creates a string-identified address.
    #[inline]
    pub fn string(namespace_index: u16, identifier: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(identifier.into()),
        }
    }

    /// Creates a numeric address.
    #[inline]
    pub const fn numeric(namespace_index: u16, identifier: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(identifier),
        }
    }

    /// Creates a GUID address.
    #[inline]
    pub const fn guid(namespace_index: u16, identifier: Uuid) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Guid(identifier),
        }
    }

    /// Creates an opaque address.
    #[inline]
    pub fn opaque(namespace_index: u16, identifier: impl Into<Vec<u8>>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Opaque(identifier.into()),
        }
    }

    /// Returns `true` if the identifier is a string.
    #[inline]
    pub const fn is_string(&self) -> bool {
        matches!(self.identifier, NodeIdentifier::String(_))
    }

    /// Returns the identifier text if it is a string identifier.
    #[inline]
    pub fn as_string(&self) -> Option<&str> {
        match &self.identifier {
            NodeIdentifier::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ns={};{}={}",
            self.namespace_index,
            self.identifier.prefix(),
            self.identifier
        )
    }
}

/// Error returned when a textual node address cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid node address '{input}': {reason}")]
pub struct AddressParseError {
    /// The rejected input.
    pub input: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl AddressParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    /// Parses `ns=<n>;{i|s|g|b}=<id>`; the namespace part may be omitted
    /// for namespace 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        let (namespace_index, rest) = match trimmed.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| AddressParseError::new(s, "missing identifier"))?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|_| AddressParseError::new(s, "invalid namespace index"))?;
                (ns, rest)
            }
            None => (0, trimmed),
        };

        let (kind, value) = rest
            .split_once('=')
            .ok_or_else(|| AddressParseError::new(s, "missing identifier kind"))?;

        let identifier = match kind {
            "i" => NodeIdentifier::Numeric(
                value
                    .parse()
                    .map_err(|_| AddressParseError::new(s, "invalid numeric identifier"))?,
            ),
            "s" if !value.is_empty() => NodeIdentifier::String(value.to_string()),
            "s" => return Err(AddressParseError::new(s, "empty string identifier")),
            "g" => NodeIdentifier::Guid(
                Uuid::parse_str(value).map_err(|_| AddressParseError::new(s, "invalid guid"))?,
            ),
            "b" => NodeIdentifier::Opaque(
                BASE64
                    .decode(value)
                    .map_err(|_| AddressParseError::new(s, "invalid base64"))?,
            ),
            _ => return Err(AddressParseError::new(s, "unknown identifier kind")),
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
