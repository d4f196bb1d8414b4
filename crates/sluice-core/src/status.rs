// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Status codes.
//!
//! Connectors report their health as a 32-bit status code in the OPC UA
//! layout: the two high bits carry the severity (`00` good, `01` uncertain,
//! `10`/`11` bad) and the remaining bits identify the condition.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit protocol status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StatusCode(u32);

impl StatusCode {
    /// The operation succeeded.
    pub const GOOD: Self = Self(0x0000_0000);

    /// An unexpected error occurred.
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);

    /// A low level communication error occurred.
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);

    /// The operation timed out.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);

    /// The operation was cancelled because the application is shutting down.
    pub const BAD_SHUTDOWN: Self = Self(0x800C_0000);

    /// There was nothing to do because no work was specified.
    pub const BAD_NOTHING_TO_DO: Self = Self(0x800F_0000);

    /// The user identity token was rejected.
    pub const BAD_IDENTITY_TOKEN_REJECTED: Self = Self(0x8021_0000);

    /// The subscription id is not valid.
    pub const BAD_SUBSCRIPTION_ID_INVALID: Self = Self(0x8028_0000);

    /// The node id refers to a node that does not exist.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);

    /// The monitored item id does not refer to a valid monitored item.
    pub const BAD_MONITORED_ITEM_ID_INVALID: Self = Self(0x8042_0000);

    /// The variant contains a type the receiver does not support.
    pub const BAD_DATA_TYPE_ID_UNKNOWN: Self = Self(0x8011_0000);

    /// The client is not connected.
    pub const BAD_NOT_CONNECTED: Self = Self(0x808A_0000);

    /// The server rejected the connection.
    pub const BAD_CONNECTION_REJECTED: Self = Self(0x80AC_0000);

    /// The connection has been closed.
    pub const BAD_CONNECTION_CLOSED: Self = Self(0x80AE_0000);

    /// Creates a status code from its raw bits.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if the severity is good.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` if the severity is uncertain.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` if the severity is bad.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name for well-known codes.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::GOOD => "Good",
            Self::BAD_UNEXPECTED_ERROR => "BadUnexpectedError",
            Self::BAD_COMMUNICATION_ERROR => "BadCommunicationError",
            Self::BAD_TIMEOUT => "BadTimeout",
            Self::BAD_SHUTDOWN => "BadShutdown",
            Self::BAD_NOTHING_TO_DO => "BadNothingToDo",
            Self::BAD_IDENTITY_TOKEN_REJECTED => "BadIdentityTokenRejected",
            Self::BAD_SUBSCRIPTION_ID_INVALID => "BadSubscriptionIdInvalid",
            Self::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            Self::BAD_MONITORED_ITEM_ID_INVALID => "BadMonitoredItemIdInvalid",
            Self::BAD_DATA_TYPE_ID_UNKNOWN => "BadDataTypeIdUnknown",
            Self::BAD_NOT_CONNECTED => "BadNotConnected",
            Self::BAD_CONNECTION_REJECTED => "BadConnectionRejected",
            Self::BAD_CONNECTION_CLOSED => "BadConnectionClosed",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<StatusCode> for u32 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
