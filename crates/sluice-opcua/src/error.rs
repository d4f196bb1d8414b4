// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Source Protocol error types.
//!
//! ```text
//! ProtocolError
//! ├── Connect        - session could not be established
//! ├── NotConnected   - call on a closed or unknown connection
//! ├── Subscription   - subscription create/remove failed
//! ├── MonitoredItem  - monitored item create/remove failed
//! ├── Browse         - child enumeration failed
//! └── Disconnect     - session close reported an error
//! ```
//!
//! Every variant carries the protocol's native [`StatusCode`].

use sluice_core::{GatewayError, NodeAddress, StatusCode};
use thiserror::Error;

/// Result type alias for Source Protocol calls.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors returned by a [`SourceProtocol`](crate::SourceProtocol).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Connecting failed.
    #[error("Connect to '{endpoint}' failed: {status}")]
    Connect {
        /// Endpoint URL.
        endpoint: String,
        /// Native status.
        status: StatusCode,
    },

    /// The connection is closed or unknown.
    #[error("Not connected")]
    NotConnected,

    /// A subscription could not be created or removed.
    #[error("Subscription failed: {status}")]
    Subscription {
        /// Native status.
        status: StatusCode,
    },

    /// A monitored item could not be created or removed.
    #[error("Monitored item {address} failed: {status}")]
    MonitoredItem {
        /// Node address.
        address: NodeAddress,
        /// Native status.
        status: StatusCode,
    },

    /// Browsing the children of a node failed.
    #[error("Browse {address} failed: {status}")]
    Browse {
        /// Node address.
        address: NodeAddress,
        /// Native status.
        status: StatusCode,
    },

    /// Closing the session reported an error.
    #[error("Disconnect failed: {status}")]
    Disconnect {
        /// Native status.
        status: StatusCode,
    },
}

impl ProtocolError {
    /// Creates a connect error.
    pub fn connect(endpoint: impl Into<String>, status: StatusCode) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a subscription error.
    pub fn subscription(status: StatusCode) -> Self {
        Self::Subscription { status }
    }

    /// Creates a monitored item error.
    pub fn monitored_item(address: NodeAddress, status: StatusCode) -> Self {
        Self::MonitoredItem { address, status }
    }

    /// Creates a browse error.
    pub fn browse(address: NodeAddress, status: StatusCode) -> Self {
        Self::Browse { address, status }
    }

    /// Returns the native status code.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Connect { status, .. }
            | Self::Subscription { status }
            | Self::MonitoredItem { status, .. }
            | Self::Browse { status, .. }
            | Self::Disconnect { status } => *status,
            Self::NotConnected => StatusCode::BAD_NOT_CONNECTED,
        }
    }
}

impl From<ProtocolError> for GatewayError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Connect { endpoint, status } => GatewayError::connect(endpoint, status),
            ProtocolError::MonitoredItem { ref address, status }
            | ProtocolError::Browse { ref address, status } => {
                GatewayError::subscription(address.to_string(), status)
            }
            other => GatewayError::subscription("subscription", other.status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProtocolError::NotConnected.status(),
            StatusCode::BAD_NOT_CONNECTED
        );
        assert_eq!(
            ProtocolError::subscription(StatusCode::BAD_TIMEOUT).status(),
            StatusCode::BAD_TIMEOUT
        );
    }

    #[test]
    fn test_into_gateway_error() {
        let err: GatewayError =
            ProtocolError::connect("opc.tcp://a", StatusCode::BAD_CONNECTION_REJECTED).into();
        assert!(err.is_fatal());

        let err: GatewayError = ProtocolError::monitored_item(
            NodeAddress::string(2, "temp"),
            StatusCode::BAD_NODE_ID_UNKNOWN,
        )
        .into();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("ns=2;s=temp"));
        assert_eq!(err.status(), StatusCode::BAD_NODE_ID_UNKNOWN);
    }
}
