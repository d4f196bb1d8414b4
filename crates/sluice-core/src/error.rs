// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway error taxonomy.
//!
//! ```text
//! GatewayError
//! ├── Connect                 connector construction aborted (fatal to the connector)
//! ├── Subscription            one subscribe operation failed (status degraded)
//! ├── Transport               registry call failed (logged and swallowed)
//! └── UnrecognizedValueType   value dropped before reaching the registry
//! ```
//!
//! Only `Connect` ever propagates out of connector construction; the other
//! categories are handled where they occur and surface through status codes
//! and log lines.

use thiserror::Error;

use crate::status::StatusCode;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by the gateway core.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connecting to a Source Protocol endpoint did not return a good status.
    #[error("Connect to '{endpoint}' failed: {status}")]
    Connect {
        /// The endpoint that was dialled.
        endpoint: String,
        /// The native status code.
        status: StatusCode,
    },

    /// Creating a subscription or monitored item failed.
    #[error("Subscription on {target} failed: {status}")]
    Subscription {
        /// The node or subscription that failed.
        target: String,
        /// The native status code.
        status: StatusCode,
    },

    /// A registry call failed.
    #[error("Registry {method} {path} failed: {message}")]
    Transport {
        /// HTTP method.
        method: &'static str,
        /// Request path.
        path: String,
        /// Failure description.
        message: String,
    },

    /// A value had no mapping onto the type tag enumeration.
    #[error("Unrecognized value type '{type_name}' for {identifier}")]
    UnrecognizedValueType {
        /// Identifier of the monitored node.
        identifier: String,
        /// Native type name.
        type_name: &'static str,
    },
}

impl GatewayError {
    /// Creates a connect error.
    pub fn connect(endpoint: impl Into<String>, status: StatusCode) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a subscription error.
    pub fn subscription(target: impl Into<String>, status: StatusCode) -> Self {
        Self::Subscription {
            target: target.into(),
            status,
        }
    }

    /// Creates a transport error.
    pub fn transport(method: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            method,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an unrecognized-value error.
    pub fn unrecognized(identifier: impl Into<String>, type_name: &'static str) -> Self {
        Self::UnrecognizedValueType {
            identifier: identifier.into(),
            type_name,
        }
    }

    /// Returns the status code this error reports.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Connect { status, .. } | Self::Subscription { status, .. } => *status,
            Self::Transport { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
            Self::UnrecognizedValueType { .. } => StatusCode::BAD_DATA_TYPE_ID_UNKNOWN,
        }
    }

    /// Returns the error category name.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Subscription { .. } => "subscription",
            Self::Transport { .. } => "transport",
            Self::UnrecognizedValueType { .. } => "unrecognized_value_type",
        }
    }

    /// Returns `true` if the error aborts connector construction.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error() {
        let err = GatewayError::connect("opc.tcp://plc:4840", StatusCode::BAD_CONNECTION_REJECTED);
        assert!(err.is_fatal());
        assert_eq!(err.status(), StatusCode::BAD_CONNECTION_REJECTED);
        assert_eq!(err.category(), "connect");
        assert!(err.to_string().contains("opc.tcp://plc:4840"));
    }

    #[test]
    fn test_advisory_errors() {
        let sub = GatewayError::subscription("ns=2;s=x", StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(!sub.is_fatal());
        assert_eq!(sub.status(), StatusCode::BAD_NODE_ID_UNKNOWN);

        let transport = GatewayError::transport("POST", "/events", "connection refused");
        assert_eq!(transport.status(), StatusCode::BAD_COMMUNICATION_ERROR);
        assert_eq!(
            transport.to_string(),
            "Registry POST /events failed: connection refused"
        );

        let unknown = GatewayError::unrecognized("blob", "ByteString");
        assert_eq!(unknown.category(), "unrecognized_value_type");
        assert!(!unknown.status().is_good());
    }
}
