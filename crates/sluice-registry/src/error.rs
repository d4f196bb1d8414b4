// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry transport errors.

use std::path::PathBuf;

use sluice_core::GatewayError;
use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised by a registry transport.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The request could not be sent or no response arrived.
    #[error("{method} {path}: request failed: {message}")]
    Request {
        /// HTTP method.
        method: &'static str,
        /// Request path.
        path: String,
        /// Failure description.
        message: String,
    },

    /// The registry answered with a non-success status.
    #[error("{method} {path}: HTTP {status}")]
    Status {
        /// HTTP method.
        method: &'static str,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not valid JSON.
    #[error("{method} {path}: malformed response: {message}")]
    Decode {
        /// HTTP method.
        method: &'static str,
        /// Request path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A descriptor or event could not be serialized.
    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// The exchange log could not be opened or written.
    #[error("Exchange log '{path}': {source}")]
    Log {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The transport could not be built.
    #[error("Invalid registry client configuration: {0}")]
    Client(String),
}

impl RegistryError {
    /// Creates a request error.
    pub fn request(method: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            method,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a status error.
    pub fn status(method: &'static str, path: impl Into<String>, status: u16) -> Self {
        Self::Status {
            method,
            path: path.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(method: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            method,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP method involved, if any.
    pub fn method(&self) -> Option<&'static str> {
        match self {
            Self::Request { method, .. } | Self::Status { method, .. } | Self::Decode { method, .. } => {
                Some(*method)
            }
            _ => None,
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::Request { method, path, .. }
            | RegistryError::Status { method, path, .. }
            | RegistryError::Decode { method, path, .. } => {
                GatewayError::transport(*method, path.clone(), err.to_string())
            }
            _ => GatewayError::transport("-", "-", err.to_string()),
        }
    }
}
