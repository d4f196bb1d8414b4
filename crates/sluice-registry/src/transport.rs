// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry transport abstraction.
//!
//! The gateway needs exactly three verbs against the registry, each with a
//! JSON body. Every call is self-contained: there is no cursor or session
//! state shared between calls, so one transport can serve every connector.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RegistryResult;

/// JSON-over-HTTP registry client.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// `GET path`, returning the decoded document.
    ///
    /// An empty body decodes to `Value::Null`.
    async fn get(&self, path: &str) -> RegistryResult<Value>;

    /// `POST path` with a JSON body, returning the response document.
    async fn post(&self, path: &str, body: &Value) -> RegistryResult<Value>;

    /// `PUT path` with a JSON body, returning the response document.
    async fn put(&self, path: &str, body: &Value) -> RegistryResult<Value>;

    /// Releases the transport. Later calls may fail.
    async fn close(&self) -> RegistryResult<()> {
        Ok(())
    }

    /// Returns a short name for logs.
    fn name(&self) -> &str {
        "registry"
    }
}

/// Returns `true` if a registry document means "no such record":
/// `null`, `{}`, `[]` or an empty string.
pub fn is_empty_document(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_documents() {
        assert!(is_empty_document(&Value::Null));
        assert!(is_empty_document(&json!({})));
        assert!(is_empty_document(&json!([])));
        assert!(is_empty_document(&json!("")));
    }

    #[test]
    fn test_present_documents() {
        assert!(!is_empty_document(&json!({"serverId": 1})));
        assert!(!is_empty_document(&json!([{"serverId": 1}])));
        assert!(!is_empty_document(&json!(0)));
        assert!(!is_empty_document(&json!(false)));
    }
}
