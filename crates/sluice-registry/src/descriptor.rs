// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry descriptor documents and their paths.

use serde::{Deserialize, Serialize};
use sluice_config::ServerConfig;

/// Collection for server descriptors.
pub const SERVERS_PATH: &str = "/servers";

/// Collection for subscription descriptors.
pub const SUBSCRIPTIONS_PATH: &str = "/subscriptions";

/// Server identity as stored in the registry. Credentials are not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    /// Server id.
    pub server_id: i32,
    /// Endpoint URL.
    pub endpoint: String,
    /// User name; empty for anonymous sessions.
    pub username: String,
    /// Publishing interval in milliseconds.
    pub sub_publish_interval: f64,
    /// Subscription priority.
    pub sub_publish_priority: u8,
}

impl ServerDescriptor {
    /// Path used to look the record up by natural key.
    pub fn lookup_path(&self) -> String {
        format!("{}/{}", SERVERS_PATH, self.server_id)
    }
}

impl From<&ServerConfig> for ServerDescriptor {
    fn from(config: &ServerConfig) -> Self {
        Self {
            server_id: config.server_id,
            endpoint: config.endpoint.clone(),
            username: config.username.clone(),
            sub_publish_interval: config.sub_publish_interval,
            sub_publish_priority: config.sub_publish_priority,
        }
    }
}

/// One subscribed node as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDescriptor {
    /// Owning server.
    pub server_id: i32,
    /// Namespace index.
    pub namespace_index: u16,
    /// Node identifier.
    pub identifier: String,
    /// Whether the node was reached through a folder subscription.
    pub is_folder: bool,
}

impl SubscriptionDescriptor {
    /// Creates a descriptor.
    pub fn new(server_id: i32, namespace_index: u16, identifier: impl Into<String>, is_folder: bool) -> Self {
        Self {
            server_id,
            namespace_index,
            identifier: identifier.into(),
            is_folder,
        }
    }

    /// Path used to look the record up by natural key.
    pub fn lookup_path(&self) -> String {
        format!(
            "{}/{}?identifier={}&serverId={}",
            SUBSCRIPTIONS_PATH,
            self.namespace_index,
            urlencoding::encode(&self.identifier),
            self.server_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_descriptor_has_no_password() {
        let config = sluice_config::ServerConfig::new(1, "opc.tcp://plc:4840")
            .with_credentials("operator", "hunter2");
        let descriptor = ServerDescriptor::from(&config);

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"serverId\":1"));
        assert!(json.contains("\"username\":\"operator\""));
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
        assert_eq!(descriptor.lookup_path(), "/servers/1");
    }

    #[test]
    fn test_subscription_lookup_path() {
        let descriptor = SubscriptionDescriptor::new(1, 2, "temp", false);
        assert_eq!(
            descriptor.lookup_path(),
            "/subscriptions/2?identifier=temp&serverId=1"
        );

        let descriptor = SubscriptionDescriptor::new(3, 4, "Line 1/T&P", true);
        assert_eq!(
            descriptor.lookup_path(),
            "/subscriptions/4?identifier=Line%201%2FT%26P&serverId=3"
        );
    }

    #[test]
    fn test_subscription_descriptor_json() {
        let descriptor = SubscriptionDescriptor::new(1, 2, "temp", true);
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            serde_json::json!({
                "serverId": 1,
                "namespaceIndex": 2,
                "identifier": "temp",
                "isFolder": true
            })
        );
    }
}
