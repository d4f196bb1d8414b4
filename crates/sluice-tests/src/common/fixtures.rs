// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built configurations and timestamps used across the suites.

use chrono::{DateTime, TimeZone, Utc};

use sluice_config::{GatewayConfig, ServerConfig, SubscriptionConfig};

/// Endpoint of the first fixture server.
pub const PLC_ENDPOINT: &str = "opc.tcp://plc-1:4840";

/// Endpoint of the second fixture server.
pub const SECOND_PLC_ENDPOINT: &str = "opc.tcp://plc-2:4840";

/// Fixed timestamps.
pub struct TimeFixtures;

impl TimeFixtures {
    /// 2024-03-01T12:00:00Z.
    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap_or_default()
    }

    /// `t0` plus `millis` milliseconds.
    pub fn at_millis(millis: i64) -> DateTime<Utc> {
        Self::t0() + chrono::Duration::milliseconds(millis)
    }
}

/// Server configurations.
pub struct ServerFixtures;

impl ServerFixtures {
    /// Server 1 subscribed to `ns=2;s=temp`.
    pub fn temperature() -> ServerConfig {
        ServerConfig::new(1, PLC_ENDPOINT).with_subscription(SubscriptionConfig::nodes(2, ["temp"]))
    }

    /// Server `server_id` at `endpoint` with a folder subscription.
    pub fn folder(server_id: i32, endpoint: &str, ns: u16, folder: &str) -> ServerConfig {
        ServerConfig::new(server_id, endpoint).with_subscription(SubscriptionConfig::folder(ns, folder))
    }

    /// Server `server_id` at `endpoint` with no subscriptions.
    pub fn bare(server_id: i32, endpoint: &str) -> ServerConfig {
        ServerConfig::new(server_id, endpoint)
    }
}

/// Gateway configurations.
pub struct GatewayFixtures;

impl GatewayFixtures {
    /// Gateway over `servers` without startup reconciliation.
    pub fn with_servers(servers: Vec<ServerConfig>) -> GatewayConfig {
        GatewayConfig {
            reconcile_on_start: false,
            servers,
            ..GatewayConfig::default()
        }
    }

    /// Like [`with_servers`](Self::with_servers) with quit-on-error enabled.
    pub fn strict(servers: Vec<ServerConfig>) -> GatewayConfig {
        GatewayConfig {
            quit_on_error: true,
            ..Self::with_servers(servers)
        }
    }
}
