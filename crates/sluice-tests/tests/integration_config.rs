// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Config Integration Tests
//!
//! Loading configuration files from disk and feeding them to the gateway.
//!
//! ## Test Categories
//!
//! - `test_config_*`: parsing and validation
//! - `test_config_gateway_*`: loaded configuration driving a gateway

use std::fs;

use sluice_bin::commands::ValidationSummary;
use sluice_bin::GatewayOrchestrator;
use sluice_config::{ConfigFormat, ConfigLoader, LogFormat, LogLevel};
use sluice_core::NodeAddress;
use sluice_tests::common::temp_test_dir;
use sluice_tests::prelude::*;

const GATEWAY_YAML: &str = r#"
quitOnError: false
pollIntervalMs: 2
reconcileOnStart: false
maxBrowseDepth: 4
registry:
  url: "http://registry.local:3000/api"
  username: "gateway"
  password: "registry-secret"
  eventsPath: "/values"
servers:
  - serverId: 1
    endpoint: "opc.tcp://plc-1:4840"
    subscriptions:
      - nsIndex: 2
        identifiers: ["temp"]
  - serverId: 2
    endpoint: "opc.tcp://plc-2:4840"
    username: "operator"
    password: "hunter2"
    subPublishPriority: 5
    subscriptions:
      - isFolder: true
        nsIndex: 3
        identifier: "Line1"
logging:
  level: warn
  format: compact
"#;

fn isolated(prefix: &str) -> ConfigLoader {
    ConfigLoader::builder().env_prefix(prefix).build()
}

#[test]
fn test_config_yaml_file() {
    let dir = temp_test_dir("sluice-config");
    let path = dir.path().join("gateway.yaml");
    fs::write(&path, GATEWAY_YAML).unwrap();

    let config = isolated("SLUICE_IT_YAML").load(&path).unwrap();

    assert_eq!(config.poll_interval_ms, 2);
    assert!(!config.reconcile_on_start);
    assert_eq!(config.max_browse_depth, 4);
    assert_eq!(config.registry.credentials(), Some(("gateway", "registry-secret")));
    assert_eq!(config.registry.events_path, "/values");
    assert_eq!(config.identifier_count(), 2);
    assert_eq!(config.servers[1].credentials(), Some(("operator", "hunter2")));
    assert_eq!(config.servers[1].subscription_params().priority, 5);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(config.logging.format, LogFormat::Compact);
}

#[test]
fn test_config_lowercase_keys() {
    let yaml = r#"
quitonerror: true
pollintervalms: 10
servers:
  - serverid: 3
    endpoint: "opc.tcp://legacy:4840"
    subpublishinterval: 500.0
    subscriptions:
      - isfolder: true
        nsindex: 1
        identifiers: ["Root"]
"#;
    let config = isolated("SLUICE_IT_LOWER")
        .load_from_str(yaml, ConfigFormat::Yaml)
        .unwrap();

    assert!(config.quit_on_error);
    assert_eq!(config.poll_interval_ms, 10);
    assert_eq!(config.servers[0].server_id, 3);
    assert_eq!(config.servers[0].sub_publish_interval, 500.0);
    assert!(config.servers[0].subscriptions[0].is_folder);
    assert_eq!(config.servers[0].subscriptions[0].ns_index, 1);
}

#[test]
fn test_config_rejects_duplicate_server_ids() {
    let yaml = r#"
servers:
  - serverId: 1
    endpoint: "opc.tcp://a:4840"
  - serverId: 1
    endpoint: "opc.tcp://b:4840"
"#;
    let result = isolated("SLUICE_IT_DUP").load_from_str(yaml, ConfigFormat::Yaml);
    assert!(result.is_err());
}

#[test]
fn test_config_rejects_empty_subscription() {
    let yaml = r#"
servers:
  - serverId: 1
    endpoint: "opc.tcp://a:4840"
    subscriptions:
      - nsIndex: 2
        identifiers: []
"#;
    let result = isolated("SLUICE_IT_EMPTY").load_from_str(yaml, ConfigFormat::Yaml);
    assert!(result.is_err());
}

#[test]
fn test_config_validation_summary() {
    let config = isolated("SLUICE_IT_SUMMARY")
        .load_from_str(GATEWAY_YAML, ConfigFormat::Yaml)
        .unwrap();

    let summary = ValidationSummary::inspect(&config, false);

    assert_eq!(summary.servers, 2);
    assert_eq!(summary.identifier_count, 2);
    assert_eq!(summary.registry_url, "http://registry.local:3000/api");
    assert_eq!(summary.poll_interval_ms, 2);
    // The folder subscription is bounded by maxBrowseDepth.
    assert!(summary.warnings.is_empty());
}

#[tokio::test]
async fn test_config_gateway_from_file() {
    let config = isolated("SLUICE_IT_GATEWAY")
        .load_from_str(GATEWAY_YAML, ConfigFormat::Yaml)
        .unwrap();

    let line = MockServer::new().with_children(NodeAddress::string(3, "Line1"), ["Temp", "Flow"]);
    let factory = MockProtocolFactory::new().with_server(SECOND_PLC_ENDPOINT, line.clone());
    let registry = RecordingTransport::new();
    let sync = registry.sync().with_events_path(config.registry.events_path.clone());

    let mut gateway = GatewayOrchestrator::new(config, factory.shared(), sync);
    gateway.start().await.unwrap();

    assert_eq!(factory.created(), vec![1, 2]);
    assert_eq!(gateway.connectors()[0].monitored_items().len(), 1);
    assert_eq!(gateway.connectors()[1].monitored_items().len(), 2);
    assert!(line.calls().iter().any(|call| matches!(
        call,
        ProtocolCall::ConnectWithCredentials { username, .. } if username == "operator"
    )));

    line.push_change(NodeAddress::string(3, "Flow"), 7.25f64, TimeFixtures::t0());
    gateway.poll_once().await;

    let events = registry.posted("/values");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["serverId"], 2);
    assert_eq!(events[0]["identifier"], "Flow");

    gateway.shutdown().await;
}
