// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Connector Integration Tests
//!
//! A [`ServerConnector`] against a scripted server and a recording registry.
//!
//! ## Test Categories
//!
//! - `test_connect_*`: session establishment
//! - `test_subscribe_*`: single-node and folder subscriptions
//! - `test_update_*`: event forwarding
//! - `test_destroy_*`: teardown

use serde_json::json;

use sluice_config::{ServerConfig, SubscriptionConfig};
use sluice_core::{GatewayError, NodeAddress, StatusCode, Variant};
use sluice_opcua::{ChildReference, ServerConnector};
use sluice_tests::common::init_test_logging;
use sluice_tests::prelude::*;

async fn connect(
    config: ServerConfig,
    server: &MockServer,
    registry: &std::sync::Arc<RecordingTransport>,
) -> ServerConnector {
    ServerConnector::create(config, server.protocol(), registry.sync(), 0)
        .await
        .expect("connect should succeed")
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn test_connect_anonymous_without_username() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();

    let connector = connect(ServerFixtures::bare(1, PLC_ENDPOINT), &server, &registry).await;

    assert!(connector.is_connected());
    assert_eq!(
        server.calls(),
        vec![ProtocolCall::Connect {
            endpoint: PLC_ENDPOINT.to_string()
        }]
    );
}

#[tokio::test]
async fn test_connect_with_credentials() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let config = ServerFixtures::bare(1, PLC_ENDPOINT).with_credentials("operator", "hunter2");

    connect(config, &server, &registry).await;

    assert_eq!(
        server.calls(),
        vec![ProtocolCall::ConnectWithCredentials {
            endpoint: PLC_ENDPOINT.to_string(),
            username: "operator".to_string(),
            password: "hunter2".to_string(),
        }]
    );

    // The registered descriptor carries the user name, never the password.
    let posted = registry.posted("/servers");
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["username"], "operator");
    assert!(!posted[0].to_string().contains("hunter2"));
}

#[tokio::test]
async fn test_connect_failure_touches_nothing() {
    let server = MockServer::new().fail_connect(StatusCode::BAD_TIMEOUT);
    let registry = RecordingTransport::new();

    let err = ServerConnector::create(ServerFixtures::temperature(), server.protocol(), registry.sync(), 0)
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Connect { .. }));
    assert_eq!(err.status(), StatusCode::BAD_TIMEOUT);
    assert!(registry.requests().is_empty());
    assert!(!server.is_connected());
}

#[tokio::test]
async fn test_connect_updates_existing_descriptor() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    registry.serve("/servers/1", json!({"serverId": 1, "endpoint": "opc.tcp://old"}));

    connect(ServerFixtures::bare(1, PLC_ENDPOINT), &server, &registry).await;

    assert_eq!(registry.lines(), vec!["GET /servers/1", "PUT /servers"]);
    let put = &registry.requests()[1];
    assert_eq!(put.body.as_ref().map(|b| b["endpoint"].clone()), Some(json!(PLC_ENDPOINT)));
}

#[tokio::test]
async fn test_connect_lookup_failure_skips_write() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    registry.fail("/servers/1");

    let connector = connect(ServerFixtures::bare(1, PLC_ENDPOINT), &server, &registry).await;

    assert!(connector.is_connected());
    assert_eq!(registry.lines(), vec!["GET /servers/1"]);
}

// =============================================================================
// Subscribe
// =============================================================================

#[tokio::test]
async fn test_subscribe_single_node() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::temperature(), &server, &registry).await;

    assert!(connector.apply_subscriptions().await.is_good());

    let items = connector.monitored_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].identifier, "temp");
    assert!(!items[0].is_folder);
    assert_eq!(server.items().len(), 1);
    assert_eq!(
        registry.posted("/subscriptions"),
        vec![json!({"serverId": 1, "namespaceIndex": 2, "identifier": "temp", "isFolder": false})]
    );
}

#[tokio::test]
async fn test_subscribe_folder_filters_children() {
    init_test_logging();

    let folder = NodeAddress::string(3, "Line1");
    let server = MockServer::new()
        .with_children(folder.clone(), ["Temp", "Pressure"])
        .with_references(
            folder.clone(),
            [
                ChildReference::forward(NodeAddress::numeric(0, 61)),
                ChildReference::inverse(NodeAddress::string(3, "Plant")),
                ChildReference::forward(NodeAddress::string(3, "Flow")),
            ],
        );
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::folder(1, PLC_ENDPOINT, 3, "Line1"), &server, &registry).await;

    assert!(connector.apply_subscriptions().await.is_good());

    let identifiers: Vec<&str> = connector
        .monitored_items()
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(identifiers, vec!["Temp", "Pressure", "Flow"]);
    assert!(connector.monitored_items().iter().all(|item| item.is_folder));

    // The folder itself is browsed, never monitored.
    assert_eq!(
        server.count_calls(|c| matches!(c, ProtocolCall::AddMonitoredItem(a) if *a == folder)),
        0
    );
    // One subscription serves every item.
    assert_eq!(
        server.count_calls(|c| matches!(c, ProtocolCall::CreateSubscription(_))),
        1
    );

    let posted = registry.posted("/subscriptions");
    assert_eq!(posted.len(), 3);
    assert!(posted.iter().all(|d| d["isFolder"] == json!(true)));
}

#[tokio::test]
async fn test_subscribe_folder_descends() {
    let server = MockServer::new()
        .with_children(NodeAddress::string(2, "Plant"), ["Line1", "Line2"])
        .with_children(NodeAddress::string(2, "Line1"), ["T1"])
        .with_children(NodeAddress::string(2, "Line2"), ["T2"]);
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::folder(1, PLC_ENDPOINT, 2, "Plant"), &server, &registry).await;

    connector.apply_subscriptions().await;

    let identifiers: Vec<&str> = connector
        .monitored_items()
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(identifiers, vec!["Line1", "Line2", "T1", "T2"]);
}

#[tokio::test]
async fn test_subscribe_folder_depth_limit() {
    let server = MockServer::new()
        .with_children(NodeAddress::string(2, "Plant"), ["Line1"])
        .with_children(NodeAddress::string(2, "Line1"), ["T1"]);
    let registry = RecordingTransport::new();

    let mut connector = ServerConnector::create(
        ServerFixtures::folder(1, PLC_ENDPOINT, 2, "Plant"),
        server.protocol(),
        registry.sync(),
        1,
    )
    .await
    .unwrap();
    connector.apply_subscriptions().await;

    assert_eq!(connector.monitored_items().len(), 1);
    assert_eq!(
        server.count_calls(|c| matches!(c, ProtocolCall::Browse(_))),
        1
    );
}

#[tokio::test]
async fn test_subscribe_duplicate_child_yields_two_items() {
    let folder = NodeAddress::string(2, "Line1");
    let server = MockServer::new().with_children(folder, ["Temp", "Temp"]);
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::folder(1, PLC_ENDPOINT, 2, "Line1"), &server, &registry).await;

    connector.apply_subscriptions().await;

    let items = connector.monitored_items();
    assert_eq!(items.len(), 2);
    assert_ne!(items[0].item_handle, items[1].item_handle);
    assert_eq!(items[0].identifier, items[1].identifier);
}

#[tokio::test]
async fn test_subscribe_failure_continues_with_remaining_entries() {
    let server = MockServer::new().fail_item(NodeAddress::string(2, "broken"), StatusCode::BAD_NODE_ID_UNKNOWN);
    let registry = RecordingTransport::new();
    let config = ServerFixtures::bare(1, PLC_ENDPOINT)
        .with_subscription(SubscriptionConfig::nodes(2, ["broken", "temp"]))
        .with_subscription(SubscriptionConfig::nodes(2, ["pressure"]));
    let mut connector = connect(config, &server, &registry).await;

    let status = connector.apply_subscriptions().await;

    assert_eq!(status, StatusCode::BAD_NODE_ID_UNKNOWN);
    assert_eq!(connector.status(), StatusCode::BAD_NODE_ID_UNKNOWN);
    let identifiers: Vec<&str> = connector
        .monitored_items()
        .iter()
        .map(|item| item.identifier.as_str())
        .collect();
    assert_eq!(identifiers, vec!["temp", "pressure"]);
    assert_eq!(registry.posted("/subscriptions").len(), 2);
}

#[tokio::test]
async fn test_subscribe_folder_root_browse_failure() {
    let folder = NodeAddress::string(2, "Missing");
    let server = MockServer::new().fail_browse(folder, StatusCode::BAD_NODE_ID_UNKNOWN);
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::folder(1, PLC_ENDPOINT, 2, "Missing"), &server, &registry).await;

    assert_eq!(connector.apply_subscriptions().await, StatusCode::BAD_NODE_ID_UNKNOWN);
    assert!(connector.monitored_items().is_empty());
}

// =============================================================================
// Update
// =============================================================================

#[tokio::test]
async fn test_update_end_to_end_request_order() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::temperature(), &server, &registry).await;
    connector.apply_subscriptions().await;

    server.push_change(NodeAddress::string(2, "temp"), 23.5f32, TimeFixtures::t0());
    assert!(connector.update().await.is_good());

    assert_eq!(
        registry.lines(),
        vec![
            "GET /servers/1",
            "POST /servers",
            "GET /subscriptions/2?identifier=temp&serverId=1",
            "POST /subscriptions",
            "POST /events",
        ]
    );
    assert_eq!(
        registry.posted("/events"),
        vec![json!({
            "serverId": 1,
            "namespaceIndex": 2,
            "identifier": "temp",
            "type": "float",
            "value": 23.5,
            "timestamp": "2024-03-01T12:00:00.000Z"
        })]
    );
}

#[tokio::test]
async fn test_update_preserves_delivery_order() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let config = ServerFixtures::bare(1, PLC_ENDPOINT)
        .with_subscription(SubscriptionConfig::nodes(2, ["temp", "running", "label"]));
    let mut connector = connect(config, &server, &registry).await;
    connector.apply_subscriptions().await;

    server.push_change(NodeAddress::string(2, "running"), true, TimeFixtures::at_millis(1));
    server.push_change(NodeAddress::string(2, "temp"), 21.25f64, TimeFixtures::at_millis(2));
    server.push_change(NodeAddress::string(2, "label"), "batch-7", TimeFixtures::at_millis(3));
    connector.update().await;

    let events = registry.posted("/events");
    let summary: Vec<(String, String)> = events
        .iter()
        .map(|e| (e["identifier"].as_str().unwrap().to_string(), e["type"].as_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("running".to_string(), "bool".to_string()),
            ("temp".to_string(), "double".to_string()),
            ("label".to_string(), "string".to_string()),
        ]
    );
    assert_eq!(events[2]["value"], "batch-7");
    assert_eq!(events[2]["timestamp"], "2024-03-01T12:00:00.003Z");
}

#[tokio::test]
async fn test_update_payloadless_event_not_posted() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::temperature(), &server, &registry).await;
    connector.apply_subscriptions().await;
    let before = registry.requests().len();

    server.push_change(NodeAddress::string(2, "temp"), Variant::Null, TimeFixtures::t0());
    server.push_change(
        NodeAddress::string(2, "temp"),
        Variant::Array(vec![Variant::from(1i32)]),
        TimeFixtures::t0(),
    );
    assert!(connector.update().await.is_good());

    assert_eq!(registry.requests().len(), before);
}

#[tokio::test]
async fn test_update_event_loss_does_not_degrade() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    registry.fail("/events");
    let mut connector = connect(ServerFixtures::temperature(), &server, &registry).await;
    connector.apply_subscriptions().await;

    server.push_change(NodeAddress::string(2, "temp"), 1.5f32, TimeFixtures::t0());
    server.push_change(NodeAddress::string(2, "temp"), 2.5f32, TimeFixtures::t0());

    assert!(connector.update().await.is_good());
    assert_eq!(registry.posted("/events").len(), 2);
}

#[tokio::test]
async fn test_update_bad_pump_status_is_sticky() {
    let server = MockServer::new().with_pump_status(StatusCode::BAD_CONNECTION_CLOSED);
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::temperature(), &server, &registry).await;
    connector.apply_subscriptions().await;

    assert_eq!(connector.update().await, StatusCode::BAD_CONNECTION_CLOSED);
    assert_eq!(connector.update().await, StatusCode::BAD_CONNECTION_CLOSED);
    assert_eq!(connector.status(), StatusCode::BAD_CONNECTION_CLOSED);
}

// =============================================================================
// Destroy
// =============================================================================

#[tokio::test]
async fn test_destroy_releases_items_then_disconnects() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let config = ServerFixtures::bare(1, PLC_ENDPOINT).with_subscription(SubscriptionConfig::nodes(2, ["a", "b"]));
    let mut connector = connect(config, &server, &registry).await;
    connector.apply_subscriptions().await;

    connector.destroy().await;
    connector.destroy().await;

    let teardown: Vec<ProtocolCall> = server
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                ProtocolCall::RemoveMonitoredItem(_) | ProtocolCall::RemoveSubscription(_) | ProtocolCall::Disconnect
            )
        })
        .collect();
    assert_eq!(teardown.len(), 4);
    assert!(matches!(teardown[0], ProtocolCall::RemoveMonitoredItem(_)));
    assert!(matches!(teardown[1], ProtocolCall::RemoveMonitoredItem(_)));
    assert!(matches!(teardown[2], ProtocolCall::RemoveSubscription(_)));
    assert_eq!(teardown[3], ProtocolCall::Disconnect);

    assert!(!connector.is_connected());
    assert!(server.items().is_empty());
    assert!(!server.is_connected());
}

#[tokio::test]
async fn test_destroy_stops_updates() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let mut connector = connect(ServerFixtures::temperature(), &server, &registry).await;
    connector.apply_subscriptions().await;
    connector.destroy().await;

    let pumps = server.count_calls(|c| *c == ProtocolCall::Pump);
    connector.update().await;
    assert_eq!(server.count_calls(|c| *c == ProtocolCall::Pump), pumps);
}
