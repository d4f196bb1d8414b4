// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Value Pipeline Integration Tests
//!
//! Native values travelling from a scripted server, through a connector,
//! onto the registry wire and back.
//!
//! ## Test Categories
//!
//! - `test_pipeline_*`: end-to-end value fidelity
//! - `test_status_*`: status code surface

use chrono::TimeZone;

use sluice_config::SubscriptionConfig;
use sluice_core::{decode, GatewayError, NodeAddress, StatusCode, TypeTag, ValueChangeEvent, Variant};
use sluice_opcua::ServerConnector;
use sluice_tests::prelude::*;

fn pipeline_samples() -> Vec<(&'static str, Variant)> {
    let at = chrono::Utc
        .with_ymd_and_hms(2023, 11, 5, 8, 30, 15)
        .single()
        .unwrap()
        + chrono::Duration::milliseconds(42);

    vec![
        ("label", Variant::from("line-3")),
        ("running", Variant::from(false)),
        ("offset", Variant::SByte(-7)),
        ("mode", Variant::Byte(3)),
        ("level", Variant::Int16(-300)),
        ("rpm", Variant::UInt16(1450)),
        ("counter", Variant::Int32(-70_000)),
        ("cycles", Variant::UInt32(3_000_000_000)),
        ("energy", Variant::Int64(-9_000_000_000)),
        ("serial", Variant::UInt64(18_000_000_000_000_000_000)),
        ("temp", Variant::Float(23.5)),
        ("pressure", Variant::Double(1.013_25)),
        ("changed", Variant::DateTime(at)),
        ("quality", Variant::StatusCode(StatusCode::BAD_COMMUNICATION_ERROR)),
    ]
}

#[tokio::test]
async fn test_pipeline_every_tag_survives_the_wire() {
    let samples = pipeline_samples();
    let identifiers: Vec<&str> = samples.iter().map(|(id, _)| *id).collect();

    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let config = ServerFixtures::bare(5, PLC_ENDPOINT).with_subscription(SubscriptionConfig::nodes(6, identifiers));
    let mut connector = ServerConnector::create(config, server.protocol(), registry.sync(), 0)
        .await
        .unwrap();
    connector.apply_subscriptions().await;

    for (i, (identifier, value)) in samples.iter().enumerate() {
        server.push_change(
            NodeAddress::string(6, *identifier),
            value.clone(),
            TimeFixtures::at_millis(i as i64),
        );
    }
    assert!(connector.update().await.is_good());

    let posted = registry.posted("/events");
    assert_eq!(posted.len(), samples.len());

    let mut seen_tags = Vec::new();
    for ((identifier, native), body) in samples.iter().zip(&posted) {
        let event: ValueChangeEvent = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(event.server_id, 5);
        assert_eq!(event.namespace_index, 6);
        assert_eq!(event.identifier, *identifier);

        let tag = event.type_tag.expect("recognized value carries a tag");
        let payload = event.value.as_ref().expect("recognized value carries a payload");
        assert_eq!(decode(tag, payload).as_ref(), Some(native), "round trip of {}", identifier);
        seen_tags.push(tag);
    }

    for tag in TypeTag::ALL {
        assert!(seen_tags.contains(&tag), "{} not exercised", tag);
    }
}

#[tokio::test]
async fn test_pipeline_timestamps_use_millisecond_precision() {
    let server = MockServer::new();
    let registry = RecordingTransport::new();
    let mut connector = ServerConnector::create(ServerFixtures::temperature(), server.protocol(), registry.sync(), 0)
        .await
        .unwrap();
    connector.apply_subscriptions().await;

    let at = TimeFixtures::t0() + chrono::Duration::microseconds(7_999);
    server.push_change(NodeAddress::string(2, "temp"), 1.0f32, at);
    connector.update().await;

    assert_eq!(registry.posted("/events")[0]["timestamp"], "2024-03-01T12:00:00.007Z");
}

#[test]
fn test_status_code_classification() {
    assert!(StatusCode::GOOD.is_good());
    assert!(StatusCode::BAD_TIMEOUT.is_bad());
    assert!(!StatusCode::BAD_NOTHING_TO_DO.is_good());
    assert_eq!(StatusCode::from_bits(StatusCode::BAD_SHUTDOWN.bits()), StatusCode::BAD_SHUTDOWN);
}

#[test]
fn test_status_carried_by_gateway_errors() {
    let err = GatewayError::connect(PLC_ENDPOINT, StatusCode::BAD_CONNECTION_REJECTED);
    assert_eq!(err.status(), StatusCode::BAD_CONNECTION_REJECTED);
    assert!(err.to_string().contains(PLC_ENDPOINT));
}

#[test]
fn test_address_text_form() {
    let address: NodeAddress = "ns=2;s=Line1/Temp".parse().unwrap();
    assert_eq!(address, NodeAddress::string(2, "Line1/Temp"));
    assert_eq!(address.to_string(), "ns=2;s=Line1/Temp");
}
