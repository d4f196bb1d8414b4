// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway orchestration.
//!
//! The [`GatewayOrchestrator`] owns every [`ServerConnector`] and is the only
//! driver of progress. One task runs the loop below; connectors are polled
//! in creation order and each call completes before the next starts.
//!
//! ```text
//! start ──► reconcile (optional, informational)
//!   │
//!   ├─ for each server: create connector ─► apply subscriptions
//!   │      connect failure: record, or abort under quit-on-error
//!   ▼
//! run:  poll_once ─► sleep(poll interval) ─► poll_once ─► ...
//!   │      quit-on-error: stop on first bad status or empty set
//!   ▼
//! shutdown: destroy connectors in reverse order, release registry
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sluice_config::GatewayConfig;
use sluice_core::{GatewayError, StatusCode};
use sluice_opcua::{ProtocolFactory, ServerConnector};
use sluice_registry::RegistrySync;
use tracing::{error, info, warn};

use crate::shutdown::ShutdownToken;

// =============================================================================
// Types
// =============================================================================

/// Result of one poll pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keep polling.
    Continue,
    /// Stop with the given status.
    Stop(StatusCode),
}

/// A configured server that never became active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedConnector {
    /// Server id.
    pub server_id: i32,
    /// Endpoint URL.
    pub endpoint: String,
    /// Native status of the failed connect.
    pub status: StatusCode,
}

/// Difference between the configuration and what the registry already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Configured server ids the registry does not know.
    pub missing_servers: Vec<i32>,
    /// Registered server ids absent from the configuration.
    pub stale_servers: Vec<i32>,
    /// Number of subscription descriptors in the registry.
    pub known_subscriptions: usize,
}

impl ReconciliationReport {
    /// Returns `true` if configuration and registry agree on servers.
    pub fn is_in_sync(&self) -> bool {
        self.missing_servers.is_empty() && self.stale_servers.is_empty()
    }
}

// =============================================================================
// GatewayOrchestrator
// =============================================================================

/// Owns the connectors and drives the poll loop.
pub struct GatewayOrchestrator {
    config: GatewayConfig,
    factory: Arc<dyn ProtocolFactory>,
    registry: RegistrySync,
    connectors: Vec<ServerConnector>,
    failed: Vec<FailedConnector>,
}

impl GatewayOrchestrator {
    /// Creates an orchestrator. Nothing connects until [`start`](Self::start).
    pub fn new(config: GatewayConfig, factory: Arc<dyn ProtocolFactory>, registry: RegistrySync) -> Self {
        Self {
            config,
            factory,
            registry,
            connectors: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Creates a connector per configured server and applies its subscriptions.
    ///
    /// Under quit-on-error the first connect failure aborts startup: later
    /// servers are never attempted and the error is returned. Otherwise the
    /// failure is recorded and startup continues.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        if self.config.reconcile_on_start {
            let report = self.reconcile().await;
            info!(
                missing = ?report.missing_servers,
                stale = ?report.stale_servers,
                subscriptions = report.known_subscriptions,
                "Registry reconciliation"
            );
        }

        let servers = self.config.servers.clone();
        for server in servers {
            let server_id = server.server_id;
            let endpoint = server.endpoint.clone();
            let protocol = self.factory.create(&server);

            match ServerConnector::create(server, protocol, self.registry.clone(), self.config.max_browse_depth)
                .await
            {
                Ok(mut connector) => {
                    connector.apply_subscriptions().await;
                    self.connectors.push(connector);
                }
                Err(err) => {
                    error!(
                        server_id,
                        endpoint = %endpoint,
                        category = err.category(),
                        error = %err,
                        "Connector failed to start"
                    );
                    self.failed.push(FailedConnector {
                        server_id,
                        endpoint,
                        status: err.status(),
                    });
                    if self.config.quit_on_error {
                        return Err(err);
                    }
                }
            }
        }

        info!(
            active = self.connectors.len(),
            failed = self.failed.len(),
            "Gateway started"
        );
        Ok(())
    }

    /// Updates every connector once, in creation order.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let quit_on_error = self.config.quit_on_error;

        if quit_on_error && self.connectors.is_empty() {
            warn!("No active connectors");
            return PollOutcome::Stop(StatusCode::BAD_NOTHING_TO_DO);
        }

        for connector in &mut self.connectors {
            let status = connector.update().await;
            if quit_on_error && !status.is_good() {
                error!(server_id = connector.server_id(), %status, "Connector reported bad status");
                return PollOutcome::Stop(status);
            }
        }

        PollOutcome::Continue
    }

    /// Polls until a stop outcome or until `token` is cancelled.
    ///
    /// Returns the stop status, or the aggregate status on cancellation.
    pub async fn run(&mut self, token: &ShutdownToken) -> StatusCode {
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if token.is_shutdown_requested() {
                return self.status();
            }

            if let PollOutcome::Stop(status) = self.poll_once().await {
                return status;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = token.cancelled() => {}
            }
        }
    }

    /// Destroys connectors in reverse creation order, then releases the registry.
    pub async fn shutdown(&mut self) {
        while let Some(mut connector) = self.connectors.pop() {
            connector.destroy().await;
        }
        self.registry.release().await;
        info!("Gateway stopped");
    }

    /// Compares configured servers with the registry's listings.
    ///
    /// Issues one `GET /servers` and one `GET /subscriptions`. If either
    /// listing fails the report is empty.
    pub async fn reconcile(&self) -> ReconciliationReport {
        let servers = self.registry.list_servers().await;
        let subscriptions = self.registry.list_subscriptions().await;

        let (Some(servers), Some(subscriptions)) = (servers, subscriptions) else {
            return ReconciliationReport::default();
        };

        let registered: Vec<i32> = servers.iter().filter_map(server_id_of).collect();
        let registered_set: HashSet<i32> = registered.iter().copied().collect();
        let configured: HashSet<i32> = self.config.servers.iter().map(|s| s.server_id).collect();

        ReconciliationReport {
            missing_servers: self
                .config
                .servers
                .iter()
                .map(|s| s.server_id)
                .filter(|id| !registered_set.contains(id))
                .collect(),
            stale_servers: registered
                .into_iter()
                .filter(|id| !configured.contains(id))
                .collect(),
            known_subscriptions: subscriptions.len(),
        }
    }

    /// First non-good connector status, else good.
    pub fn status(&self) -> StatusCode {
        self.connectors
            .iter()
            .map(ServerConnector::status)
            .find(|status| !status.is_good())
            .unwrap_or(StatusCode::GOOD)
    }

    /// Servers that failed to connect during [`start`](Self::start).
    pub fn failed_connectors(&self) -> &[FailedConnector] {
        &self.failed
    }

    /// Active connectors in creation order.
    pub fn connectors(&self) -> &[ServerConnector] {
        &self.connectors
    }

    /// Configuration in use.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

fn server_id_of(doc: &Value) -> Option<i32> {
    doc.get("serverId")
        .and_then(Value::as_i64)
        .and_then(|id| i32::try_from(id).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sluice_config::{ServerConfig, SubscriptionParams};
    use sluice_core::NodeAddress;
    use sluice_opcua::{
        ChildReference, ConnectionHandle, DataChange, ItemHandle, ProtocolError, ProtocolResult, SourceProtocol,
        SubscriptionHandle,
    };
    use sluice_registry::{RegistryResult, RegistryTransport};
    use std::sync::Mutex;

    struct Listing {
        servers: Value,
        subscriptions: Value,
        gets: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RegistryTransport for Listing {
        async fn get(&self, path: &str) -> RegistryResult<Value> {
            self.gets.lock().unwrap().push(path.to_string());
            Ok(match path {
                "/servers" => self.servers.clone(),
                "/subscriptions" => self.subscriptions.clone(),
                _ => Value::Null,
            })
        }

        async fn post(&self, _path: &str, _body: &Value) -> RegistryResult<Value> {
            Ok(Value::Null)
        }

        async fn put(&self, _path: &str, _body: &Value) -> RegistryResult<Value> {
            Ok(Value::Null)
        }
    }

    /// Connects unless the endpoint says otherwise; never produces changes.
    struct Quiet {
        status: StatusCode,
    }

    #[async_trait]
    impl SourceProtocol for Quiet {
        async fn connect(&mut self, endpoint: &str) -> ProtocolResult<ConnectionHandle> {
            if endpoint == "down" {
                return Err(ProtocolError::connect(endpoint, StatusCode::BAD_TIMEOUT));
            }
            Ok(ConnectionHandle(1))
        }

        async fn connect_with_credentials(
            &mut self,
            endpoint: &str,
            _username: &str,
            _password: &str,
        ) -> ProtocolResult<ConnectionHandle> {
            self.connect(endpoint).await
        }

        async fn disconnect(&mut self, _conn: ConnectionHandle) -> ProtocolResult<()> {
            Ok(())
        }

        async fn create_subscription(
            &mut self,
            _conn: ConnectionHandle,
            _params: &SubscriptionParams,
        ) -> ProtocolResult<SubscriptionHandle> {
            Ok(SubscriptionHandle(1))
        }

        async fn remove_subscription(
            &mut self,
            _conn: ConnectionHandle,
            _sub: SubscriptionHandle,
        ) -> ProtocolResult<()> {
            Ok(())
        }

        async fn add_monitored_item(
            &mut self,
            _conn: ConnectionHandle,
            _sub: SubscriptionHandle,
            _address: &NodeAddress,
        ) -> ProtocolResult<ItemHandle> {
            Ok(ItemHandle(1))
        }

        async fn remove_monitored_item(
            &mut self,
            _conn: ConnectionHandle,
            _sub: SubscriptionHandle,
            _item: ItemHandle,
        ) -> ProtocolResult<()> {
            Ok(())
        }

        async fn for_each_child(
            &mut self,
            _conn: ConnectionHandle,
            _address: &NodeAddress,
            _visitor: &mut (dyn FnMut(ChildReference) + Send),
        ) -> ProtocolResult<()> {
            Ok(())
        }

        async fn pump(
            &mut self,
            _conn: ConnectionHandle,
            _on_change: &mut (dyn FnMut(DataChange) + Send),
        ) -> StatusCode {
            self.status
        }
    }

    fn quiet_factory(status: StatusCode) -> Arc<dyn ProtocolFactory> {
        Arc::new(move |_: &ServerConfig| -> Box<dyn SourceProtocol> { Box::new(Quiet { status }) })
    }

    fn registry(servers: Value, subscriptions: Value) -> (RegistrySync, Arc<Listing>) {
        let transport = Arc::new(Listing {
            servers,
            subscriptions,
            gets: Mutex::new(Vec::new()),
        });
        (RegistrySync::new(transport.clone()), transport)
    }

    fn config(endpoints: &[&str], quit_on_error: bool) -> GatewayConfig {
        GatewayConfig {
            quit_on_error,
            reconcile_on_start: false,
            servers: endpoints
                .iter()
                .enumerate()
                .map(|(i, e)| ServerConfig::new(i as i32 + 1, *e))
                .collect(),
            ..GatewayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_reconcile() {
        let (registry, transport) = registry(
            serde_json::json!([{"serverId": 1}, {"serverId": 7}, {"name": "no id"}]),
            serde_json::json!([{}, {}, {}]),
        );
        let orchestrator = GatewayOrchestrator::new(
            config(&["a", "b"], false),
            quiet_factory(StatusCode::GOOD),
            registry,
        );

        let report = orchestrator.reconcile().await;

        assert_eq!(report.missing_servers, vec![2]);
        assert_eq!(report.stale_servers, vec![7]);
        assert_eq!(report.known_subscriptions, 3);
        assert!(!report.is_in_sync());
        assert_eq!(*transport.gets.lock().unwrap(), vec!["/servers", "/subscriptions"]);
    }

    #[tokio::test]
    async fn test_reconcile_malformed_listing() {
        let (registry, _) = registry(serde_json::json!({"unexpected": true}), serde_json::json!([]));
        let orchestrator = GatewayOrchestrator::new(
            config(&["a"], false),
            quiet_factory(StatusCode::GOOD),
            registry,
        );

        assert_eq!(orchestrator.reconcile().await, ReconciliationReport::default());
    }

    #[tokio::test]
    async fn test_degraded_start_keeps_others() {
        let (registry, _) = registry(Value::Null, Value::Null);
        let mut orchestrator = GatewayOrchestrator::new(
            config(&["down", "up"], false),
            quiet_factory(StatusCode::GOOD),
            registry,
        );

        orchestrator.start().await.unwrap();

        assert_eq!(orchestrator.connectors().len(), 1);
        assert_eq!(orchestrator.connectors()[0].server_id(), 2);
        assert_eq!(
            orchestrator.failed_connectors(),
            &[FailedConnector {
                server_id: 1,
                endpoint: "down".into(),
                status: StatusCode::BAD_TIMEOUT,
            }]
        );
        assert_eq!(orchestrator.poll_once().await, PollOutcome::Continue);
        assert!(orchestrator.status().is_good());
    }

    #[tokio::test]
    async fn test_quit_on_error_stops_on_bad_status() {
        let (registry, _) = registry(Value::Null, Value::Null);
        let mut orchestrator = GatewayOrchestrator::new(
            config(&["up"], true),
            quiet_factory(StatusCode::BAD_CONNECTION_CLOSED),
            registry,
        );
        orchestrator.start().await.unwrap();

        assert_eq!(
            orchestrator.poll_once().await,
            PollOutcome::Stop(StatusCode::BAD_CONNECTION_CLOSED)
        );
        assert_eq!(orchestrator.status(), StatusCode::BAD_CONNECTION_CLOSED);
    }

    #[tokio::test]
    async fn test_quit_on_error_stops_on_empty_set() {
        let (registry, _) = registry(Value::Null, Value::Null);
        let mut orchestrator =
            GatewayOrchestrator::new(config(&[], true), quiet_factory(StatusCode::GOOD), registry);
        orchestrator.start().await.unwrap();

        assert_eq!(
            orchestrator.poll_once().await,
            PollOutcome::Stop(StatusCode::BAD_NOTHING_TO_DO)
        );
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let (registry, _) = registry(Value::Null, Value::Null);
        let mut orchestrator = GatewayOrchestrator::new(
            config(&["up"], false),
            quiet_factory(StatusCode::GOOD),
            registry,
        );
        orchestrator.start().await.unwrap();

        let coordinator = crate::shutdown::ShutdownCoordinator::new();
        let token = coordinator.token();
        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.initiate_shutdown();
        });

        let status = tokio::time::timeout(Duration::from_secs(2), orchestrator.run(&token))
            .await
            .expect("run should stop after cancellation");
        assert!(status.is_good());

        orchestrator.shutdown().await;
        assert!(orchestrator.connectors().is_empty());
    }
}
