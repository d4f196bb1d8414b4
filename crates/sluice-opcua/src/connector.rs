// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server connector.
//!
//! A [`ServerConnector`] owns one protocol session end to end:
//!
//! ```text
//! create ──► apply_subscriptions ──► update (repeated) ──► destroy
//!   │              │                       │                  │
//!   │ connect      │ SubscriptionTree      │ pump, normalize  │ release items,
//!   │ upsert       │ upsert descriptors    │ post events      │ disconnect
//!   ▼ server       ▼                       ▼                  ▼
//! ```
//!
//! Descriptors are upserted before the first `update`, so the registry
//! always knows a server and its subscriptions before it receives events
//! for them.

use chrono::Utc;
use sluice_config::{ServerConfig, SubscriptionConfig};
use sluice_core::{normalize, GatewayError, ItemContext, StatusCode};
use sluice_registry::{RegistrySync, ServerDescriptor, SyncOutcome};
use tracing::{debug, info, trace, warn};

use crate::protocol::{ConnectionHandle, DataChange, SourceProtocol};
use crate::tree::{MonitoredItem, SubscriptionTree};

/// One live Source Protocol connection and its monitored items.
pub struct ServerConnector {
    config: ServerConfig,
    protocol: Box<dyn SourceProtocol>,
    registry: RegistrySync,
    connection: Option<ConnectionHandle>,
    tree: SubscriptionTree,
    pending: Vec<DataChange>,
    status: StatusCode,
}

impl ServerConnector {
    /// Connects to the configured endpoint and upserts the server descriptor.
    ///
    /// An empty user name selects an anonymous session. A failed connect
    /// returns [`GatewayError::Connect`] and nothing is sent to the registry.
    pub async fn create(
        config: ServerConfig,
        mut protocol: Box<dyn SourceProtocol>,
        registry: RegistrySync,
        max_browse_depth: u32,
    ) -> Result<Self, GatewayError> {
        let connected = match config.credentials() {
            Some((username, password)) => {
                protocol
                    .connect_with_credentials(&config.endpoint, username, password)
                    .await
            }
            None => protocol.connect(&config.endpoint).await,
        };

        let connection = match connected {
            Ok(conn) => conn,
            Err(err) => {
                warn!(
                    server_id = config.server_id,
                    endpoint = %config.endpoint,
                    status = %err.status(),
                    "Connect failed"
                );
                return Err(GatewayError::connect(&config.endpoint, err.status()));
            }
        };

        info!(
            server_id = config.server_id,
            endpoint = %config.endpoint,
            protocol = protocol.display_name(),
            anonymous = config.credentials().is_none(),
            "Connected"
        );

        let outcome = registry.upsert_server(&ServerDescriptor::from(&config)).await;
        if outcome == SyncOutcome::Failed {
            warn!(server_id = config.server_id, "Server descriptor was not registered");
        }

        let tree = SubscriptionTree::new(config.server_id, config.subscription_params(), max_browse_depth);

        Ok(Self {
            config,
            protocol,
            registry,
            connection: Some(connection),
            tree,
            pending: Vec::new(),
            status: StatusCode::GOOD,
        })
    }

    /// Materializes every configured subscription, in order.
    ///
    /// A failed subscription sets the connector status and the remaining
    /// entries still run.
    pub async fn apply_subscriptions(&mut self) -> StatusCode {
        let Some(conn) = self.connection else {
            return self.status;
        };

        for entry in &self.config.subscriptions {
            for identifier in entry.identifiers() {
                let failure = if entry.is_folder {
                    match self
                        .tree
                        .subscribe_to_all(self.protocol.as_mut(), conn, &self.registry, entry.ns_index, identifier)
                        .await
                    {
                        Ok(report) => report.first_failure,
                        Err(err) => Some(err.status()),
                    }
                } else {
                    self.tree
                        .subscribe_to_one(self.protocol.as_mut(), conn, &self.registry, entry.ns_index, identifier)
                        .await
                        .err()
                        .map(|err| err.status())
                };

                if let Some(status) = failure {
                    warn!(
                        server_id = self.config.server_id,
                        namespace_index = entry.ns_index,
                        identifier,
                        is_folder = entry.is_folder,
                        %status,
                        "Subscription failed"
                    );
                    self.status = status;
                }
            }
        }

        info!(
            server_id = self.config.server_id,
            items = self.tree.items().len(),
            status = %self.status,
            "Subscriptions applied"
        );
        self.status
    }

    /// Runs one keep-alive/publish step and forwards buffered changes.
    ///
    /// Returns the connector status. A non-good pump status is kept until
    /// the connector is destroyed.
    pub async fn update(&mut self) -> StatusCode {
        let Some(conn) = self.connection else {
            return self.status;
        };

        let pending = &mut self.pending;
        let pumped = self
            .protocol
            .pump(conn, &mut |change: DataChange| pending.push(change))
            .await;

        if !pumped.is_good() && self.status.is_good() {
            warn!(server_id = self.config.server_id, status = %pumped, "Connection degraded");
            self.status = pumped;
        }

        // Drain without giving up the buffer's capacity.
        let mut changes = std::mem::take(&mut self.pending);
        for change in changes.drain(..) {
            self.forward(change).await;
        }
        self.pending = changes;

        self.status
    }

    /// Releases all monitored items, then the connection. Idempotent.
    pub async fn destroy(&mut self) {
        let Some(conn) = self.connection.take() else {
            return;
        };

        self.tree.release(self.protocol.as_mut(), conn).await;
        if let Err(err) = self.protocol.disconnect(conn).await {
            warn!(server_id = self.config.server_id, error = %err, "Disconnect failed");
        }
        self.pending.clear();

        info!(
            server_id = self.config.server_id,
            endpoint = %self.config.endpoint,
            "Disconnected"
        );
    }

    /// Current status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Configured server id.
    pub fn server_id(&self) -> i32 {
        self.config.server_id
    }

    /// Endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Configured subscriptions.
    pub fn subscriptions(&self) -> &[SubscriptionConfig] {
        &self.config.subscriptions
    }

    /// Monitored items created so far.
    pub fn monitored_items(&self) -> &[MonitoredItem] {
        self.tree.items()
    }

    /// Returns `true` until [`destroy`](Self::destroy) runs.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn forward(&self, change: DataChange) {
        let Some(item) = self.tree.lookup(change.item) else {
            trace!(server_id = self.config.server_id, item = %change.item, "Change for unknown item");
            return;
        };

        let timestamp = change.timestamp_or(Utc::now());
        let ctx = ItemContext::new(item.server_id, item.namespace_index, &item.identifier);
        let event = normalize(&change.value, timestamp, ctx);

        match event.type_tag {
            Some(tag) => debug!(
                server_id = item.server_id,
                namespace_index = item.namespace_index,
                identifier = %item.identifier,
                type_tag = %tag,
                value = %change.value,
                "Value changed"
            ),
            None => {
                let err = GatewayError::unrecognized(&item.identifier, change.value.type_name());
                debug!(server_id = item.server_id, error = %err, "Value dropped");
            }
        }

        self.registry.post_event(&event).await;
    }
}

impl std::fmt::Debug for ServerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnector")
            .field("server_id", &self.config.server_id)
            .field("endpoint", &self.config.endpoint)
            .field("connected", &self.connection.is_some())
            .field("items", &self.tree.items().len())
            .field("status", &self.status)
            .finish()
    }
}
