// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription tree.
//!
//! Materializes configured subscriptions into monitored items. A single
//! node becomes one item; a folder becomes one item per qualifying
//! descendant.
//!
//! ```text
//! subscribe_to_all(ns=2;s=Line1)
//!   Line1
//!   ├── ns=2;s=Temp        forward, string  ──► item
//!   ├── ns=0;i=61          numeric          ──► skipped
//!   ├── ns=2;s=Plant       inverse          ──► skipped
//!   └── ns=2;s=Pumps       forward, string  ──► item, then its children
//!       └── ns=2;s=P1      forward, string  ──► item
//! ```
//!
//! Siblings are subscribed in the order the protocol yields them; the
//! subtree of each sibling is explored after the whole level has been
//! subscribed. Nothing is deduplicated and there is no visited set: an
//! address yielded twice produces two items, and a reference cycle is only
//! stopped by `max_depth`.

use std::collections::HashMap;

use sluice_config::SubscriptionParams;
use sluice_core::{NodeAddress, StatusCode};
use sluice_registry::{RegistrySync, SubscriptionDescriptor};
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{ChildReference, ConnectionHandle, ItemHandle, SourceProtocol, SubscriptionHandle};

// =============================================================================
// MonitoredItem
// =============================================================================

/// Gateway-side record of one monitored data point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredItem {
    /// Owning server.
    pub server_id: i32,
    /// Namespace index.
    pub namespace_index: u16,
    /// Node identifier.
    pub identifier: String,
    /// Protocol handle.
    pub item_handle: ItemHandle,
    /// Whether the item was reached through a folder walk.
    pub is_folder: bool,
}

impl MonitoredItem {
    /// Node address of the item.
    pub fn address(&self) -> NodeAddress {
        NodeAddress::string(self.namespace_index, self.identifier.clone())
    }
}

/// Counters from one folder walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    /// Items created.
    pub created: usize,
    /// Children skipped as non-string or inverse references.
    pub skipped: usize,
    /// Status of the first item or browse failure below the root.
    pub first_failure: Option<StatusCode>,
}

impl WalkReport {
    fn record_failure(&mut self, status: StatusCode) {
        if self.first_failure.is_none() {
            self.first_failure = Some(status);
        }
    }
}

// =============================================================================
// SubscriptionTree
// =============================================================================

/// Monitored items of one connector under a single protocol subscription.
#[derive(Debug)]
pub struct SubscriptionTree {
    server_id: i32,
    params: SubscriptionParams,
    max_depth: u32,
    subscription: Option<SubscriptionHandle>,
    items: Vec<MonitoredItem>,
    index: HashMap<ItemHandle, usize>,
}

impl SubscriptionTree {
    /// Creates an empty tree. `max_depth` of 0 leaves folder walks unbounded.
    pub fn new(server_id: i32, params: SubscriptionParams, max_depth: u32) -> Self {
        Self {
            server_id,
            params,
            max_depth,
            subscription: None,
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Items in creation order.
    pub fn items(&self) -> &[MonitoredItem] {
        &self.items
    }

    /// Looks an item up by its protocol handle.
    pub fn lookup(&self, handle: ItemHandle) -> Option<&MonitoredItem> {
        self.index.get(&handle).map(|&i| &self.items[i])
    }

    /// Protocol subscription, once the first item has been created.
    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscription
    }

    /// Monitors exactly one node and upserts its descriptor.
    pub async fn subscribe_to_one(
        &mut self,
        protocol: &mut dyn SourceProtocol,
        conn: ConnectionHandle,
        registry: &RegistrySync,
        namespace_index: u16,
        identifier: &str,
    ) -> ProtocolResult<ItemHandle> {
        self.monitor(protocol, conn, registry, namespace_index, identifier, false)
            .await
    }

    /// Monitors every qualifying descendant of a folder node.
    ///
    /// Fails only when the folder itself cannot be browsed. Failures further
    /// down are logged, counted in the report and do not stop the walk.
    pub async fn subscribe_to_all(
        &mut self,
        protocol: &mut dyn SourceProtocol,
        conn: ConnectionHandle,
        registry: &RegistrySync,
        namespace_index: u16,
        identifier: &str,
    ) -> ProtocolResult<WalkReport> {
        let root = NodeAddress::string(namespace_index, identifier);
        let mut report = WalkReport::default();
        let mut pending: Vec<(NodeAddress, u32)> = vec![(root.clone(), 0)];
        let mut children: Vec<ChildReference> = Vec::new();

        while let Some((parent, depth)) = pending.pop() {
            children.clear();
            let mut collect = |child: ChildReference| children.push(child);
            if let Err(err) = protocol.for_each_child(conn, &parent, &mut collect).await {
                if parent == root {
                    return Err(err);
                }
                warn!(server_id = self.server_id, node = %parent, error = %err, "Browse failed");
                report.record_failure(err.status());
                continue;
            }

            let mut descend = Vec::new();
            for child in children.drain(..) {
                if !child.is_forward {
                    report.skipped += 1;
                    continue;
                }
                let Some(child_identifier) = child.address.as_string() else {
                    report.skipped += 1;
                    continue;
                };

                match self
                    .monitor(
                        protocol,
                        conn,
                        registry,
                        child.address.namespace_index,
                        child_identifier,
                        true,
                    )
                    .await
                {
                    Ok(_) => report.created += 1,
                    Err(err) => report.record_failure(err.status()),
                }

                if self.max_depth == 0 || depth + 1 < self.max_depth {
                    descend.push((child.address, depth + 1));
                }
            }
            pending.extend(descend.into_iter().rev());
        }

        info!(
            server_id = self.server_id,
            folder = %root,
            created = report.created,
            skipped = report.skipped,
            "Folder subscribed"
        );
        Ok(report)
    }

    /// Removes every item, then the subscription.
    pub async fn release(&mut self, protocol: &mut dyn SourceProtocol, conn: ConnectionHandle) {
        let Some(sub) = self.subscription.take() else {
            self.items.clear();
            self.index.clear();
            return;
        };

        for item in self.items.drain(..) {
            if let Err(err) = protocol.remove_monitored_item(conn, sub, item.item_handle).await {
                warn!(
                    server_id = self.server_id,
                    node = %item.address(),
                    error = %err,
                    "Failed to remove monitored item"
                );
            }
        }
        self.index.clear();

        match protocol.remove_subscription(conn, sub).await {
            Ok(()) => debug!(server_id = self.server_id, subscription = %sub, "Subscription removed"),
            Err(err) => warn!(server_id = self.server_id, error = %err, "Failed to remove subscription"),
        }
    }

    async fn monitor(
        &mut self,
        protocol: &mut dyn SourceProtocol,
        conn: ConnectionHandle,
        registry: &RegistrySync,
        namespace_index: u16,
        identifier: &str,
        is_folder: bool,
    ) -> ProtocolResult<ItemHandle> {
        let sub = self.ensure_subscription(protocol, conn).await?;
        let address = NodeAddress::string(namespace_index, identifier);

        let handle = match protocol.add_monitored_item(conn, sub, &address).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(server_id = self.server_id, node = %address, error = %err, "Monitored item rejected");
                return Err(err);
            }
        };

        self.index.insert(handle, self.items.len());
        self.items.push(MonitoredItem {
            server_id: self.server_id,
            namespace_index,
            identifier: identifier.to_string(),
            item_handle: handle,
            is_folder,
        });
        debug!(server_id = self.server_id, node = %address, item = %handle, "Monitored item created");

        let descriptor = SubscriptionDescriptor::new(self.server_id, namespace_index, identifier, is_folder);
        registry.upsert_subscription(&descriptor).await;

        Ok(handle)
    }

    async fn ensure_subscription(
        &mut self,
        protocol: &mut dyn SourceProtocol,
        conn: ConnectionHandle,
    ) -> ProtocolResult<SubscriptionHandle> {
        if let Some(sub) = self.subscription {
            return Ok(sub);
        }

        let sub = protocol
            .create_subscription(conn, &self.params)
            .await
            .map_err(|err| {
                warn!(server_id = self.server_id, error = %err, "Subscription rejected");
                ProtocolError::subscription(err.status())
            })?;
        info!(
            server_id = self.server_id,
            subscription = %sub,
            interval_ms = self.params.publishing_interval_ms,
            priority = self.params.priority,
            "Subscription created"
        );
        self.subscription = Some(sub);
        Ok(sub)
    }
}
