// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Registry synchronization.
//!
//! [`RegistrySync`] upserts descriptors and posts value-change events. The
//! upsert is a read-then-write sequence:
//!
//! ```text
//! GET <lookup path>
//!   ├── empty (null, {}, [], no body, 404) ──► POST <collection>
//!   └── anything else                      ──► PUT  <collection>
//! ```
//!
//! The sequence is not atomic. It is only correct with a single writer per
//! natural key; a conditional-write scheme would go here.
//!
//! Transport failures never reach the caller. They are logged and reported
//! as [`SyncOutcome::Failed`]; nothing is queued or retried.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sluice_core::{GatewayError, ValueChangeEvent};
use tracing::{debug, warn};

use crate::descriptor::{ServerDescriptor, SubscriptionDescriptor, SERVERS_PATH, SUBSCRIPTIONS_PATH};
use crate::transport::{is_empty_document, RegistryTransport};

/// Result of a registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The record was absent and has been created.
    Created,
    /// The record existed and has been replaced.
    Updated,
    /// The event has been posted.
    Posted,
    /// The event carried no payload and was not sent.
    Dropped,
    /// A transport call failed; the operation is lost.
    Failed,
}

impl SyncOutcome {
    /// Returns `true` if the registry accepted the write.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Posted)
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Posted => "posted",
            Self::Dropped => "dropped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Descriptor upsert and event posting against one registry transport.
#[derive(Clone)]
pub struct RegistrySync {
    transport: Arc<dyn RegistryTransport>,
    events_path: String,
}

impl RegistrySync {
    /// Creates a sync over `transport`, posting events to `/events`.
    pub fn new(transport: Arc<dyn RegistryTransport>) -> Self {
        Self {
            transport,
            events_path: sluice_config::schema::DEFAULT_EVENTS_PATH.to_string(),
        }
    }

    /// Sets the collection receiving value-change events.
    pub fn with_events_path(mut self, path: impl Into<String>) -> Self {
        self.events_path = path.into();
        self
    }

    /// Returns the event collection path.
    pub fn events_path(&self) -> &str {
        &self.events_path
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &Arc<dyn RegistryTransport> {
        &self.transport
    }

    /// Upserts a server descriptor.
    pub async fn upsert_server(&self, descriptor: &ServerDescriptor) -> SyncOutcome {
        self.upsert(&descriptor.lookup_path(), SERVERS_PATH, descriptor)
            .await
    }

    /// Upserts a subscription descriptor.
    pub async fn upsert_subscription(&self, descriptor: &SubscriptionDescriptor) -> SyncOutcome {
        self.upsert(&descriptor.lookup_path(), SUBSCRIPTIONS_PATH, descriptor)
            .await
    }

    /// Posts a value-change event if it carries a payload.
    pub async fn post_event(&self, event: &ValueChangeEvent) -> SyncOutcome {
        if !event.has_payload() {
            debug!(
                server_id = event.server_id,
                namespace_index = event.namespace_index,
                identifier = %event.identifier,
                "Dropping event without payload"
            );
            return SyncOutcome::Dropped;
        }

        let body = match serde_json::to_value(event) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to encode event");
                return SyncOutcome::Failed;
            }
        };

        match self.transport.post(&self.events_path, &body).await {
            Ok(_) => SyncOutcome::Posted,
            Err(e) => {
                let err = GatewayError::from(e);
                warn!(error = %err, identifier = %event.identifier, "Event lost");
                SyncOutcome::Failed
            }
        }
    }

    /// Fetches every registered server, or `None` if the listing failed.
    pub async fn list_servers(&self) -> Option<Vec<Value>> {
        self.list(SERVERS_PATH).await
    }

    /// Fetches every registered subscription, or `None` if the listing failed.
    pub async fn list_subscriptions(&self) -> Option<Vec<Value>> {
        self.list(SUBSCRIPTIONS_PATH).await
    }

    /// Releases the transport.
    pub async fn release(&self) {
        if let Err(e) = self.transport.close().await {
            warn!(error = %e, "Failed to release registry transport");
        }
    }

    async fn upsert<T: Serialize>(&self, lookup: &str, collection: &str, descriptor: &T) -> SyncOutcome {
        let body = match serde_json::to_value(descriptor) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, path = collection, "Failed to encode descriptor");
                return SyncOutcome::Failed;
            }
        };

        let existing = match self.transport.get(lookup).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %GatewayError::from(e), "Descriptor lookup failed, skipping upsert");
                return SyncOutcome::Failed;
            }
        };

        let (result, outcome) = if is_empty_document(&existing) {
            (self.transport.post(collection, &body).await, SyncOutcome::Created)
        } else {
            (self.transport.put(collection, &body).await, SyncOutcome::Updated)
        };

        match result {
            Ok(_) => {
                debug!(path = lookup, %outcome, "Descriptor synchronized");
                outcome
            }
            Err(e) => {
                warn!(error = %GatewayError::from(e), "Descriptor write failed");
                SyncOutcome::Failed
            }
        }
    }

    async fn list(&self, path: &str) -> Option<Vec<Value>> {
        match self.transport.get(path).await {
            Ok(Value::Array(items)) => Some(items),
            Ok(doc) if is_empty_document(&doc) => Some(Vec::new()),
            Ok(_) => {
                warn!(path, "Registry listing is not an array");
                None
            }
            Err(e) => {
                warn!(error = %GatewayError::from(e), "Registry listing failed");
                None
            }
        }
    }
}

impl fmt::Debug for RegistrySync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySync")
            .field("transport", &self.transport.name())
            .field("events_path", &self.events_path)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
