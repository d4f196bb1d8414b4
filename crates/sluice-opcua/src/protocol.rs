// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Source Protocol collaborator.
//!
//! [`SourceProtocol`] is the seam between the gateway and a protocol stack.
//! A connector owns exactly one protocol instance and drives it from a
//! single task, so every method takes `&mut self`.
//!
//! Value changes are never pushed at the gateway. The stack buffers them
//! internally and hands them out only when [`SourceProtocol::pump`] runs:
//!
//! ```text
//! ServerConnector::update()
//!        │
//!        ▼
//! SourceProtocol::pump(conn, on_change)
//!        │  keep-alive / publish
//!        ├──► on_change(DataChange)   (0..n, in delivery order)
//!        ▼
//!    StatusCode
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sluice_config::{ServerConfig, SubscriptionParams};
use sluice_core::{NodeAddress, StatusCode, Variant};

use crate::error::ProtocolResult;

// =============================================================================
// Handles
// =============================================================================

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

handle!(
    /// Live protocol session.
    ConnectionHandle
);
handle!(
    /// Protocol subscription under a connection.
    SubscriptionHandle
);
handle!(
    /// Monitored item under a subscription.
    ItemHandle
);

// =============================================================================
// Notifications
// =============================================================================

/// One reference yielded while enumerating the children of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildReference {
    /// Target node.
    pub address: NodeAddress,
    /// `false` for inverse (parent-pointing) references.
    pub is_forward: bool,
}

impl ChildReference {
    /// Forward reference to `address`.
    pub fn forward(address: NodeAddress) -> Self {
        Self {
            address,
            is_forward: true,
        }
    }

    /// Inverse reference to `address`.
    pub fn inverse(address: NodeAddress) -> Self {
        Self {
            address,
            is_forward: false,
        }
    }
}

/// A value change delivered by [`SourceProtocol::pump`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// Item the change belongs to.
    pub item: ItemHandle,
    /// Native value.
    pub value: Variant,
    /// Time the value was sampled at the source.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Time the server processed the value.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl DataChange {
    /// Creates a change stamped with a source timestamp.
    pub fn new(item: ItemHandle, value: impl Into<Variant>, source_timestamp: DateTime<Utc>) -> Self {
        Self {
            item,
            value: value.into(),
            source_timestamp: Some(source_timestamp),
            server_timestamp: None,
        }
    }

    /// Source timestamp, else server timestamp, else `now`.
    pub fn timestamp_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.source_timestamp
            .or(self.server_timestamp)
            .unwrap_or(now)
    }
}

// =============================================================================
// SourceProtocol
// =============================================================================

/// A protocol stack able to connect, subscribe, browse and pump.
#[async_trait]
pub trait SourceProtocol: Send {
    /// Opens an anonymous session.
    async fn connect(&mut self, endpoint: &str) -> ProtocolResult<ConnectionHandle>;

    /// Opens a session authenticated with user name and password.
    async fn connect_with_credentials(
        &mut self,
        endpoint: &str,
        username: &str,
        password: &str,
    ) -> ProtocolResult<ConnectionHandle>;

    /// Closes the session. Closing an already closed session is a no-op.
    async fn disconnect(&mut self, conn: ConnectionHandle) -> ProtocolResult<()>;

    /// Creates a subscription with the given publish parameters.
    async fn create_subscription(
        &mut self,
        conn: ConnectionHandle,
        params: &SubscriptionParams,
    ) -> ProtocolResult<SubscriptionHandle>;

    /// Deletes a subscription and everything under it.
    async fn remove_subscription(
        &mut self,
        conn: ConnectionHandle,
        sub: SubscriptionHandle,
    ) -> ProtocolResult<()>;

    /// Starts monitoring the value of `address`.
    async fn add_monitored_item(
        &mut self,
        conn: ConnectionHandle,
        sub: SubscriptionHandle,
        address: &NodeAddress,
    ) -> ProtocolResult<ItemHandle>;

    /// Stops monitoring an item.
    async fn remove_monitored_item(
        &mut self,
        conn: ConnectionHandle,
        sub: SubscriptionHandle,
        item: ItemHandle,
    ) -> ProtocolResult<()>;

    /// Calls `visitor` once per hierarchical reference of `address`, in the
    /// order the server returns them.
    async fn for_each_child(
        &mut self,
        conn: ConnectionHandle,
        address: &NodeAddress,
        visitor: &mut (dyn FnMut(ChildReference) + Send),
    ) -> ProtocolResult<()>;

    /// Runs one keep-alive/publish step and dispatches buffered changes.
    async fn pump(
        &mut self,
        conn: ConnectionHandle,
        on_change: &mut (dyn FnMut(DataChange) + Send),
    ) -> StatusCode;

    /// Name used in log lines.
    fn display_name(&self) -> &str {
        "source-protocol"
    }
}

/// Builds one protocol instance per configured server.
pub trait ProtocolFactory: Send + Sync {
    /// Creates an unconnected protocol for `config`.
    fn create(&self, config: &ServerConfig) -> Box<dyn SourceProtocol>;
}

impl<F> ProtocolFactory for F
where
    F: Fn(&ServerConfig) -> Box<dyn SourceProtocol> + Send + Sync,
{
    fn create(&self, config: &ServerConfig) -> Box<dyn SourceProtocol> {
        self(config)
    }
}
