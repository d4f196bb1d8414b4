// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sluice-opcua
//!
//! Source Protocol side of the Sluice gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ServerConnector                      │
//! │  connect ─ apply_subscriptions ─ update ─ destroy       │
//! │                      │                │                 │
//! │           ┌──────────▼────────┐   normalize             │
//! │           │ SubscriptionTree  │       │                 │
//! │           │ MonitoredItem[..] │       ▼                 │
//! │           └──────────┬────────┘  RegistrySync           │
//! └──────────────────────┼──────────────────────────────────┘
//!                        │ Box<dyn SourceProtocol>
//!              ┌─────────▼─────────┐
//!              │  OpcUaProtocol    │  (feature `real-transport`)
//!              │  or a test double │
//!              └───────────────────┘
//! ```
//!
//! ## Features
//!
//! - `real-transport`: enables [`OpcUaProtocol`], backed by the `opcua`
//!   crate. Without it the crate only carries the collaborator seam, so the
//!   gateway can be exercised against scripted protocols.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connector;
pub mod error;
pub mod protocol;
pub mod tree;

#[cfg(feature = "real-transport")]
pub mod real_transport;

pub use connector::ServerConnector;
pub use error::{ProtocolError, ProtocolResult};
pub use protocol::{
    ChildReference, ConnectionHandle, DataChange, ItemHandle, ProtocolFactory, SourceProtocol, SubscriptionHandle,
};
pub use tree::{MonitoredItem, SubscriptionTree, WalkReport};

#[cfg(feature = "real-transport")]
pub use real_transport::{OpcUaProtocol, OpcUaProtocolFactory};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
