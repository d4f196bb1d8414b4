// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sluice-registry
//!
//! Registry service integration for the Sluice gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────────────┐
//! │  ServerConnector │────►│      RegistrySync      │
//! │  (descriptors,   │     │  upsert / post_event   │
//! │   events)        │     └───────────┬────────────┘
//! └──────────────────┘                 │ Arc<dyn RegistryTransport>
//!                           ┌──────────▼────────────┐
//!                           │ HttpRegistryTransport │──► ExchangeLog
//!                           └──────────┬────────────┘
//!                                      ▼
//!                               Registry Service
//! ```
//!
//! The registry is the only system of record the gateway consults: whether
//! a descriptor exists is always decided by asking it.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod descriptor;
pub mod error;
pub mod http;
pub mod sync;
pub mod transport;

pub use descriptor::{ServerDescriptor, SubscriptionDescriptor, SERVERS_PATH, SUBSCRIPTIONS_PATH};
pub use error::{RegistryError, RegistryResult};
pub use http::{ExchangeLog, HttpRegistryTransport};
pub use sync::{RegistrySync, SyncOutcome};
pub use transport::{is_empty_document, RegistryTransport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
