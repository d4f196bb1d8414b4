// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sluice-core
//!
//! Core abstractions shared by every Sluice crate.
//!
//! - **Status**: OPC UA style 32-bit status codes used for connector health
//! - **Address**: `(namespace, identifier)` node addresses
//! - **Value**: the native, dynamically typed value a protocol delivers
//! - **Event**: the wire-neutral value-change event posted to the registry
//! - **Normalizer**: the closed mapping from native values to tagged events
//! - **Error**: the gateway error taxonomy
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use sluice_core::{normalize, ItemContext, TypeTag, Variant};
//!
//! let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
//! let event = normalize(&Variant::Float(23.5), ts, ItemContext::new(1, 2, "temp"));
//!
//! assert_eq!(event.type_tag, Some(TypeTag::Float));
//! assert_eq!(event.timestamp, "2024-05-01T12:00:00.000Z");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod address;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod status;
pub mod value;

pub use address::{AddressParseError, NodeAddress, NodeIdentifier};
pub use error::{GatewayError, GatewayResult};
pub use event::{format_timestamp, parse_timestamp, TypeTag, ValueChangeEvent, TIMESTAMP_FORMAT};
pub use normalizer::{classify, decode, normalize, ItemContext};
pub use status::StatusCode;
pub use value::Variant;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
