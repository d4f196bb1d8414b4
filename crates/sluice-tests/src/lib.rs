// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Sluice Integration Tests
//!
//! Integration tests for the Sluice gateway, plus the scripted collaborators
//! they run against.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Pre-built configurations and timestamps
//!   - `mocks`: A scriptable Source Protocol server and a recording
//!     registry transport
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p sluice-tests
//!
//! cargo test -p sluice-tests --test integration_connector
//! cargo test -p sluice-tests --test integration_orchestrator
//! cargo test -p sluice-tests --test integration_config
//! cargo test -p sluice-tests --test integration_core
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use sluice_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = MockServer::new()
//!         .with_children(NodeAddress::string(2, "Line1"), ["Temp", "Pressure"]);
//!     let registry = RecordingTransport::new();
//!     // ... build a ServerConnector over server.protocol() and registry.sync()
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::mocks::*;
    pub use sluice_core::NodeAddress;
}
