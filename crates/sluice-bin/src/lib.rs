// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sluice-bin
//!
//! CLI binary for the Sluice OPC UA to REST registry gateway.
//!
//! This crate provides the process around the connectors:
//!
//! - CLI argument parsing with clap
//! - Gateway orchestration and the poll loop
//! - Graceful shutdown handling
//! - Logging initialization
//! - Command implementations (run, validate, version)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        └──────────┘ └────┬─────┘ └──────────┘
//!                          │
//!               ┌──────────┴──────────┐
//!               ▼                     ▼
//!        ┌──────────────┐      ┌─────────────┐
//!        │ orchestrator │      │  shutdown   │
//!        └──────┬───────┘      └─────────────┘
//!               │
//!        ┌──────▼──────┐
//!        │  sluice-*   │
//!        │  (crates)   │
//!        └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the gateway (default command)
//! sluice
//!
//! # Start with custom config, stopping on the first error
//! sluice -c /etc/sluice/gateway.yaml run --quit-on-error
//!
//! # Validate configuration
//! sluice validate --show-config
//!
//! # Show version
//! sluice version
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use orchestrator::{FailedConnector, GatewayOrchestrator, PollOutcome, ReconciliationReport};
pub use runtime::{GatewayRuntime, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownToken};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
