// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sluice-config
//!
//! Configuration management for the Sluice gateway.
//!
//! ## Features
//!
//! - **Schema Definition**: servers, subscriptions, registry and logging
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `${VAR:default}` placeholders and `SLUICE_*` variables
//! - **Validation**: unique server ids, non-empty endpoints and identifiers
//!
//! ## Quick Start
//!
//! ```no_run
//! use sluice_config::load_config;
//!
//! let config = load_config("sluice.yaml").unwrap();
//!
//! for server in &config.servers {
//!     println!("{} -> {}", server.server_id, server.endpoint);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{
    GatewayConfig, LogFormat, LogLevel, LoggingConfig, RegistryConfig, SecretValue, ServerConfig,
    SubscriptionConfig, SubscriptionParams,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
