// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime.
//!
//! Wires the pieces the orchestrator needs and owns the process lifecycle:
//!
//! - Configuration loading and CLI overrides
//! - Protocol factory and registry transport selection
//! - Signal handling through the shutdown coordinator
//! - Orderly teardown whatever the exit reason

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use sluice_config::{load_config, GatewayConfig};
use sluice_opcua::ProtocolFactory;
use sluice_registry::{HttpRegistryTransport, RegistrySync, RegistryTransport};

use crate::error::{BinError, BinResult};
use crate::orchestrator::GatewayOrchestrator;
use crate::shutdown::ShutdownCoordinator;

// =============================================================================
// GatewayRuntime
// =============================================================================

/// Runs one gateway until it stops or a signal arrives.
pub struct GatewayRuntime {
    orchestrator: GatewayOrchestrator,
    shutdown: ShutdownCoordinator,
}

impl GatewayRuntime {
    /// Returns the shutdown coordinator, e.g. to stop the runtime from a test.
    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Returns the orchestrator.
    pub fn orchestrator(&self) -> &GatewayOrchestrator {
        &self.orchestrator
    }

    /// Starts the gateway, polls until stopped and tears everything down.
    ///
    /// Returns [`BinError::Gateway`] when a connector fails to start under
    /// quit-on-error, and [`BinError::Status`] when the loop stops with a
    /// non-good status.
    pub async fn run(mut self) -> BinResult<()> {
        info!(
            version = sluice_core::VERSION,
            servers = self.orchestrator.config().servers.len(),
            "Starting Sluice gateway"
        );

        let signals = {
            let coordinator = self.shutdown.clone();
            tokio::spawn(async move { coordinator.wait_for_signal().await })
        };

        let outcome = match self.orchestrator.start().await {
            Ok(()) => {
                let token = self.shutdown.token();
                Ok(self.orchestrator.run(&token).await)
            }
            Err(err) => {
                error!(error = %err, "Gateway failed to start");
                Err(err)
            }
        };

        self.orchestrator.shutdown().await;

        // Releases the signal task if the loop stopped on its own.
        self.shutdown.initiate_shutdown();
        let _ = signals.await;

        let status = outcome.map_err(|err| BinError::from(err).with_context("Gateway failed to start"))?;
        if status.is_good() {
            info!("Sluice gateway shutdown complete");
            Ok(())
        } else {
            error!(%status, "Sluice gateway stopped");
            Err(BinError::Status(status))
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the gateway runtime.
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<GatewayConfig>,
    quit_on_error: bool,
    no_reconcile: bool,
    factory: Option<Arc<dyn ProtocolFactory>>,
    transport: Option<Arc<dyn RegistryTransport>>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            quit_on_error: false,
            no_reconcile: false,
            factory: None,
            transport: None,
        }
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Forces quit-on-error on. Never turns it off.
    pub fn quit_on_error(mut self, enabled: bool) -> Self {
        self.quit_on_error = enabled;
        self
    }

    /// Skips the startup reconciliation.
    pub fn no_reconcile(mut self, skip: bool) -> Self {
        self.no_reconcile = skip;
        self
    }

    /// Uses `factory` instead of the built-in OPC UA client.
    pub fn protocol_factory(mut self, factory: Arc<dyn ProtocolFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Uses `transport` instead of the HTTP registry client.
    pub fn registry_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> BinResult<GatewayRuntime> {
        let mut config = match self.config {
            Some(cfg) => cfg,
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::config("No configuration provided"))?;

                load_config(&path).map_err(|e| {
                    BinError::config(format!("Failed to load config from {:?}: {}", path, e))
                })?
            }
        };

        if self.quit_on_error {
            config.quit_on_error = true;
        }
        if self.no_reconcile {
            config.reconcile_on_start = false;
        }

        let factory = match self.factory {
            Some(factory) => factory,
            None => default_factory()?,
        };

        let transport: Arc<dyn RegistryTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpRegistryTransport::from_config(&config.registry).map_err(|e| {
                BinError::init(format!("Failed to create registry client: {}", e))
            })?),
        };
        let registry = RegistrySync::new(transport).with_events_path(config.registry.events_path.clone());

        Ok(GatewayRuntime {
            orchestrator: GatewayOrchestrator::new(config, factory, registry),
            shutdown: ShutdownCoordinator::new(),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "real-transport")]
fn default_factory() -> BinResult<Arc<dyn ProtocolFactory>> {
    Ok(Arc::new(sluice_opcua::OpcUaProtocolFactory))
}

#[cfg(not(feature = "real-transport"))]
fn default_factory() -> BinResult<Arc<dyn ProtocolFactory>> {
    Err(BinError::init(
        "no OPC UA client compiled in; rebuild with the `real-transport` feature",
    ))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use sluice_config::ServerConfig;
    use sluice_opcua::SourceProtocol;
    use sluice_registry::RegistryResult;

    struct Silent;

    #[async_trait]
    impl RegistryTransport for Silent {
        async fn get(&self, _path: &str) -> RegistryResult<Value> {
            Ok(Value::Null)
        }

        async fn post(&self, _path: &str, _body: &Value) -> RegistryResult<Value> {
            Ok(Value::Null)
        }

        async fn put(&self, _path: &str, _body: &Value) -> RegistryResult<Value> {
            Ok(Value::Null)
        }
    }

    fn unreachable_factory() -> Arc<dyn ProtocolFactory> {
        Arc::new(|_: &ServerConfig| -> Box<dyn SourceProtocol> {
            panic!("no server should be constructed")
        })
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        let result = RuntimeBuilder::new()
            .protocol_factory(unreachable_factory())
            .registry_transport(Arc::new(Silent))
            .build();
        assert!(matches!(result, Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_runtime_builder_overrides() {
        let runtime = RuntimeBuilder::new()
            .config(GatewayConfig::default())
            .quit_on_error(true)
            .no_reconcile(true)
            .protocol_factory(unreachable_factory())
            .registry_transport(Arc::new(Silent))
            .build()
            .unwrap();

        let config = runtime.orchestrator().config();
        assert!(config.quit_on_error);
        assert!(!config.reconcile_on_start);
    }

    #[cfg(not(feature = "real-transport"))]
    #[test]
    fn test_runtime_builder_without_client() {
        let result = RuntimeBuilder::new()
            .config(GatewayConfig::default())
            .registry_transport(Arc::new(Silent))
            .build();
        assert!(matches!(result, Err(BinError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_empty_gateway_under_quit_on_error() {
        let runtime = RuntimeBuilder::new()
            .config(GatewayConfig::default())
            .quit_on_error(true)
            .protocol_factory(unreachable_factory())
            .registry_transport(Arc::new(Silent))
            .build()
            .unwrap();

        let err = runtime.run().await.unwrap_err();
        assert_eq!(err.status(), Some(sluice_core::StatusCode::BAD_NOTHING_TO_DO));
    }
}
