// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use std::path::Path;

use serde::Serialize;
use sluice_config::{GatewayConfig, SecretValue};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Summary of a validated configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    /// Number of configured servers.
    pub servers: usize,
    /// Number of configured identifiers across all servers.
    pub identifier_count: usize,
    /// Registry base URL.
    pub registry_url: String,
    /// Whether the gateway stops on the first bad status.
    pub quit_on_error: bool,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

impl ValidationSummary {
    /// Inspects an already-validated configuration.
    pub fn inspect(config: &GatewayConfig, verbose: bool) -> Self {
        let mut warnings = Vec::new();

        if config.servers.is_empty() {
            warnings.push("No servers configured".to_string());
        }

        for server in &config.servers {
            if server.subscriptions.is_empty() {
                warnings.push(format!("Server {} has no subscriptions", server.server_id));
            }
            if config.max_browse_depth == 0 && server.subscriptions.iter().any(|s| s.is_folder) {
                warnings.push(format!(
                    "Server {} subscribes to a folder with unbounded browse depth",
                    server.server_id
                ));
            }
        }

        if verbose && config.registry.verbose {
            if let Some(parent) = config.registry.log_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    warnings.push(format!(
                        "Exchange log directory does not exist: {}",
                        parent.display()
                    ));
                }
            }
        }

        Self {
            servers: config.servers.len(),
            identifier_count: config.identifier_count(),
            registry_url: config.registry.url.clone(),
            quit_on_error: config.quit_on_error,
            poll_interval_ms: config.poll_interval_ms,
            warnings,
        }
    }
}

/// Returns a copy of `config` with every password masked.
pub(crate) fn redacted(config: &GatewayConfig) -> GatewayConfig {
    let mask = |secret: &SecretValue| {
        if secret.is_empty() {
            SecretValue::default()
        } else {
            SecretValue::new("***")
        }
    };

    let mut copy = config.clone();
    copy.registry.password = mask(&copy.registry.password);
    for server in &mut copy.servers {
        server.password = mask(&server.password);
    }
    copy
}

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let (config, summary) = check(config_path, cli.verbose)?;

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Servers: {}", summary.servers);
            println!("  Identifiers: {}", summary.identifier_count);
            println!("  Registry: {}", summary.registry_url);
            println!("  Quit on error: {}", summary.quit_on_error);
            println!("  Poll interval: {} ms", summary.poll_interval_ms);

            if !summary.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &summary.warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&redacted(&config))
                        .unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let shown = args.show_config.then(|| redacted(&config));
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": summary,
                "config": shown,
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("Failed to render output: {}", e)))?;
            println!("{}", text);
        }
    }

    if args.strict && !summary.warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            summary.warnings.len()
        )));
    }

    Ok(())
}

fn check(config_path: &Path, verbose: bool) -> BinResult<(GatewayConfig, ValidationSummary)> {
    if !config_path.exists() {
        return Err(BinError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        )));
    }

    let config = sluice_config::load_config(config_path)
        .map_err(|e| BinError::config(format!("Configuration validation failed: {}", e)))?;

    let summary = ValidationSummary::inspect(&config, verbose);
    Ok((config, summary))
}
