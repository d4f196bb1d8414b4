// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the gateway.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = sluice_config::load_config(&cli.config).map_err(|e| {
        BinError::config(format!(
            "Failed to load config from {}: {}",
            cli.config.display(),
            e
        ))
    })?;

    init_logging(
        cli.effective_log_level(config.logging.level.as_str()),
        cli.effective_log_format(config.logging.format),
    )?;

    info!(config = %cli.config.display(), "Starting Sluice gateway...");

    let runtime = RuntimeBuilder::new()
        .config(config)
        .quit_on_error(args.quit_on_error)
        .no_reconcile(args.no_reconcile)
        .build()?;

    runtime.run().await
}
