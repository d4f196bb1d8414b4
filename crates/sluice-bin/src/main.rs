// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Sluice - OPC UA to REST registry gateway
//!
//! Main binary entry point.

use sluice_bin::cli::Cli;
use sluice_bin::commands;
use sluice_bin::error::report_error_and_exit;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(err) = commands::execute(cli).await {
        report_error_and_exit(err);
    }
}
