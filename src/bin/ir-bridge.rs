// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ir-bridge` daemon: loads a configuration file and bridges MQTT to an
//! IR gateway until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ir_bridge::bridge::runner;
use ir_bridge::config::BridgeConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ir-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ir_bridge=info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }

    let config = BridgeConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    };
    runner::serve(&config, shutdown)
        .await
        .context("bridge stopped")?;
    Ok(())
}
