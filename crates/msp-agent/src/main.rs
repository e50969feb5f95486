// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

use msp_agent::config::AgentConfig;

/// Priority: `--log-level` > `RUST_LOG` > `info`. Safe to call more than
/// once (`try_init`).
fn init_tracing(config: &AgentConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[tokio::main]
async fn main() {
    let config = AgentConfig::parse();
    init_tracing(&config);

    let shutdown = CancellationToken::new();
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_token.cancel();
    });

    if let Err(e) = msp_agent::run(config, shutdown).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
