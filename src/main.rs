// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use veil_keeper::app::config::KeeperSettings;
use veil_keeper::app::logging::setup_logging;
use veil_keeper::data::assets::AssetRegistry;
use veil_keeper::data::db::Database;
use veil_keeper::data::store::SharedStore;
use veil_keeper::domain::error::AppError;
use veil_keeper::network::pool::RelayerConnector;
use veil_keeper::network::provider::{ConnectionFactory, SharedChain};
use veil_keeper::network::swap::JupiterSwap;
use veil_keeper::services::keeper::{ExecutionPipeline, Keeper};
use veil_keeper::services::trigger::spawn_trigger_server;

#[derive(Parser, Debug)]
#[command(author, version, about = "Private DCA execution keeper")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Run a single keeper pass, print the JSON report and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Trigger server port (overrides config/env, 0 disables)
    #[arg(long)]
    trigger_port: Option<u16>,

    /// Scheduler interval in seconds (overrides config/env, 0 disables)
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = KeeperSettings::load_with_path(cli.config.as_deref())?;
    if let Some(port) = cli.trigger_port {
        settings.trigger_port = port;
    }
    if let Some(secs) = cli.interval_secs {
        settings.interval_secs = secs;
    }
    if cli.once {
        settings.trigger_port = 0;
    }
    settings.validate()?;
    setup_logging(
        if settings.debug { "debug" } else { "info" },
        settings.log_json,
    );

    let database_url = settings.database_url();
    let db = Database::new(&database_url).await?;
    let store: SharedStore = Arc::new(db);

    let chain: SharedChain = Arc::new(ConnectionFactory::rpc(&settings.rpc_url)?);
    let swap = Arc::new(JupiterSwap::new(
        &settings.swap_api_url,
        settings.priority_fee_max_lamports,
    )?);
    let pools = Arc::new(RelayerConnector::new(
        &settings.pool_relayer_url,
        chain.clone(),
    )?);
    let assets = match settings.tokenlist_path.as_deref() {
        Some(path) => AssetRegistry::load_from_file(path)?,
        None => AssetRegistry::builtin(),
    };
    tracing::info!(
        target: "config",
        database = %database_url,
        assets = assets.len(),
        slippage_bps = settings.slippage_bps,
        stale_claim_secs = settings.stale_claim_secs,
        "Keeper configured"
    );

    let pipeline = ExecutionPipeline::new(
        chain,
        swap,
        pools,
        Arc::new(assets),
        settings.pipeline_config(),
    );
    let keeper = Arc::new(Keeper::new(
        store,
        pipeline,
        settings.stale_claim_after()?,
    ));

    if cli.once {
        let report = keeper.run_due().await;
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| AppError::Unknown(e.into()))?;
        println!("{body}");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    if settings.trigger_port != 0 {
        let token = settings.keeper_token_value().unwrap_or_default();
        spawn_trigger_server(
            &settings.trigger_bind,
            settings.trigger_port,
            token,
            keeper.clone(),
            shutdown.clone(),
        )
        .await
        .ok_or_else(|| {
            AppError::Initialization(format!(
                "trigger server could not bind {}:{}",
                settings.trigger_bind, settings.trigger_port
            ))
        })?;
    }

    if settings.interval_secs > 0 {
        let every = Duration::from_secs(settings.interval_secs);
        tasks.push(tokio::spawn(
            keeper.clone().run_interval(every, shutdown.clone()),
        ));
    }

    if settings.trigger_port == 0 && tasks.is_empty() {
        return Err(AppError::Config(
            "Nothing to run: trigger server and interval scheduler are both disabled".to_string(),
        ));
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::Initialization(format!("signal handler: {e}")))?;
    tracing::info!(target: "keeper", "Ctrl-C received; shutting down");
    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
