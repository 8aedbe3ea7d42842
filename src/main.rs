// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use npc_channel_server::{
    api::router,
    blockchain::{escrow::client::confirm_timeout_within, keys, SolanaEscrowClient, SolanaRpc},
    channels::ChannelManager,
    config::{AppConfig, LogFormat, DEFAULT_LOG_FILTER},
    dialogue::OpenAiDialogue,
    identities::IdentityService,
    state::AppState,
    storage::{JsonStorage, StoragePaths, Store},
    sweeper::ExpirySweeper,
    watcher::LedgerWatcher,
};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(?config, "Configuration loaded");

    let mut storage = JsonStorage::new(StoragePaths::new(&config.data_dir));
    storage
        .initialize()
        .expect("Failed to initialize data directory");
    let store = Arc::new(Store::new(Arc::new(storage)));

    let signer = keys::load_keypair(&config.server_secret_key).expect("Invalid SERVER_SECRET_KEY");
    let rpc = Arc::new(
        SolanaRpc::new(&config.rpc_url, config.upstream_timeout).expect("Invalid RPC client"),
    );
    let escrow = Arc::new(
        SolanaEscrowClient::new(rpc.clone(), signer, config.program_id)
            .with_confirm_timeout(confirm_timeout_within(config.upstream_timeout)),
    );
    let dialogue = Arc::new(
        OpenAiDialogue::new(
            &config.openai_base_url,
            &config.openai_api_key,
            &config.openai_model,
            config.upstream_timeout,
        )
        .expect("Invalid dialogue client"),
    );

    let manager = Arc::new(ChannelManager::new(
        store.clone(),
        escrow,
        dialogue,
        config.upstream_timeout,
    ));
    let identities = Arc::new(IdentityService::new(store));

    match manager.ensure_template(&config.default_template_id).await {
        Ok(true) => tracing::info!(template_id = %config.default_template_id, "Default template created"),
        Ok(false) => {}
        Err(e) => tracing::warn!(
            template_id = %config.default_template_id,
            error = %e,
            "Could not ensure default template; auto-opened channels may fail until it exists"
        ),
    }

    let shutdown = CancellationToken::new();

    let watcher = LedgerWatcher::new(
        rpc.clone(),
        manager.clone(),
        identities.clone(),
        config.default_template_id.clone(),
    )
    .with_poll_interval(config.watch_poll_interval);
    let watcher_task = tokio::spawn(watcher.run(shutdown.clone()));

    let sweeper_task = tokio::spawn(ExpirySweeper::new(manager.clone()).run(shutdown.clone()));

    let app = router(AppState::new(manager, identities, rpc));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!(addr = %config.bind_addr, "NPC channel server listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
    {
        tracing::error!(error = %e, "HTTP server failed");
        shutdown.cancel();
    }

    let _ = tokio::join!(watcher_task, sweeper_task);
    tracing::info!("Shutdown complete");
}
