use anyhow::{Context, Result};
use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use tracing::{error, info};

use realm_core::assets::AssetCatalog;
use realm_core::engine::{self, RealmPlugin};
use realm_core::logging::{self, TracingConfig};
use realm_server::ecs_bridge::{
    self, BridgePlugin, GameCommand, MetricsResource, PersistenceQueue, WorldSnapshotResource,
};
use realm_server::metrics::ServerMetrics;
use realm_server::network::{self, NetworkContext};
use realm_server::storage::{self, Storage};
use realm_server::{api, ServerConfig};

fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    logging::init_tracing(&TracingConfig::with_level(config.log_level));
    info!("Starting Realm server...");

    // ========================================================================
    // 1. Static data and storage (fatal if missing)
    // ========================================================================
    let catalog = match &config.data_dir {
        Some(dir) => AssetCatalog::load_dir(dir)
            .with_context(|| format!("loading game data from {}", dir.display()))?,
        None => AssetCatalog::bundled().context("loading bundled game data")?,
    };
    let storage = Storage::lmdb(&config.db_path, config.db_max_size)
        .with_context(|| format!("opening LMDB store at {}", config.db_path.display()))?;

    // ========================================================================
    // 2. Bridge channels
    // ========================================================================
    let (cmd_sender, cmd_receiver, world_snapshot) = ecs_bridge::create_bridge();
    let (save_sender, save_receiver) = storage::save_channel();
    let metrics = ServerMetrics::new();

    // ========================================================================
    // 3. Network, API and persistence on a separate tokio runtime
    // ========================================================================
    let listener = std::net::TcpListener::bind(&config.bind_addr)
        .with_context(|| format!("binding game port {}", config.bind_addr))?;
    listener.set_nonblocking(true)?;

    let io_thread = {
        let ctx = NetworkContext::new(cmd_sender.clone(), storage.clone(), metrics.clone());
        let api_snapshot = world_snapshot.clone();
        let api_metrics = metrics.clone();
        let api_port = config.api_port;
        let runtime = tokio::runtime::Runtime::new().context("creating tokio runtime")?;

        std::thread::spawn(move || {
            runtime.block_on(async move {
                let worker = tokio::spawn(storage::run_persistence_worker(
                    storage.players.clone(),
                    save_receiver,
                ));

                match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => {
                        tokio::spawn(async move {
                            if let Err(e) = network::serve(listener, ctx).await {
                                error!("Game listener stopped: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Game listener unusable: {}", e),
                }

                tokio::spawn(async move {
                    if let Err(e) = api::start_api_server(api_snapshot, api_metrics, api_port).await {
                        error!("API server error: {}", e);
                    }
                });

                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received, shutting down");
                }
                let _ = cmd_sender.send(GameCommand::Shutdown);

                // finishes once the world drops its save sender
                match worker.await {
                    Ok(saved) => info!("Flushed {} player records", saved),
                    Err(e) => error!("Persistence worker failed: {}", e),
                }
            });
        })
    };

    // ========================================================================
    // 4. Bevy world on the main thread
    // ========================================================================
    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(config.engine.tick_interval())),
    )
    .add_plugins((RealmPlugin, BridgePlugin))
    .insert_resource(cmd_receiver)
    .insert_resource(WorldSnapshotResource {
        snapshot: world_snapshot,
    })
    .insert_resource(PersistenceQueue {
        sender: save_sender,
    })
    .insert_resource(MetricsResource(metrics));

    let monsters = engine::install(app.world_mut(), config.engine.clone(), &catalog)
        .with_context(|| format!("installing map {}", config.engine.map_name))?;
    info!(
        "World ready: {} monsters, {} Hz, game port {}, API port {}",
        monsters, config.engine.tick_rate, config.bind_addr, config.api_port
    );

    let exit = app.run();
    drop(app);
    info!("World stopped ({:?})", exit);

    if io_thread.join().is_err() {
        error!("I/O thread panicked");
    }
    Ok(())
}
