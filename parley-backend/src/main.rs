use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod config;
mod controllers;
mod conversation;
mod markers;

use config::Config;
use conversation::ConversationStore;
use markers::MarkerTable;

pub struct AppState {
    pub config: Config,
    pub store: Arc<ConversationStore>,
    pub markers: Arc<MarkerTable>,
    /// Cancelled during shutdown to unblock in-flight long-poll waiters
    pub shutdown: CancellationToken,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Parley v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    let port = config.port;

    log::info!("Initializing workspace");
    if let Err(e) = config::initialize_workspace() {
        log::error!("Failed to initialize workspace: {}", e);
    }

    log::info!("Loading marker table");
    let markers = Arc::new(MarkerTable::load(&config::config_dir()));

    log::info!("Initializing conversation store at {:?}", config.data_dir);
    let store = Arc::new(
        ConversationStore::new(config.data_dir.clone(), markers.clone())
            .expect("Failed to initialize conversation store"),
    );

    let shutdown = CancellationToken::new();

    // Serve the answering UI only if one is present
    let public_dir = config::public_dir();
    let serve_static = public_dir.join("index.html").exists();
    if serve_static {
        log::info!("Serving UI from {:?}", public_dir);
    } else {
        log::warn!(
            "No index.html in {:?} - static file serving disabled",
            public_dir
        );
    }

    log::info!("Starting parley server on port {}", port);

    let shutdown_waiters = shutdown.clone();

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let mut app = App::new()
            .app_data(web::Data::new(AppState {
                config: config.clone(),
                store: Arc::clone(&store),
                markers: Arc::clone(&markers),
                shutdown: shutdown.clone(),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::conversations::config);

        if serve_static {
            app = app.service(Files::new("/", public_dir.clone()).index_file("index.html"));
        }

        app
    })
    .bind(("0.0.0.0", port))?
    .run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();

    // Spawn Ctrl+C handler
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        log::info!("Received Ctrl+C, shutting down...");

        // Unblock long-poll waiters so the server can drain quickly
        shutdown_waiters.cancel();

        let server_stop = server_handle.stop(true);
        if tokio::time::timeout(std::time::Duration::from_secs(5), server_stop)
            .await
            .is_err()
        {
            log::warn!("Timeout waiting for HTTP server to stop, forcing exit...");
        }

        log::info!("Shutdown complete");
    });

    server.await
}
