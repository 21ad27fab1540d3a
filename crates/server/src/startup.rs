use std::{env, net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use common::utils::logging::init_logging_default;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::interceptor::DefaultsState;
use crate::routes;
use service::{
    cache::DefaultsCache,
    defaults::{DefaultsLoader, FileLoader, StaticLoader},
};

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load the app config, falling back to env vars when no file exists
fn load_config() -> configs::AppConfig {
    match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(_) => {
            let mut cfg = configs::AppConfig::default();
            cfg.server.host =
                env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
            cfg.server.port = env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8081);
            cfg
        }
    }
}

fn bind_addr(cfg: &configs::AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

/// Wire the process-wide defaults state from config. The cache is
/// created here once and lives for the process lifetime.
pub fn build_defaults_state(cfg: &configs::DefaultsConfig) -> DefaultsState {
    let loader: Arc<dyn DefaultsLoader> = match &cfg.source_path {
        Some(path) => {
            info!(%path, "defaults loader: file source");
            Arc::new(FileLoader::new(path))
        }
        None => {
            info!("defaults loader: built-in static values");
            Arc::new(StaticLoader::builtin())
        }
    };
    DefaultsState {
        cache: DefaultsCache::new(),
        loader,
        ttl: Duration::from_secs(cfg.ttl_secs),
    }
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = load_config();
    let state = build_defaults_state(&cfg.defaults);

    let cors = build_cors();
    let app: Router = routes::build_router(state, cors);

    let addr = bind_addr(&cfg)?;
    info!(%addr, ttl_secs = cfg.defaults.ttl_secs, "starting defaults service");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
