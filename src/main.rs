use dotenv::dotenv;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use warp::Filter;

use location_dashboard::routes;
use location_dashboard::services::api_client::ApiClient;
use location_dashboard::services::config::Config;
use location_dashboard::services::dashboard::Dashboard;
use location_dashboard::services::filter::PropertyFilter;
use location_dashboard::services::overpass::OverpassClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = Config::from_env();
    info!("Using PORT: {}", config.port);
    info!("Property backend: {}", config.backend_url);
    info!("Overpass endpoint: {}", config.overpass_url);
    info!(
        "ROI buckets at {} decimals, building match under {} degrees",
        config.roi.bucket_decimals, config.matching.max_distance_deg
    );

    let backend = ApiClient::new(config.backend_url.clone(), config.http_timeout)
        .map_err(|e| anyhow::anyhow!("failed to build backend client: {}", e))?;
    let overpass = OverpassClient::new(config.overpass_url.clone(), config.http_timeout)
        .map_err(|e| anyhow::anyhow!("failed to build Overpass client: {}", e))?;

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let dashboard = Arc::new(Dashboard::new(Arc::new(backend), Arc::new(overpass), config));

    // Initial load; an unreachable backend only leaves the sections empty.
    match dashboard.refresh(PropertyFilter::default()).await {
        Ok(report) => info!("Initial load finished with {} properties", report.properties.count),
        Err(e) => warn!("Initial load failed, serving empty dashboard: {}", e),
    }

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "x-file-name"])
        .allow_methods(vec!["GET", "POST"]);

    let api = routes::routes(dashboard).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    let server = warp::serve(api).run(addr);
    tokio::select! {
        _ = server => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        }
    }
    Ok(())
}
