// src/handlers/data.rs
use log::{info, warn};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::dashboard::Dashboard;

pub async fn get_property_types(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let types = state
        .property_types
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("property types")))?;
    Ok(warp::reply::json(types))
}

pub async fn get_sources(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let sources = state
        .sources
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("sources")))?;
    Ok(warp::reply::json(sources))
}

pub async fn get_regions(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let regions = state
        .regions
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("region statistics")))?;
    Ok(warp::reply::json(regions))
}

/// Raw CSV body, forwarded to the backend as a multipart upload.
pub async fn post_upload_csv(
    file_name: Option<String>,
    body: Bytes,
    dashboard: Arc<Dashboard>,
) -> Result<Json, Rejection> {
    let file_name = file_name.unwrap_or_else(|| "upload.csv".to_string());
    info!("Handling CSV upload {} ({} bytes)", file_name, body.len());

    if body.is_empty() {
        warn!("Rejecting empty CSV upload");
        return Err(warp::reject::custom(ApiError::with_status(
            StatusCode::BAD_REQUEST,
            "CSV file is empty",
        )));
    }

    let result = dashboard
        .upload_csv(&file_name, body.to_vec())
        .await
        .map_err(|e| warp::reject::custom(ApiError::external_error(&e)))?;
    Ok(warp::reply::json(&result))
}

pub async fn post_import_default_data(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    info!("Handling default data import");
    let result = dashboard
        .import_default_data()
        .await
        .map_err(|e| warp::reject::custom(ApiError::external_error(&e)))?;
    Ok(warp::reply::json(&result))
}
