// src/handlers/dashboard.rs
use log::{debug, info};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::GeoJson;
use crate::services::dashboard::Dashboard;
use crate::services::filter::PropertyFilter;
use crate::services::roi::sort_by_roi;
use crate::services::stats::{heatmap_points, summarize};

pub async fn get_status(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    Ok(warp::reply::json(&dashboard.status().await))
}

pub async fn post_refresh(filter: PropertyFilter, dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    info!("Handling refresh request");
    let report = dashboard
        .refresh(filter)
        .await
        .map_err(|e| warp::reject::custom(ApiError::external_error(&e)))?;
    Ok(warp::reply::json(&report))
}

/// Loaded properties narrowed by the query-string filter.
pub async fn get_properties(filter: PropertyFilter, dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let properties = state
        .properties
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("properties")))?;

    let filtered = filter.apply(properties);
    debug!("Returning {} of {} properties", filtered.len(), properties.len());
    Ok(warp::reply::json(&filtered))
}

pub async fn get_summary(filter: PropertyFilter, dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let properties = state
        .properties
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("properties")))?;

    let summary = summarize(&filter.apply(properties), dashboard.config().histogram_bins);
    Ok(warp::reply::json(&summary))
}

pub async fn get_heatmap(filter: PropertyFilter, dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let properties = state
        .properties
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("properties")))?;

    Ok(warp::reply::json(&heatmap_points(&filter.apply(properties))))
}

/// ROI estimates, best investment first.
pub async fn get_roi(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let mut estimates = state
        .roi
        .loaded()
        .cloned()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("ROI estimates")))?;

    sort_by_roi(&mut estimates);
    Ok(warp::reply::json(&estimates))
}

pub async fn get_buildings(dashboard: Arc<Dashboard>) -> Result<Json, Rejection> {
    let state = dashboard.read().await;
    let buildings = state
        .buildings
        .loaded()
        .ok_or_else(|| warp::reject::custom(ApiError::not_ready("buildings")))?;

    Ok(warp::reply::json(&GeoJson::from_buildings(buildings)))
}
