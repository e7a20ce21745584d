// src/routes.rs
use std::sync::Arc;
use warp::reject::Rejection;
use crate::handlers::dashboard::{get_buildings, get_heatmap, get_properties, get_roi, get_status,
                                 get_summary, post_refresh};
use crate::handlers::data::{get_property_types, get_regions, get_sources, post_import_default_data,
                            post_upload_csv};
use crate::services::dashboard::Dashboard;
use crate::services::filter::PropertyFilter;
use log::{error, info};

use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Filter, Reply};
use crate::handlers::error::ApiError;

pub const MAX_CSV_BYTES: u64 = 10 * 1024 * 1024;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("Invalid filter: {}", e);
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("Invalid filter: {}", e);
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "CSV file is too large".to_string();
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        code = StatusCode::LENGTH_REQUIRED;
        message = "Content-Length header is required".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        error!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(dashboard: Arc<Dashboard>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let dashboard_filter = warp::any().map(move || dashboard.clone());
    let filter_query = warp::query::<PropertyFilter>();

    let status_route = warp::path!("api" / "v1" / "status")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(get_status);

    let refresh_route = warp::path!("api" / "v1" / "refresh")
        .and(warp::post())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json::<PropertyFilter>())
        .and(dashboard_filter.clone())
        .and_then(post_refresh);

    let properties_route = warp::path!("api" / "v1" / "properties")
        .and(warp::get())
        .and(filter_query.clone())
        .and(dashboard_filter.clone())
        .and_then(get_properties);

    let summary_route = warp::path!("api" / "v1" / "summary")
        .and(warp::get())
        .and(filter_query.clone())
        .and(dashboard_filter.clone())
        .and_then(get_summary);

    let heatmap_route = warp::path!("api" / "v1" / "heatmap")
        .and(warp::get())
        .and(filter_query.clone())
        .and(dashboard_filter.clone())
        .and_then(get_heatmap);

    let roi_route = warp::path!("api" / "v1" / "roi")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(get_roi);

    let buildings_route = warp::path!("api" / "v1" / "buildings")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(get_buildings);

    let types_route = warp::path!("api" / "v1" / "property-types")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(get_property_types);

    let sources_route = warp::path!("api" / "v1" / "sources")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(get_sources);

    let regions_route = warp::path!("api" / "v1" / "regions")
        .and(warp::get())
        .and(dashboard_filter.clone())
        .and_then(get_regions);

    let upload_route = warp::path!("api" / "v1" / "upload-csv")
        .and(warp::post())
        .and(warp::header::optional::<String>("x-file-name"))
        .and(warp::body::content_length_limit(MAX_CSV_BYTES))
        .and(warp::body::bytes())
        .and(dashboard_filter.clone())
        .and_then(post_upload_csv);

    let import_route = warp::path!("api" / "v1" / "import-default-data")
        .and(warp::post())
        .and(dashboard_filter.clone())
        .and_then(post_import_default_data);

    info!("All routes configured successfully.");

    status_route
        .or(refresh_route)
        .or(properties_route)
        .or(summary_route)
        .or(heatmap_route)
        .or(roi_route)
        .or(buildings_route)
        .or(types_route)
        .or(sources_route)
        .or(regions_route)
        .or(upload_route)
        .or(import_route)
        .recover(handle_rejection)
}
