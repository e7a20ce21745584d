// src/bin/roi_report.rs
//
// Prints ROI estimates as CSV, best investment first.
// Usage: roi_report [property_type]
use csv::Writer;
use dotenv::dotenv;
use std::env;
use std::io;

use location_dashboard::services::api_client::{ApiClient, PropertyBackend};
use location_dashboard::services::config::Config;
use location_dashboard::services::filter::PropertyFilter;
use location_dashboard::services::roi::{estimate_roi, sort_by_roi};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let filter = PropertyFilter {
        property_type: env::args().nth(1),
        ..Default::default()
    };

    let client = ApiClient::new(config.backend_url.clone(), config.http_timeout)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let properties = client
        .fetch_properties(&filter, config.property_limit)
        .await
        .map_err(|e| anyhow::anyhow!("failed to fetch properties: {}", e))?;

    let mut estimates = estimate_roi(&properties, &config.roi);
    sort_by_roi(&mut estimates);
    eprintln!("{} properties, {} locations with both sale and rental listings", properties.len(), estimates.len());

    let mut wtr = Writer::from_writer(io::stdout());
    wtr.write_record([
        "longitude",
        "latitude",
        "address",
        "avg_sale_price",
        "avg_rent",
        "roi_years",
        "sale_count",
        "rental_count",
    ])?;
    for estimate in &estimates {
        wtr.write_record(&[
            estimate.coordinates[0].to_string(),
            estimate.coordinates[1].to_string(),
            estimate.address.clone(),
            format!("{:.0}", estimate.avg_sale_price),
            format!("{:.0}", estimate.avg_rent),
            format!("{:.1}", estimate.roi_years),
            estimate.sale_count.to_string(),
            estimate.rental_count.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
