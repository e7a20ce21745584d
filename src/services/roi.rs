// src/services/roi.rs
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Property, RoiEstimate};
use crate::services::config::{RoiConfig, MAX_BUCKET_DECIMALS};

pub const UNKNOWN_ADDRESS: &str = "Unknown";

/// Integer grid cell a coordinate pair falls into.
pub type BucketKey = (i64, i64);

/// Sale and rental listings that share a bucket.
#[derive(Debug, Default)]
pub struct LocationGroup<'a> {
    pub sales: Vec<&'a Property>,
    pub rentals: Vec<&'a Property>,
}

fn scale(decimals: u32) -> f64 {
    10f64.powi(decimals.min(MAX_BUCKET_DECIMALS) as i32)
}

/// Rounds both coordinates to `decimals` places. Sale and rental listings go
/// through this same function so they can land in the same bucket.
///
/// Rounding splits at the half step: with 3 decimals, 60.1704 and 60.1706
/// fall into different buckets although they agree to three places.
pub fn bucket_key(lon: f64, lat: f64, decimals: u32) -> BucketKey {
    let factor = scale(decimals);
    ((lon * factor).round() as i64, (lat * factor).round() as i64)
}

fn bucket_center(key: BucketKey, decimals: u32) -> [f64; 2] {
    let factor = scale(decimals);
    [key.0 as f64 / factor, key.1 as f64 / factor]
}

fn calculate_average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Groups located listings with a known listing type by rounded coordinate.
pub fn group_by_location<'a>(
    properties: &'a [Property],
    config: &RoiConfig,
) -> BTreeMap<BucketKey, LocationGroup<'a>> {
    let mut groups: BTreeMap<BucketKey, LocationGroup> = BTreeMap::new();
    let mut unlocated = 0usize;
    let mut unknown_listing = 0usize;

    for property in properties {
        let Some((lon, lat)) = property.lon_lat() else {
            unlocated += 1;
            continue;
        };
        let Some(is_for_sale) = property.is_for_sale else {
            unknown_listing += 1;
            continue;
        };

        let group = groups
            .entry(bucket_key(lon, lat, config.bucket_decimals))
            .or_default();
        if is_for_sale {
            group.sales.push(property);
        } else {
            group.rentals.push(property);
        }
    }

    if unlocated > 0 {
        debug!("Skipped {} properties without coordinates", unlocated);
    }
    if unknown_listing > 0 {
        warn!(
            "{} located properties have no sale/rent flag and were left out of ROI estimates",
            unknown_listing
        );
    }

    groups
}

fn representative_address(group: &LocationGroup) -> String {
    group
        .sales
        .first()
        .and_then(|p| p.location.address_text())
        .or_else(|| group.rentals.first().and_then(|p| p.location.address_text()))
        .unwrap_or(UNKNOWN_ADDRESS)
        .to_string()
}

/// Estimates years-to-recoup for every bucket holding both sale and rental listings.
///
/// Output follows bucket order, so re-running on the same input gives identical results.
/// Use [`sort_by_roi`] for best-investment-first display.
pub fn estimate_roi(properties: &[Property], config: &RoiConfig) -> Vec<RoiEstimate> {
    let groups = group_by_location(properties, config);
    let mut estimates = Vec::new();

    for (key, group) in &groups {
        if group.sales.is_empty() || group.rentals.is_empty() {
            continue;
        }

        let (Some(avg_sale_price), Some(avg_rent)) = (
            calculate_average(group.sales.iter().map(|p| p.price)),
            calculate_average(group.rentals.iter().map(|p| p.price)),
        ) else {
            continue;
        };

        let annual_rent = avg_rent * 12.0;
        // Also rejects NaN rents.
        if !(annual_rent > 0.0) {
            debug!("Skipping bucket {:?}: annual rent {} is not positive", key, annual_rent);
            continue;
        }

        estimates.push(RoiEstimate {
            coordinates: bucket_center(*key, config.bucket_decimals),
            avg_sale_price,
            avg_rent,
            roi_years: avg_sale_price / annual_rent,
            address: representative_address(group),
            sale_count: group.sales.len(),
            rental_count: group.rentals.len(),
        });
    }

    debug!(
        "Built {} ROI estimates from {} buckets ({} properties)",
        estimates.len(),
        groups.len(),
        properties.len()
    );
    estimates
}

/// Best investment (fewest years) first.
pub fn sort_by_roi(estimates: &mut [RoiEstimate]) {
    estimates.sort_by(|a, b| a.roi_years.partial_cmp(&b.roi_years).unwrap_or(Ordering::Equal));
}
