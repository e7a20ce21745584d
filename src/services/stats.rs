// src/services/stats.rs
use serde::Serialize;
use std::collections::HashMap;

use crate::models::Property;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeShare {
    pub property_type: String,
    pub count: usize,
}

/// One histogram bar; `max` is inclusive only for the last bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBin {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Figures for the dashboard's summary cards and charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total: usize,
    pub sale_count: usize,
    pub rent_count: usize,
    pub unknown_listing_count: usize,
    pub avg_sale_price: Option<f64>,
    pub avg_rent_price: Option<f64>,
    pub roi_years: Option<f64>,
    pub type_distribution: Vec<TypeShare>,
    pub sale_price_histogram: Vec<PriceBin>,
    pub rent_price_histogram: Vec<PriceBin>,
}

/// `[lat, lon, intensity]`, the layout map heat layers take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatPoint(pub f64, pub f64, pub f64);

fn calculate_average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn summarize(properties: &[Property], bins: usize) -> DashboardSummary {
    let sale_prices: Vec<f64> = properties
        .iter()
        .filter(|p| p.is_for_sale == Some(true))
        .map(|p| p.price)
        .collect();
    let rent_prices: Vec<f64> = properties
        .iter()
        .filter(|p| p.is_for_sale == Some(false))
        .map(|p| p.price)
        .collect();

    let avg_sale_price = calculate_average(&sale_prices);
    let avg_rent_price = calculate_average(&rent_prices);
    let roi_years = match (avg_sale_price, avg_rent_price) {
        (Some(sale), Some(rent)) if rent * 12.0 > 0.0 => Some(sale / (rent * 12.0)),
        _ => None,
    };

    DashboardSummary {
        total: properties.len(),
        sale_count: sale_prices.len(),
        rent_count: rent_prices.len(),
        unknown_listing_count: properties.len() - sale_prices.len() - rent_prices.len(),
        avg_sale_price,
        avg_rent_price,
        roi_years,
        type_distribution: type_distribution(properties),
        sale_price_histogram: price_histogram(&sale_prices, bins),
        rent_price_histogram: price_histogram(&rent_prices, bins),
    }
}

/// Listing counts per property type, largest first.
pub fn type_distribution(properties: &[Property]) -> Vec<TypeShare> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for property in properties {
        let name = property.property_type.trim();
        let name = if name.is_empty() { "Unknown" } else { name };
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut shares: Vec<TypeShare> = counts
        .into_iter()
        .map(|(property_type, count)| TypeShare { property_type: property_type.to_string(), count })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.property_type.cmp(&b.property_type)));
    shares
}

/// Equal-width bins between the lowest and highest finite price.
pub fn price_histogram(prices: &[f64], bins: usize) -> Vec<PriceBin> {
    let prices: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
    if prices.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![PriceBin { min, max, count: prices.len() }];
    }

    let width = (max - min) / bins as f64;
    let mut histogram: Vec<PriceBin> = (0..bins)
        .map(|i| PriceBin {
            min: min + width * i as f64,
            max: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count: 0,
        })
        .collect();

    for price in prices {
        let index = (((price - min) / width) as usize).min(bins - 1);
        histogram[index].count += 1;
    }
    histogram
}

/// Heat layer points weighted by price relative to the most expensive listing.
pub fn heatmap_points(properties: &[Property]) -> Vec<HeatPoint> {
    let located: Vec<(f64, f64, f64)> = properties
        .iter()
        .filter_map(|p| p.lon_lat().map(|(lon, lat)| (lon, lat, p.price)))
        .collect();

    let max_price = located
        .iter()
        .map(|(_, _, price)| *price)
        .fold(f64::NEG_INFINITY, f64::max);

    located
        .into_iter()
        .map(|(lon, lat, price)| {
            let intensity = if max_price > 0.0 && price.is_finite() {
                (price / max_price).max(0.0)
            } else {
                1.0
            };
            HeatPoint(lat, lon, intensity)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn listing(property_type: &str, price: f64, is_for_sale: Option<bool>) -> Property {
        Property {
            id: String::new(),
            title: String::new(),
            price,
            price_currency: "EUR".to_string(),
            property_type: property_type.to_string(),
            area: None,
            rooms: None,
            bathrooms: None,
            location: Location {
                coordinates: vec![24.77, 60.17],
                ..Default::default()
            },
            source: String::new(),
            url: None,
            is_for_sale,
        }
    }

    #[test]
    fn summary_counts_and_averages() {
        let properties = vec![
            listing("Apartment", 200_000.0, Some(true)),
            listing("Apartment", 400_000.0, Some(true)),
            listing("House", 1_000.0, Some(false)),
            listing("", 5.0, None),
        ];
        let summary = summarize(&properties, 4);

        assert_eq!(summary.total, 4);
        assert_eq!((summary.sale_count, summary.rent_count, summary.unknown_listing_count), (2, 1, 1));
        assert_eq!(summary.avg_sale_price, Some(300_000.0));
        assert_eq!(summary.avg_rent_price, Some(1_000.0));
        assert_eq!(summary.roi_years, Some(25.0));
        assert_eq!(
            summary.type_distribution,
            vec![
                TypeShare { property_type: "Apartment".into(), count: 2 },
                TypeShare { property_type: "House".into(), count: 1 },
                TypeShare { property_type: "Unknown".into(), count: 1 },
            ]
        );
        assert_eq!(summary.sale_price_histogram.len(), 4);
        assert_eq!(summary.rent_price_histogram.len(), 1);
    }

    #[test]
    fn summary_without_rentals_has_no_roi() {
        let summary = summarize(&[listing("Apartment", 200_000.0, Some(true))], 10);
        assert_eq!(summary.avg_rent_price, None);
        assert_eq!(summary.roi_years, None);
        assert!(summary.rent_price_histogram.is_empty());

        let empty = summarize(&[], 10);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.avg_sale_price, None);
    }

    #[test]
    fn histogram_puts_maximum_in_last_bin() {
        let histogram = price_histogram(&[0.0, 10.0, 49.0, 50.0, 100.0], 2);
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram[0], PriceBin { min: 0.0, max: 50.0, count: 3 });
        assert_eq!(histogram[1], PriceBin { min: 50.0, max: 100.0, count: 2 });
        assert_eq!(histogram.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn histogram_edge_cases() {
        assert!(price_histogram(&[], 5).is_empty());
        assert_eq!(price_histogram(&[7.0, 7.0], 5), vec![PriceBin { min: 7.0, max: 7.0, count: 2 }]);
        assert_eq!(price_histogram(&[1.0, f64::NAN, 3.0], 1)[0].count, 2);
    }

    #[test]
    fn heatmap_is_lat_lon_intensity() {
        let mut unlocated = listing("House", 10.0, Some(true));
        unlocated.location.coordinates.clear();
        let points = heatmap_points(&[
            listing("Apartment", 100.0, Some(true)),
            listing("Apartment", 50.0, Some(true)),
            unlocated,
        ]);

        assert_eq!(points, vec![HeatPoint(60.17, 24.77, 1.0), HeatPoint(60.17, 24.77, 0.5)]);
        let json = serde_json::to_value(points[1]).unwrap();
        assert_eq!(json, serde_json::json!([60.17, 24.77, 0.5]));
    }
}
