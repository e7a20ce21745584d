// src/services/matcher.rs
use log::debug;

use crate::models::{BuildingFeature, RoiAnnotation, RoiEstimate};
use crate::services::config::MatchConfig;

/// Vertex average of the outline (`[lon, lat]`). The closing vertex is not
/// counted twice. Good enough for small footprints; not area-weighted.
pub fn centroid(building: &BuildingFeature) -> Option<[f64; 2]> {
    let mut ring = building.outer_ring()?;
    if ring.len() > 1 && ring.first() == ring.last() {
        ring = &ring[..ring.len() - 1];
    }
    if ring.iter().any(|[lon, lat]| !lon.is_finite() || !lat.is_finite()) {
        return None;
    }

    let n = ring.len() as f64;
    let (lon_sum, lat_sum) = ring
        .iter()
        .fold((0.0, 0.0), |(lon, lat), point| (lon + point[0], lat + point[1]));
    Some([lon_sum / n, lat_sum / n])
}

/// Planar distance in degree space.
fn planar_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Closest estimate strictly within `max_distance_deg`; earlier estimates win ties.
pub fn nearest_estimate<'a>(
    point: [f64; 2],
    estimates: &'a [RoiEstimate],
    config: &MatchConfig,
) -> Option<&'a RoiEstimate> {
    let mut best: Option<(&RoiEstimate, f64)> = None;
    for estimate in estimates {
        let distance = planar_distance(point, estimate.coordinates);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((estimate, distance));
        }
    }

    best.filter(|(_, distance)| *distance < config.max_distance_deg)
        .map(|(estimate, _)| estimate)
}

/// Returns a copy of `buildings` where each outline carries the ROI of its nearest
/// estimate, if one is close enough. Outlines that cannot be located come back as-is.
pub fn annotate_buildings(
    buildings: &[BuildingFeature],
    estimates: &[RoiEstimate],
    config: &MatchConfig,
) -> Vec<BuildingFeature> {
    let mut matched = 0usize;
    let mut malformed = 0usize;

    let annotated = buildings
        .iter()
        .map(|building| {
            let Some(center) = centroid(building) else {
                malformed += 1;
                return building.clone();
            };

            let roi = nearest_estimate(center, estimates, config).map(RoiAnnotation::from);
            if roi.is_some() {
                matched += 1;
            }
            BuildingFeature { roi, ..building.clone() }
        })
        .collect();

    debug!(
        "Matched {} of {} buildings to {} ROI estimates ({} without a usable outline)",
        matched,
        buildings.len(),
        estimates.len(),
        malformed
    );
    annotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildingTags, ElementKind};

    fn square(id: i64, lon: f64, lat: f64, half: f64) -> BuildingFeature {
        BuildingFeature {
            id,
            kind: ElementKind::Way,
            rings: vec![vec![
                [lon - half, lat - half],
                [lon + half, lat - half],
                [lon + half, lat + half],
                [lon - half, lat + half],
                [lon - half, lat - half],
            ]],
            tags: BuildingTags::default(),
            roi: None,
        }
    }

    fn estimate(lon: f64, lat: f64, roi_years: f64) -> RoiEstimate {
        RoiEstimate {
            coordinates: [lon, lat],
            avg_sale_price: roi_years * 12_000.0,
            avg_rent: 1_000.0,
            roi_years,
            address: "Unknown".to_string(),
            sale_count: 1,
            rental_count: 1,
        }
    }

    #[test]
    fn centroid_ignores_closing_vertex() {
        let building = BuildingFeature {
            rings: vec![vec![[0.0, 0.0], [3.0, 0.0], [0.0, 3.0], [0.0, 0.0]]],
            ..square(1, 0.0, 0.0, 1.0)
        };
        assert_eq!(centroid(&building), Some([1.0, 1.0]));
    }

    #[test]
    fn outline_on_an_estimate_gets_its_roi() {
        let estimates = vec![estimate(24.77, 60.17, 25.0)];
        let buildings = vec![BuildingFeature {
            rings: vec![vec![[24.77, 60.17]]],
            ..square(1, 0.0, 0.0, 0.0)
        }];

        let annotated = annotate_buildings(&buildings, &estimates, &MatchConfig::default());
        let roi = annotated[0].roi.as_ref().unwrap();
        assert_eq!(roi.roi, 25.0);
        assert_eq!(roi.avg_sale_price, 300_000.0);
        assert_eq!(roi.avg_rent, 1_000.0);
    }

    #[test]
    fn nearest_estimate_wins() {
        let estimates = vec![
            estimate(24.775, 60.17, 30.0),
            estimate(24.771, 60.17, 18.0),
            estimate(24.700, 60.10, 10.0),
        ];
        let annotated = annotate_buildings(
            &[square(1, 24.770, 60.170, 0.0002)],
            &estimates,
            &MatchConfig::default(),
        );
        assert_eq!(annotated[0].roi.as_ref().map(|r| r.roi), Some(18.0));
    }

    #[test]
    fn outline_beyond_threshold_has_no_roi_field() {
        let estimates = vec![estimate(24.90, 60.30, 12.0)];
        let annotated = annotate_buildings(
            &[square(9, 24.77, 60.17, 0.0002)],
            &estimates,
            &MatchConfig { max_distance_deg: 0.05 },
        );
        assert!(annotated[0].roi.is_none());

        let json = serde_json::to_value(&annotated[0]).unwrap();
        assert!(json.get("roi").is_none());
        assert!(json.get("avg_rent").is_none());
    }

    #[test]
    fn threshold_is_exclusive() {
        let estimates = vec![estimate(0.5, 0.0, 12.0)];
        let point = [0.0, 0.0];
        assert!(nearest_estimate(point, &estimates, &MatchConfig { max_distance_deg: 0.5 }).is_none());
        assert!(nearest_estimate(point, &estimates, &MatchConfig { max_distance_deg: 0.51 }).is_some());
    }

    #[test]
    fn malformed_outlines_pass_through_unchanged() {
        let mut empty = square(2, 24.77, 60.17, 0.0002);
        empty.rings = vec![Vec::new()];
        let mut missing = square(3, 24.77, 60.17, 0.0002);
        missing.rings.clear();

        let estimates = vec![estimate(24.77, 60.17, 25.0)];
        let annotated =
            annotate_buildings(&[empty.clone(), missing.clone()], &estimates, &MatchConfig::default());
        assert_eq!(annotated, vec![empty, missing]);
    }

    #[test]
    fn no_estimates_means_no_annotations() {
        let annotated = annotate_buildings(&[square(1, 24.77, 60.17, 0.0002)], &[], &MatchConfig::default());
        assert!(annotated[0].roi.is_none());
    }
}
