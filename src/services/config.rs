// src/services/config.rs
use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::BoundingBox;

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001/api";
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_PROPERTY_LIMIT: usize = 1000;
/// Finest bucket grid; 10^decimals must stay representable when scaling
/// coordinates to integer keys.
pub const MAX_BUCKET_DECIMALS: u32 = 9;

/// Tuning for the ROI bucket grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiConfig {
    /// Decimal places kept when rounding coordinates; 3 is roughly 100 m.
    /// Values above [`MAX_BUCKET_DECIMALS`] are treated as that maximum.
    pub bucket_decimals: u32,
}

impl Default for RoiConfig {
    fn default() -> Self {
        RoiConfig { bucket_decimals: 3 }
    }
}

/// Tuning for attaching estimates to building outlines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// Planar distance in degrees; a match must be strictly closer.
    pub max_distance_deg: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig { max_distance_deg: 0.01 }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend_url: String,
    pub overpass_url: String,
    pub property_limit: usize,
    pub roi: RoiConfig,
    pub matching: MatchConfig,
    /// Fixed building query area; derived from the loaded properties when unset.
    pub buildings_bbox: Option<BoundingBox>,
    pub histogram_bins: usize,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            property_limit: DEFAULT_PROPERTY_LIMIT,
            roi: RoiConfig::default(),
            matching: MatchConfig::default(),
            buildings_bbox: None,
            histogram_bins: 10,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up `.env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup, falling back to defaults with a warning
    /// when a value does not parse.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = parse_or(&lookup, "PORT", defaults.port);
        let backend_url = lookup("BACKEND_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.backend_url);
        let overpass_url = lookup("OVERPASS_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.overpass_url);
        let property_limit = parse_or(&lookup, "PROPERTY_LIMIT", defaults.property_limit);

        let bucket_decimals = parse_or(&lookup, "ROI_BUCKET_DECIMALS", defaults.roi.bucket_decimals);
        let bucket_decimals = if bucket_decimals > MAX_BUCKET_DECIMALS {
            warn!(
                "ROI_BUCKET_DECIMALS={} is too fine, using {}",
                bucket_decimals, MAX_BUCKET_DECIMALS
            );
            MAX_BUCKET_DECIMALS
        } else {
            bucket_decimals
        };

        let max_distance_deg = parse_or(
            &lookup,
            "BUILDING_MATCH_MAX_DEG",
            defaults.matching.max_distance_deg,
        );
        let max_distance_deg = if max_distance_deg.is_finite() && max_distance_deg > 0.0 {
            max_distance_deg
        } else {
            warn!("BUILDING_MATCH_MAX_DEG must be positive, defaulting to {}", defaults.matching.max_distance_deg);
            defaults.matching.max_distance_deg
        };

        let buildings_bbox = lookup("BUILDINGS_BBOX")
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| match raw.parse::<BoundingBox>() {
                Ok(bbox) => Some(bbox),
                Err(e) => {
                    warn!("Ignoring BUILDINGS_BBOX: {}", e);
                    None
                }
            });

        let histogram_bins = parse_or(&lookup, "HISTOGRAM_BINS", defaults.histogram_bins).max(1);
        let timeout_secs = parse_or(&lookup, "HTTP_TIMEOUT_SECS", defaults.http_timeout.as_secs());

        Config {
            port,
            backend_url,
            overpass_url,
            property_limit,
            roi: RoiConfig { bucket_decimals },
            matching: MatchConfig { max_distance_deg },
            buildings_bbox,
            histogram_bins,
            http_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("${} is not valid ('{}'), defaulting to {}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3030);
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.property_limit, 1000);
        assert_eq!(config.roi.bucket_decimals, 3);
        assert_eq!(config.matching.max_distance_deg, 0.01);
        assert!(config.buildings_bbox.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("BACKEND_URL", "https://example.test/api/"),
            ("ROI_BUCKET_DECIMALS", "4"),
            ("BUILDING_MATCH_MAX_DEG", "0.05"),
            ("BUILDINGS_BBOX", "60.14,24.60,60.25,24.90"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.backend_url, "https://example.test/api");
        assert_eq!(config.roi.bucket_decimals, 4);
        assert_eq!(config.matching.max_distance_deg, 0.05);
        assert_eq!(config.buildings_bbox.map(|b| b.north), Some(60.25));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("BUILDING_MATCH_MAX_DEG", "-1"),
            ("BUILDINGS_BBOX", "nope"),
            ("HISTOGRAM_BINS", "0"),
        ]);
        assert_eq!(config.port, 3030);
        assert_eq!(config.matching.max_distance_deg, 0.01);
        assert!(config.buildings_bbox.is_none());
        assert_eq!(config.histogram_bins, 1);
    }
}
