// src/services/overpass.rs
use async_trait::async_trait;
use log::{debug, error, info};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use crate::models::{BoundingBox, BuildingFeature, BuildingTags, ElementKind};
use super::Result;

/// Anything that can supply building footprints for an area.
#[async_trait]
pub trait BuildingSource: Send + Sync {
    async fn fetch_buildings(&self, bbox: &BoundingBox) -> Result<Vec<BuildingFeature>>;
}

#[derive(Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    nodes: Option<Vec<i64>>,
    members: Option<Vec<OverpassMember>>,
    tags: Option<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct OverpassMember {
    #[serde(rename = "type")]
    member_type: String,
    #[serde(rename = "ref")]
    reference: i64,
    #[serde(default)]
    role: String,
}

/// Overpass QL for building ways and relations inside `bbox`, with member ways and nodes.
pub fn building_query(bbox: &BoundingBox) -> String {
    let BoundingBox { south, west, north, east } = *bbox;
    format!(
        "[out:json][timeout:25];\
        (\
            way[\"building\"]({south},{west},{north},{east});\
            relation[\"building\"]({south},{west},{north},{east});\
        );\
        out body;\
        >;\
        out skel qt;"
    )
}

pub struct OverpassClient {
    client: Client,
    url: String,
}

impl OverpassClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("location_dashboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(OverpassClient { client, url: url.into() })
    }
}

#[async_trait]
impl BuildingSource for OverpassClient {
    async fn fetch_buildings(&self, bbox: &BoundingBox) -> Result<Vec<BuildingFeature>> {
        info!("Fetching buildings from {} for bbox {}", self.url, bbox);

        let response = self
            .client
            .post(&self.url)
            .form(&[("data", building_query(bbox))])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("Overpass returned {}: {}", status, body);
            return Err(format!("Overpass request failed with status {}", status).into());
        }

        let buildings = parse_buildings(&body)?;
        info!("Received {} building outlines", buildings.len());
        Ok(buildings)
    }
}

/// Rebuilds building polygons from an Overpass JSON response.
pub fn parse_buildings(response_text: &str) -> Result<Vec<BuildingFeature>> {
    let parsed: OverpassResponse = serde_json::from_str(response_text)
        .map_err(|e| format!("invalid Overpass JSON: {}", e))?;

    let mut node_map: HashMap<i64, [f64; 2]> = HashMap::new();
    let mut way_nodes: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut tagged = Vec::new();

    for element in parsed.elements {
        match element.element_type.as_str() {
            "node" => {
                if let (Some(lat), Some(lon)) = (element.lat, element.lon) {
                    node_map.insert(element.id, [lon, lat]);
                }
            }
            "way" => {
                if let Some(nodes) = element.nodes.clone() {
                    way_nodes.insert(element.id, nodes);
                }
                if is_building(&element) {
                    tagged.push(element);
                }
            }
            "relation" => {
                if is_building(&element) {
                    tagged.push(element);
                }
            }
            _ => {}
        }
    }

    let mut buildings = Vec::new();
    let mut dropped = 0usize;
    for element in tagged {
        let (kind, rings) = match element.element_type.as_str() {
            "way" => {
                let ring = way_nodes
                    .get(&element.id)
                    .and_then(|nodes| resolve_ring(nodes, &node_map));
                (ElementKind::Way, ring.into_iter().collect::<Vec<_>>())
            }
            _ => {
                let rings = element
                    .members
                    .iter()
                    .flatten()
                    .filter(|m| m.member_type == "way" && (m.role == "outer" || m.role.is_empty()))
                    .filter_map(|m| way_nodes.get(&m.reference))
                    .filter_map(|nodes| resolve_ring(nodes, &node_map))
                    .collect::<Vec<_>>();
                (ElementKind::Relation, rings)
            }
        };

        if rings.is_empty() {
            dropped += 1;
            continue;
        }

        buildings.push(BuildingFeature {
            id: element.id,
            kind,
            rings,
            tags: building_tags(element.tags.as_ref()),
            roi: None,
        });
    }

    if dropped > 0 {
        debug!("Dropped {} building elements without a usable outline", dropped);
    }
    Ok(buildings)
}

fn is_building(element: &OverpassElement) -> bool {
    element
        .tags
        .as_ref()
        .map_or(false, |tags| tags.contains_key("building"))
}

/// Node ids to a closed ring; `None` when fewer than three distinct points resolve.
fn resolve_ring(node_ids: &[i64], node_map: &HashMap<i64, [f64; 2]>) -> Option<Vec<[f64; 2]>> {
    let mut ring: Vec<[f64; 2]> = Vec::with_capacity(node_ids.len() + 1);
    for id in node_ids {
        let Some(point) = node_map.get(id).copied() else {
            continue;
        };
        if ring.last() != Some(&point) {
            ring.push(point);
        }
    }

    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return None;
    }
    let first = ring[0];
    ring.push(first);
    Some(ring)
}

fn leading_number(value: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"^\s*(\d+(?:[.,]\d+)?)").expect("valid regex"));
    re.captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
}

fn building_tags(tags: Option<&HashMap<String, String>>) -> BuildingTags {
    let Some(tags) = tags else {
        return BuildingTags::default();
    };
    let text = |key: &str| {
        tags.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let address = match (text("addr:street"), text("addr:housenumber")) {
        (Some(street), Some(number)) => Some(format!("{} {}", street, number)),
        (Some(street), None) => Some(street),
        _ => None,
    };

    BuildingTags {
        name: text("name"),
        building: text("building"),
        levels: tags
            .get("building:levels")
            .and_then(|v| leading_number(v))
            .map(|v| v.trunc() as u32),
        height: tags.get("height").and_then(|v| leading_number(v)),
        address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response() -> String {
        json!({
            "elements": [
                {
                    "type": "way", "id": 100,
                    "nodes": [1, 2, 3, 4, 1],
                    "tags": {
                        "building": "apartments",
                        "name": "Tower A",
                        "building:levels": "8",
                        "height": "24.5 m",
                        "addr:street": "Tapiontori",
                        "addr:housenumber": "3"
                    }
                },
                { "type": "way", "id": 101, "nodes": [1, 2], "tags": { "building": "yes" } },
                {
                    "type": "relation", "id": 500,
                    "members": [
                        { "type": "way", "ref": 200, "role": "outer" },
                        { "type": "way", "ref": 201, "role": "inner" }
                    ],
                    "tags": { "type": "multipolygon", "building": "office" }
                },
                { "type": "way", "id": 200, "nodes": [5, 6, 7] },
                { "type": "way", "id": 201, "nodes": [1, 2, 3] },
                { "type": "way", "id": 300, "nodes": [5, 6, 7], "tags": { "highway": "service" } },
                { "type": "node", "id": 1, "lat": 60.170, "lon": 24.770 },
                { "type": "node", "id": 2, "lat": 60.170, "lon": 24.771 },
                { "type": "node", "id": 3, "lat": 60.171, "lon": 24.771 },
                { "type": "node", "id": 4, "lat": 60.171, "lon": 24.770 },
                { "type": "node", "id": 5, "lat": 60.180, "lon": 24.780 },
                { "type": "node", "id": 6, "lat": 60.180, "lon": 24.781 },
                { "type": "node", "id": 7, "lat": 60.181, "lon": 24.781 }
            ]
        })
        .to_string()
    }

    #[test]
    fn query_lists_bbox_in_overpass_order() {
        let query = building_query(&BoundingBox { south: 60.1, west: 24.6, north: 60.3, east: 24.9 });
        assert!(query.starts_with("[out:json]"));
        assert!(query.contains("way[\"building\"](60.1,24.6,60.3,24.9);"));
        assert!(query.contains("relation[\"building\"](60.1,24.6,60.3,24.9);"));
    }

    #[test]
    fn rebuilds_ways_and_relations() {
        let buildings = parse_buildings(&sample_response()).unwrap();
        assert_eq!(buildings.len(), 2);

        let tower = &buildings[0];
        assert_eq!((tower.id, tower.kind), (100, ElementKind::Way));
        assert_eq!(tower.rings[0].len(), 5);
        assert_eq!(tower.rings[0].first(), tower.rings[0].last());
        assert_eq!(tower.rings[0][0], [24.770, 60.170]);
        assert_eq!(tower.tags.name.as_deref(), Some("Tower A"));
        assert_eq!(tower.tags.levels, Some(8));
        assert_eq!(tower.tags.height, Some(24.5));
        assert_eq!(tower.tags.address.as_deref(), Some("Tapiontori 3"));
        assert!(tower.roi.is_none());

        let office = &buildings[1];
        assert_eq!((office.id, office.kind), (500, ElementKind::Relation));
        assert_eq!(office.rings.len(), 1);
        // open way gets closed
        assert_eq!(office.rings[0].len(), 4);
        assert_eq!(office.rings[0][3], [24.780, 60.180]);
        assert_eq!(office.tags.building.as_deref(), Some("office"));
    }

    #[test]
    fn unknown_nodes_are_skipped() {
        let body = json!({
            "elements": [
                { "type": "way", "id": 1, "nodes": [1, 2, 99, 3], "tags": { "building": "yes" } },
                { "type": "way", "id": 2, "nodes": [1, 98, 97], "tags": { "building": "yes" } },
                { "type": "node", "id": 1, "lat": 1.0, "lon": 1.0 },
                { "type": "node", "id": 2, "lat": 1.0, "lon": 2.0 },
                { "type": "node", "id": 3, "lat": 2.0, "lon": 2.0 }
            ]
        })
        .to_string();

        let buildings = parse_buildings(&body).unwrap();
        assert_eq!(buildings.len(), 1);
        assert_eq!(buildings[0].rings[0], vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]]);
    }

    #[test]
    fn tag_numbers_are_lenient() {
        assert_eq!(leading_number("12"), Some(12.0));
        assert_eq!(leading_number(" 7,5 m"), Some(7.5));
        assert_eq!(leading_number("3;4"), Some(3.0));
        assert_eq!(leading_number("tall"), None);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_buildings("<html>rate limited</html>").is_err());
        assert!(parse_buildings("{}").unwrap().is_empty());
    }
}
