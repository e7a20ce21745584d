// src/models.rs
use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;

fn default_currency() -> String {
    "EUR".to_string()
}

/// A listing as returned by the property backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub price_currency: String,
    #[serde(default)]
    pub property_type: String,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub rooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    /// true = sale listing, false = rental, None = unknown
    #[serde(default)]
    pub is_for_sale: Option<bool>,
}

impl Property {
    /// `(lon, lat)` when the location carries usable coordinates.
    pub fn lon_lat(&self) -> Option<(f64, f64)> {
        self.location.lon_lat()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// GeoJSON order: `[longitude, latitude]`
    #[serde(default)]
    pub coordinates: Vec<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Location {
    pub fn lon_lat(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some((*lon, *lat)),
            _ => None,
        }
    }

    /// Address text, treating blank strings as missing.
    pub fn address_text(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }
}

/// Row of `GET /properties/stats/regions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub region_name: String,
    pub avg_sale_price: Option<f64>,
    pub avg_rent_price: Option<f64>,
    pub roi_years: Option<f64>,
    #[serde(default)]
    pub property_count: u64,
    #[serde(default)]
    pub sale_count: u64,
    #[serde(default)]
    pub rent_count: u64,
}

/// Response body of the CSV upload and default-data import endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub message: String,
}

/// Investment estimate for one rounded-coordinate bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiEstimate {
    /// Bucket centre, `[longitude, latitude]`
    pub coordinates: [f64; 2],
    pub avg_sale_price: f64,
    /// Average monthly rent
    pub avg_rent: f64,
    pub roi_years: f64,
    pub address: String,
    pub sale_count: usize,
    pub rental_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Way,
    Relation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildingTags {
    pub name: Option<String>,
    /// Value of the OSM `building` tag (`yes`, `apartments`, ...)
    pub building: Option<String>,
    pub levels: Option<u32>,
    /// Metres
    pub height: Option<f64>,
    pub address: Option<String>,
}

/// ROI fields copied onto a building from its nearest estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiAnnotation {
    pub roi: f64,
    pub avg_sale_price: f64,
    pub avg_rent: f64,
}

impl From<&RoiEstimate> for RoiAnnotation {
    fn from(estimate: &RoiEstimate) -> Self {
        RoiAnnotation {
            roi: estimate.roi_years,
            avg_sale_price: estimate.avg_sale_price,
            avg_rent: estimate.avg_rent,
        }
    }
}

/// Building footprint from OpenStreetMap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingFeature {
    pub id: i64,
    pub kind: ElementKind,
    /// Closed rings of `[lon, lat]`; the first ring is the outline.
    pub rings: Vec<Vec<[f64; 2]>>,
    pub tags: BuildingTags,
    #[serde(flatten)]
    pub roi: Option<RoiAnnotation>,
}

impl BuildingFeature {
    pub fn outer_ring(&self) -> Option<&[[f64; 2]]> {
        self.rings
            .first()
            .map(Vec::as_slice)
            .filter(|ring| !ring.is_empty())
    }
}

/// Geographic box in degrees, in Overpass order (south, west, north, east).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Smallest box around all located properties, grown by `padding` degrees.
    pub fn covering(properties: &[Property], padding: f64) -> Option<Self> {
        let mut points = properties.iter().filter_map(Property::lon_lat);
        let (lon, lat) = points.next()?;
        let mut bbox = BoundingBox { south: lat, west: lon, north: lat, east: lon };
        for (lon, lat) in points {
            bbox.south = bbox.south.min(lat);
            bbox.north = bbox.north.max(lat);
            bbox.west = bbox.west.min(lon);
            bbox.east = bbox.east.max(lon);
        }
        Some(BoundingBox {
            south: bbox.south - padding,
            west: bbox.west - padding,
            north: bbox.north + padding,
            east: bbox.east + padding,
        })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    /// Parses `south,west,north,east`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid bounding box '{}': {}", s, e))?;

        match values.as_slice() {
            [south, west, north, east] if south < north && west < east => Ok(BoundingBox {
                south: *south,
                west: *west,
                north: *north,
                east: *east,
            }),
            [_, _, _, _] => Err(format!("bounding box '{}' has south >= north or west >= east", s)),
            _ => Err(format!("bounding box '{}' needs four values: south,west,north,east", s)),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
}

/// Minimal GeoJSON output for the building-outline layer.
#[derive(Serialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Feature {
        id: String,
        properties: serde_json::Map<String, serde_json::Value>,
        geometry: Geometry,
    },
    FeatureCollection {
        features: Vec<GeoJson>,
    },
}

impl GeoJson {
    pub fn from_buildings(buildings: &[BuildingFeature]) -> Self {
        let features = buildings
            .iter()
            .filter(|b| b.outer_ring().is_some())
            .map(GeoJson::from_building)
            .collect();
        GeoJson::FeatureCollection { features }
    }

    fn from_building(building: &BuildingFeature) -> Self {
        use serde_json::{json, Map, Value};

        let mut properties = Map::new();
        let tags = &building.tags;
        let optional = [
            ("name", tags.name.clone().map(Value::from)),
            ("building", tags.building.clone().map(Value::from)),
            ("levels", tags.levels.map(Value::from)),
            ("height", tags.height.map(Value::from)),
            ("address", tags.address.clone().map(Value::from)),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                properties.insert(key.to_string(), value);
            }
        }
        if let Some(roi) = &building.roi {
            properties.insert("roi".to_string(), json!(roi.roi));
            properties.insert("avg_sale_price".to_string(), json!(roi.avg_sale_price));
            properties.insert("avg_rent".to_string(), json!(roi.avg_rent));
        }

        let kind = match building.kind {
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        };

        GeoJson::Feature {
            id: format!("{}/{}", kind, building.id),
            properties,
            geometry: Geometry::Polygon {
                coordinates: building.rings.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_backend_property() {
        let raw = json!({
            "_id": "65f0",
            "id": "a1",
            "title": "Two-room flat",
            "price": 1200.0,
            "property_type": "Apartment",
            "area": 48.5,
            "rooms": 2,
            "bathrooms": null,
            "location": {
                "type": "Point",
                "coordinates": [24.77, 60.17],
                "address": "Tapiontori 1",
                "city": "Espoo",
                "region": "Tapiola",
                "postal_code": "02100"
            },
            "source": "csv_import",
            "url": null,
            "created_at": "2024-03-01T10:00:00",
            "is_for_sale": false
        });

        let property: Property = serde_json::from_value(raw).unwrap();
        assert_eq!(property.price_currency, "EUR");
        assert_eq!(property.lon_lat(), Some((24.77, 60.17)));
        assert_eq!(property.is_for_sale, Some(false));
        assert_eq!(property.location.region.as_deref(), Some("Tapiola"));
    }

    #[test]
    fn missing_listing_type_and_coordinates_are_tolerated() {
        let property: Property = serde_json::from_value(json!({
            "title": "Plot",
            "price": 50000,
            "location": { "address": "  " }
        }))
        .unwrap();

        assert_eq!(property.is_for_sale, None);
        assert_eq!(property.lon_lat(), None);
        assert_eq!(property.location.address_text(), None);
    }

    #[test]
    fn bounding_box_parses_and_rejects() {
        let bbox: BoundingBox = "60.14, 24.60, 60.25, 24.90".parse().unwrap();
        assert_eq!(bbox.south, 60.14);
        assert_eq!(bbox.east, 24.90);
        assert_eq!(bbox.to_string(), "60.14,24.6,60.25,24.9");

        assert!("60.25,24.60,60.14,24.90".parse::<BoundingBox>().is_err());
        assert!("60.14,24.60".parse::<BoundingBox>().is_err());
        assert!("a,b,c,d".parse::<BoundingBox>().is_err());
    }

    #[test]
    fn bounding_box_covers_located_properties_only() {
        let mut a: Property = serde_json::from_value(json!({"price": 1.0})).unwrap();
        a.location.coordinates = vec![24.70, 60.10];
        let mut b = a.clone();
        b.location.coordinates = vec![24.80, 60.20];
        let unlocated: Property = serde_json::from_value(json!({"price": 1.0})).unwrap();

        let bbox = BoundingBox::covering(&[a, unlocated.clone(), b], 0.0).unwrap();
        assert_eq!(bbox, BoundingBox { south: 60.10, west: 24.70, north: 60.20, east: 24.80 });
        assert!(BoundingBox::covering(&[unlocated], 0.01).is_none());
    }

    #[test]
    fn geojson_omits_roi_for_unmatched_buildings() {
        let building = BuildingFeature {
            id: 7,
            kind: ElementKind::Way,
            rings: vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
            tags: BuildingTags { name: Some("Hall".into()), ..Default::default() },
            roi: None,
        };
        let value = serde_json::to_value(GeoJson::from_buildings(&[building])).unwrap();

        assert_eq!(value["type"], "FeatureCollection");
        let feature = &value["features"][0];
        assert_eq!(feature["id"], "way/7");
        assert_eq!(feature["geometry"]["type"], "Polygon");
        assert_eq!(feature["properties"]["name"], "Hall");
        assert!(feature["properties"].get("roi").is_none());
    }
}
