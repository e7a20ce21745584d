// src/services/filter.rs
use log::warn;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::Property;

/// User-selected constraints. `None` means "no constraint" for every field,
/// including `is_for_sale`, where `Some(false)` means rentals only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilter {
    #[serde(deserialize_with = "blank_as_none")]
    pub price_min: Option<f64>,
    #[serde(deserialize_with = "blank_as_none")]
    pub price_max: Option<f64>,
    pub property_type: Option<String>,
    #[serde(deserialize_with = "blank_as_none")]
    pub area_min: Option<f64>,
    #[serde(deserialize_with = "blank_as_none")]
    pub area_max: Option<f64>,
    #[serde(deserialize_with = "blank_as_none")]
    pub rooms_min: Option<u32>,
    #[serde(deserialize_with = "blank_as_none")]
    pub rooms_max: Option<u32>,
    #[serde(deserialize_with = "blank_as_none")]
    pub is_for_sale: Option<bool>,
    pub source: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldValue<T> {
    Typed(T),
    Text(String),
}

/// Accepts typed JSON values as well as query-string text, where a form
/// sends an unset field as an empty value (`price_min=&is_for_sale=`).
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Option::<FieldValue<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FieldValue::Typed(value)) => Ok(Some(value)),
        Some(FieldValue::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(FieldValue::Text(text)) => text.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn within<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    // A bound on an attribute the listing does not have excludes it.
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

impl PropertyFilter {
    pub fn for_sale() -> Self {
        PropertyFilter { is_for_sale: Some(true), ..Default::default() }
    }

    pub fn rentals() -> Self {
        PropertyFilter { is_for_sale: Some(false), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.to_query_pairs().is_empty()
    }

    /// Backend query parameters for the supplied fields only.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(v) = self.price_min {
            pairs.push(("price_min", v.to_string()));
        }
        if let Some(v) = self.price_max {
            pairs.push(("price_max", v.to_string()));
        }
        if let Some(v) = non_blank(&self.property_type) {
            pairs.push(("property_type", v.to_string()));
        }
        if let Some(v) = self.area_min {
            pairs.push(("area_min", v.to_string()));
        }
        if let Some(v) = self.area_max {
            pairs.push(("area_max", v.to_string()));
        }
        if let Some(v) = self.rooms_min {
            pairs.push(("rooms_min", v.to_string()));
        }
        if let Some(v) = self.rooms_max {
            pairs.push(("rooms_max", v.to_string()));
        }
        if let Some(v) = self.is_for_sale {
            pairs.push(("is_for_sale", v.to_string()));
        }
        if let Some(v) = non_blank(&self.source) {
            pairs.push(("source", v.to_string()));
        }

        pairs
    }

    /// URL-encoded form of [`to_query_pairs`](Self::to_query_pairs), without a leading `?`.
    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(self.to_query_pairs()).unwrap_or_else(|e| {
            warn!("Failed to encode filter: {}", e);
            String::new()
        })
    }

    /// True when the property satisfies every supplied constraint (bounds inclusive).
    pub fn matches(&self, property: &Property) -> bool {
        if !within(Some(property.price), self.price_min, self.price_max) {
            return false;
        }
        if !within(property.area, self.area_min, self.area_max) {
            return false;
        }
        if !within(property.rooms, self.rooms_min, self.rooms_max) {
            return false;
        }
        if let Some(wanted) = non_blank(&self.property_type) {
            if property.property_type != wanted {
                return false;
            }
        }
        if let Some(wanted) = non_blank(&self.source) {
            if property.source != wanted {
                return false;
            }
        }
        match self.is_for_sale {
            Some(wanted) => property.is_for_sale == Some(wanted),
            None => true,
        }
    }

    pub fn apply(&self, properties: &[Property]) -> Vec<Property> {
        properties
            .iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect()
    }
}
