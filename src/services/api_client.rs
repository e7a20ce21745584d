// src/services/api_client.rs
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

use crate::models::{ImportResult, Property, RegionStats};
use crate::services::filter::PropertyFilter;
use super::Result;

/// The property store's REST API.
#[async_trait]
pub trait PropertyBackend: Send + Sync {
    async fn fetch_properties(&self, filter: &PropertyFilter, limit: usize) -> Result<Vec<Property>>;
    async fn fetch_property_types(&self) -> Result<Vec<String>>;
    async fn fetch_sources(&self) -> Result<Vec<String>>;
    async fn fetch_region_stats(&self) -> Result<Vec<RegionStats>>;
    async fn upload_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<ImportResult>;
    async fn import_default_data(&self) -> Result<ImportResult>;
}

/// Non-2xx answer from the backend. `detail` is the backend's own message.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError {
    pub status: u16,
    pub detail: String,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// Pulls FastAPI-style `{"detail": "..."}` out of an error body, else keeps the raw text.
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| match value.get("detail") {
                Some(serde_json::Value::String(text)) => Some(text.clone()),
                Some(other) => Some(other.to_string()),
                None => None,
            })
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.to_string()
                } else {
                    trimmed.to_string()
                }
            });

        BackendError { status: status.as_u16(), detail }
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` includes the API prefix, e.g. `http://localhost:8001/api`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(ApiClient { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))?)
    }

    pub fn properties_url(&self, filter: &PropertyFilter, limit: usize) -> Result<Url> {
        let mut url = self.endpoint("properties")?;
        url.query_pairs_mut()
            .extend_pairs(filter.to_query_pairs())
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = BackendError::from_body(status, &body);
            error!("Backend returned {}: {}", status, err.detail);
            return Err(err.into());
        }
        Ok(response.json::<T>().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl PropertyBackend for ApiClient {
    async fn fetch_properties(&self, filter: &PropertyFilter, limit: usize) -> Result<Vec<Property>> {
        let url = self.properties_url(filter, limit)?;
        info!("Fetching properties: {}", url);
        let properties: Vec<Property> = self.get_json(url).await?;
        info!("Fetched {} properties", properties.len());
        Ok(properties)
    }

    async fn fetch_property_types(&self) -> Result<Vec<String>> {
        self.get_json(self.endpoint("property-types")?).await
    }

    async fn fetch_sources(&self) -> Result<Vec<String>> {
        self.get_json(self.endpoint("property-sources")?).await
    }

    async fn fetch_region_stats(&self) -> Result<Vec<RegionStats>> {
        self.get_json(self.endpoint("properties/stats/regions")?).await
    }

    async fn upload_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<ImportResult> {
        info!("Uploading {} ({} bytes)", file_name, contents.len());
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("properties/upload-csv")?)
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn import_default_data(&self) -> Result<ImportResult> {
        info!("Requesting default dataset import");
        let response = self
            .client
            .post(self.endpoint("import-default-data")?)
            .send()
            .await?;
        Self::read_json(response).await
    }
}
