// src/services/dashboard.rs
//
// Application state for one dashboard session. Every section remembers its own
// load status so a failed fetch leaves the last good data in place, and the
// dependent sections (aggregates, ROI, buildings) are only computed from a
// property list whose fetch has completed.
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::models::{BoundingBox, BuildingFeature, ImportResult, Property, RegionStats, RoiEstimate};
use crate::services::api_client::PropertyBackend;
use crate::services::config::{Config, RoiConfig};
use crate::services::filter::PropertyFilter;
use crate::services::matcher::annotate_buildings;
use crate::services::overpass::BuildingSource;
use crate::services::roi::estimate_roi;
use super::Result;

/// Padding around the property extent when no building area is configured.
pub const BBOX_PADDING_DEG: f64 = 0.005;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Failed { error: String },
}

#[derive(Debug, Clone, Default)]
pub struct Section<T> {
    pub status: LoadStatus,
    pub data: T,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for LoadStatus {
    fn default() -> Self {
        LoadStatus::Idle
    }
}

impl<T> Section<T> {
    fn start(&mut self) {
        self.status = LoadStatus::Loading;
    }

    fn resolve(&mut self, data: T) {
        self.data = data;
        self.status = LoadStatus::Ready;
        self.updated_at = Some(Utc::now());
    }

    /// Marks the failure but keeps whatever data was there before.
    fn fail(&mut self, error: impl Into<String>) {
        self.status = LoadStatus::Failed { error: error.into() };
    }

    fn settle(&mut self, result: Result<T>, what: &str) {
        match result {
            Ok(data) => self.resolve(data),
            Err(e) => {
                error!("Failed to fetch {}: {}", what, e);
                self.fail(e.to_string());
            }
        }
    }

    /// Data from the most recent fetch, only once that fetch has completed.
    pub fn ready(&self) -> Option<&T> {
        match self.status {
            LoadStatus::Ready => Some(&self.data),
            _ => None,
        }
    }

    /// Data from the last successful fetch, if there ever was one.
    pub fn loaded(&self) -> Option<&T> {
        self.updated_at.map(|_| &self.data)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionStatus {
    #[serde(flatten)]
    pub status: LoadStatus,
    pub count: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> Section<Vec<T>> {
    pub fn summary(&self) -> SectionStatus {
        SectionStatus {
            status: self.status.clone(),
            count: self.data.len(),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub filter: PropertyFilter,
    pub properties: SectionStatus,
    pub property_types: SectionStatus,
    pub sources: SectionStatus,
    pub regions: SectionStatus,
    pub roi: SectionStatus,
    pub buildings: SectionStatus,
}

#[derive(Debug, Default)]
pub struct DashboardState {
    /// Filter the current property list was fetched with.
    pub filter: PropertyFilter,
    pub properties: Section<Vec<Property>>,
    pub property_types: Section<Vec<String>>,
    pub sources: Section<Vec<String>>,
    pub regions: Section<Vec<RegionStats>>,
    pub roi: Section<Vec<RoiEstimate>>,
    pub buildings: Section<Vec<BuildingFeature>>,
    /// Unannotated outlines from the last Overpass fetch.
    building_cache: Option<(BoundingBox, Vec<BuildingFeature>)>,
}

impl DashboardState {
    /// Recomputes ROI from the property list. Does nothing (and returns false)
    /// unless the property fetch has completed.
    pub fn recompute_roi(&mut self, config: &RoiConfig) -> bool {
        let Some(properties) = self.properties.ready() else {
            return false;
        };
        let estimates = estimate_roi(properties, config);
        self.roi.resolve(estimates);
        true
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            filter: self.filter.clone(),
            properties: self.properties.summary(),
            property_types: self.property_types.summary(),
            sources: self.sources.summary(),
            regions: self.regions.summary(),
            roi: self.roi.summary(),
            buildings: self.buildings.summary(),
        }
    }
}

pub struct Dashboard {
    backend: Arc<dyn PropertyBackend>,
    building_source: Arc<dyn BuildingSource>,
    config: Config,
    state: RwLock<DashboardState>,
}

impl Dashboard {
    pub fn new(
        backend: Arc<dyn PropertyBackend>,
        building_source: Arc<dyn BuildingSource>,
        config: Config,
    ) -> Self {
        Dashboard {
            backend,
            building_source,
            config,
            state: RwLock::new(DashboardState::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read().await
    }

    pub async fn status(&self) -> StatusReport {
        self.state.read().await.status()
    }

    /// Fetches properties, then everything that depends on them.
    ///
    /// Returns an error only when the property fetch itself fails; in that case
    /// nothing else is fetched and all sections keep their previous data.
    pub async fn refresh(&self, filter: PropertyFilter) -> Result<StatusReport> {
        info!("Refreshing dashboard (filter: '{}')", filter.to_query_string());
        self.state.write().await.properties.start();

        let properties = match self
            .backend
            .fetch_properties(&filter, self.config.property_limit)
            .await
        {
            Ok(properties) => properties,
            Err(e) => {
                error!("Failed to fetch properties: {}", e);
                self.state.write().await.properties.fail(e.to_string());
                return Err(e);
            }
        };

        let bbox = self
            .config
            .buildings_bbox
            .or_else(|| BoundingBox::covering(&properties, BBOX_PADDING_DEG));

        let estimates = {
            let mut state = self.state.write().await;
            state.filter = filter;
            state.properties.resolve(properties);
            state.property_types.start();
            state.sources.start();
            state.regions.start();
            state.recompute_roi(&self.config.roi);
            state.roi.data.clone()
        };
        debug!("Computed {} ROI estimates", estimates.len());

        let (types, sources, regions) = tokio::join!(
            self.backend.fetch_property_types(),
            self.backend.fetch_sources(),
            self.backend.fetch_region_stats(),
        );
        {
            let mut state = self.state.write().await;
            state.property_types.settle(types, "property types");
            state.sources.settle(sources, "property sources");
            state.regions.settle(regions, "region statistics");
        }

        self.refresh_buildings(bbox, &estimates).await;

        Ok(self.status().await)
    }

    /// `bbox` comes from the property list this refresh fetched, never from
    /// shared state, which a concurrent refresh may have moved on.
    async fn refresh_buildings(&self, bbox: Option<BoundingBox>, estimates: &[RoiEstimate]) {
        let Some(bbox) = bbox else {
            debug!("No located properties and no configured area; skipping building fetch");
            self.state.write().await.buildings.resolve(Vec::new());
            return;
        };

        let cached = match &self.state.read().await.building_cache {
            Some((cached_bbox, outlines)) if *cached_bbox == bbox => Some(outlines.clone()),
            _ => None,
        };

        let outlines = match cached {
            Some(outlines) => {
                debug!("Reusing {} cached building outlines for {}", outlines.len(), bbox);
                outlines
            }
            None => {
                self.state.write().await.buildings.start();
                match self.building_source.fetch_buildings(&bbox).await {
                    Ok(outlines) => {
                        self.state.write().await.building_cache = Some((bbox, outlines.clone()));
                        outlines
                    }
                    Err(e) => {
                        error!("Failed to fetch buildings: {}", e);
                        self.state.write().await.buildings.fail(e.to_string());
                        return;
                    }
                }
            }
        };

        let annotated = annotate_buildings(&outlines, estimates, &self.config.matching);
        self.state.write().await.buildings.resolve(annotated);
    }

    /// Sends a CSV file to the backend and reloads on success. The backend's
    /// message is returned unchanged either way.
    pub async fn upload_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<ImportResult> {
        let result = self.backend.upload_csv(file_name, contents).await?;
        info!("CSV import finished: {}", result.message);
        self.reload_after_import().await;
        Ok(result)
    }

    pub async fn import_default_data(&self) -> Result<ImportResult> {
        let result = self.backend.import_default_data().await?;
        info!("Default data import finished: {}", result.message);
        self.reload_after_import().await;
        Ok(result)
    }

    async fn reload_after_import(&self) {
        if let Err(e) = self.refresh(PropertyFilter::default()).await {
            warn!("Import succeeded but reloading properties failed: {}", e);
        }
    }
}
