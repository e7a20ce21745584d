// src/services/mod.rs
pub mod api_client;
pub mod config;
pub mod dashboard;
pub mod filter;
pub mod matcher;
pub mod overpass;
pub mod roi;
pub mod stats;

pub type Result<T> = std::result::Result<T, crate::BoxError>;
