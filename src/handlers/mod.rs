pub mod dashboard;
pub mod data;
pub mod error;
