pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod correlation;
pub mod datafusion_engine;
pub mod dataset_manager;
pub mod domain;
pub mod engine;
pub mod error;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod schema;

pub use engine::AnalysisEngine;
pub use error::AnalysisError;
