//! Cardio Risk AI
//!
//! Heart disease risk prediction service. Serves a gradient-boosted tree
//! classifier trained with XGBoost, explains each prediction with exact
//! TreeSHAP, and puts patients in context against a reference cohort.

pub mod api;
pub mod clinical;
pub mod cohort;
pub mod config;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
