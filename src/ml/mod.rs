/// Machine learning core for heart disease risk prediction
///
/// This module provides:
/// - Derived clinical feature engineering
/// - Standardisation of numerical features
/// - XGBoost JSON model loading and native tree ensemble inference
/// - Exact TreeSHAP explanations
/// - The predictor service that owns the loaded artifacts

pub mod artifacts;
pub mod features;
pub mod forest;
pub mod scaler;
pub mod service;
pub mod shap;
pub mod xgboost;

pub use artifacts::ModelArtifacts;
pub use features::{compute_auto_fields, default_feature_names, EngineeredFeatures};
pub use forest::{sigmoid, Forest, Objective, Tree};
pub use scaler::{ScalingPlan, StandardScaler};
pub use service::{ModelInfo, PredictorService, RiskThresholds, ServiceStats};
pub use shap::{ShapValues, TreeExplainer};
pub use xgboost::XgbModel;
