//! Model loading, inference and attribution components

pub mod aggregator;
pub mod batch;
pub mod explainer;
pub mod inference;
pub mod loader;
pub mod predictor;
pub mod ranking;
pub mod registry;
pub mod tree;

pub use aggregator::PredictionAggregator;
pub use batch::BatchPredictor;
pub use explainer::{Explainer, PersistedExplainer, TreeExplainer};
pub use inference::InferenceEngine;
pub use loader::ModelLoader;
pub use predictor::Regressor;
pub use registry::{LoadedRegistry, ModelRegistry, RegistryState};
pub use tree::TreeEnsemble;
