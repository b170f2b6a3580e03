use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{BinaryClassifier, ClassifierTrainer};
use crate::models::gbdt::{GBDTClassifier, GBDTTrainer};
use crate::models::stump::{StumpClassifier, StumpTrainer};

/// A fitted model of any supported kind; the persisted registry format.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum FittedModel {
    Gbdt(GBDTClassifier),
    Stump(StumpClassifier),
}

impl FittedModel {
    pub fn as_stump(&self) -> Option<&StumpClassifier> {
        match self {
            FittedModel::Stump(stump) => Some(stump),
            FittedModel::Gbdt(_) => None,
        }
    }
}

impl BinaryClassifier for FittedModel {
    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            FittedModel::Gbdt(model) => model.predict_proba(x),
            FittedModel::Stump(model) => model.predict_proba(x),
        }
    }

    fn n_features(&self) -> Option<usize> {
        match self {
            FittedModel::Gbdt(model) => model.n_features(),
            FittedModel::Stump(model) => model.n_features(),
        }
    }

    fn name(&self) -> &str {
        match self {
            FittedModel::Gbdt(model) => model.name(),
            FittedModel::Stump(model) => model.name(),
        }
    }
}

/// Trainer dispatching on `ModelConfig::model_type`.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    params: ModelConfig,
}

/// Build a trainer from a `ModelConfig`.
pub fn build_trainer(params: ModelConfig) -> ModelTrainer {
    ModelTrainer { params }
}

impl ClassifierTrainer for ModelTrainer {
    type Model = FittedModel;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[bool],
        x_eval: &Array2<f64>,
        y_eval: &[bool],
        sample_weight: Option<&[f64]>,
    ) -> anyhow::Result<FittedModel> {
        match self.params.model_type {
            ModelType::GBDT { .. } => GBDTTrainer::new(self.params.clone())
                .fit(x, y, x_eval, y_eval, sample_weight)
                .map(FittedModel::Gbdt),
            ModelType::Stump { .. } => StumpTrainer::new(&self.params)?
                .fit(x, y, x_eval, y_eval, sample_weight)
                .map(FittedModel::Stump),
        }
    }
}
