use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::data_handling::DEFAULT_WT_KEY;

/// Central configuration for models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model types and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        debug: bool,
        training_optimization_level: u8,
        loss_type: String,
    },
    /// A single split on a single feature.
    Stump { min_leaf_size: usize },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 100,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        }
    }
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::GBDT { .. } => "gbdt",
            ModelType::Stump { .. } => "stump",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            "stump" => Ok(ModelType::Stump { min_leaf_size: 1 }),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of: gbdt, stump",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }

    /// Configuration used by single-feature runs.
    pub fn stump() -> Self {
        Self {
            learning_rate: 1.0,
            model_type: ModelType::Stump { min_leaf_size: 1 },
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Settings for the reference attribution engine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AttributionConfig {
    /// Feature orderings sampled per row.
    pub num_permutations: usize,
    /// Emit one attribution slice per class instead of the positive class only.
    pub per_class_output: bool,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            num_permutations: 32,
            per_class_output: false,
        }
    }
}

/// Parameters of one one-vs-wild-type run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OvwtConfig {
    pub model: ModelConfig,
    pub attribution: AttributionConfig,
    pub wt_key: String,
    /// Seed for every shuffle and subsample performed during the run.
    pub seed: u64,
    /// Shuffle each split's label column before training (null baseline).
    pub permute_labels: bool,
    pub compute_attributions: bool,
    pub report: bool,
    /// Only read by wild-type-vs-wild-type control runs.
    pub control: ControlConfig,
}

impl Default for OvwtConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            attribution: AttributionConfig::default(),
            wt_key: DEFAULT_WT_KEY.to_string(),
            seed: 42,
            permute_labels: false,
            compute_attributions: true,
            report: true,
            control: ControlConfig::default(),
        }
    }
}

/// Parameters of the wild-type versus wild-type control experiment.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub num_iters: usize,
    pub sample_proportion: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            num_iters: 100,
            sample_proportion: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_from_str() {
        assert_eq!("GBDT".parse::<ModelType>().unwrap().name(), "gbdt");
        assert_eq!("stump".parse::<ModelType>().unwrap().name(), "stump");
        assert!("random_forest".parse::<ModelType>().is_err());
    }

    #[test]
    fn ovwt_config_fills_missing_fields_with_defaults() {
        let cfg: OvwtConfig = serde_json::from_str(r#"{ "seed": 7, "wt_key": "wild" }"#).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.wt_key, "wild");
        assert_eq!(cfg.model, ModelConfig::default());
        assert!(cfg.compute_attributions);
        assert_eq!(cfg.control.num_iters, 100);
    }

    #[test]
    fn model_config_round_trips_json() {
        let cfg = ModelConfig::stump();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("Stump"));
        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
