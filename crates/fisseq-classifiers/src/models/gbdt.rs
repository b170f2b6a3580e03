use std::fmt;

use anyhow::bail;
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{two_class_proba, BinaryClassifier, ClassifierTrainer};
use crate::models::utils::{check_training_input, log_loss};

/// Gradient Boosting Decision Tree (GBDT) classifier
#[derive(Serialize, Deserialize)]
pub struct GBDTClassifier {
    model: GBDT,
    n_features: usize,
}

impl fmt::Debug for GBDTClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GBDTClassifier")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl GBDTClassifier {
    /// Raw boosted margins, one per row.
    pub fn decision_function(&self, x: &Array2<f64>) -> Vec<f32> {
        let mut test_x = DataVec::new();
        for row in x.rows() {
            let test_row = row.iter().map(|&v| v as f32).collect();
            test_x.push(Data::new_training_data(test_row, 1.0, 0.0, None));
        }
        self.model.decision_function(&test_x)
    }
}

impl BinaryClassifier for GBDTClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        // Log-likelihood loss is fitted on {-1, 1} labels with the 2F link.
        let margins = self.decision_function(x);
        two_class_proba(
            margins
                .into_iter()
                .map(|m| 1.0 / (1.0 + (-2.0 * m as f64).exp())),
        )
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

/// Fits `GBDTClassifier`s from a `ModelConfig` holding `ModelType::GBDT`.
#[derive(Debug, Clone)]
pub struct GBDTTrainer {
    params: ModelConfig,
}

impl GBDTTrainer {
    pub fn new(params: ModelConfig) -> Self {
        GBDTTrainer { params }
    }
}

impl ClassifierTrainer for GBDTTrainer {
    type Model = GBDTClassifier;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[bool],
        x_eval: &Array2<f64>,
        y_eval: &[bool],
        sample_weight: Option<&[f64]>,
    ) -> anyhow::Result<GBDTClassifier> {
        check_training_input(x, y, sample_weight)?;
        let feature_size = x.ncols();

        let ModelType::GBDT {
            max_depth,
            num_boost_round,
            debug,
            training_optimization_level,
            loss_type,
        } = &self.params.model_type
        else {
            bail!(
                "Expected ModelType::GBDT params, got {:?}",
                self.params.model_type
            );
        };

        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.params.learning_rate);
        config.set_max_depth(*max_depth);
        config.set_iterations(*num_boost_round as usize);
        config.set_debug(*debug);
        config.set_training_optimization_level(*training_optimization_level);
        config.set_loss(loss_type);

        let mut gbdt = GBDT::new(&config);

        let mut train_x = DataVec::with_capacity(x.nrows());
        for (i, row) in x.rows().into_iter().enumerate() {
            let train_row = row.iter().map(|&v| v as f32).collect();
            let weight = sample_weight.map_or(1.0, |w| w[i] as f32);
            let label = if y[i] { 1.0 } else { -1.0 };
            train_x.push(Data::new_training_data(train_row, weight, label, None));
        }

        gbdt.fit(&mut train_x);

        let classifier = GBDTClassifier {
            model: gbdt,
            n_features: feature_size,
        };

        if x_eval.nrows() > 0 {
            let p_eval = classifier.predict_proba(x_eval);
            log::debug!(
                "GBDT fitted on {} rows; eval log-loss {:.4} over {} rows",
                x.nrows(),
                log_loss(&p_eval.column(1).to_vec(), y_eval),
                x_eval.nrows()
            );
        }

        Ok(classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gbdt_classifier_separates_classes() {
        // 10 samples, feature 0 separates the classes perfectly
        let x = Array2::from_shape_fn((10, 3), |(r, c)| match c {
            0 => if r < 5 { -1.0 - r as f64 } else { 1.0 + r as f64 },
            1 => 5.0,
            _ => (r % 3) as f64,
        });
        let y: Vec<bool> = (0..10).map(|r| r >= 5).collect();

        let params = ModelConfig {
            learning_rate: 0.1,
            model_type: ModelType::GBDT {
                max_depth: 3,
                num_boost_round: 20,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            },
        };

        let trainer = GBDTTrainer::new(params);
        let model = trainer.fit(&x, &y, &x, &y, None).unwrap();
        let proba = model.predict_proba(&x);

        assert_eq!(proba.dim(), (10, 2));
        assert_eq!(model.n_features(), Some(3));
        for r in 0..10 {
            assert!((proba[(r, 0)] + proba[(r, 1)] - 1.0).abs() < 1e-9);
        }
        let mean = |want: bool| {
            let rows: Vec<f64> = (0..10).filter(|&r| y[r] == want).map(|r| proba[(r, 1)]).collect();
            rows.iter().sum::<f64>() / rows.len() as f64
        };
        assert!(mean(true) > mean(false));
    }

    #[test]
    fn rejects_non_gbdt_params() {
        let trainer = GBDTTrainer::new(ModelConfig::stump());
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let y = [false, true];
        assert!(trainer.fit(&x, &y, &x, &y, None).is_err());
    }
}
