//! Depth-one decision trees splitting on a single feature.
//!
//! A stump answers "which one feature best separates this variant from the
//! wild type", which is what single-feature runs report.
use anyhow::bail;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{two_class_proba, BinaryClassifier, ClassifierTrainer};
use crate::models::utils::check_training_input;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StumpClassifier {
    pub feature_index: usize,
    pub threshold: f64,
    /// `P(variant)` for rows with `x[feature_index] < threshold`.
    pub p_left: f64,
    /// `P(variant)` for the remaining rows.
    pub p_right: f64,
    /// Width of the training matrix.
    pub n_features: usize,
}

impl BinaryClassifier for StumpClassifier {
    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        two_class_proba(x.column(self.feature_index).iter().map(|&v| {
            if v < self.threshold {
                self.p_left
            } else {
                self.p_right
            }
        }))
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn name(&self) -> &str {
        "stump"
    }
}

#[derive(Debug, Clone)]
pub struct StumpTrainer {
    min_leaf_size: usize,
}

impl StumpTrainer {
    pub fn new(params: &ModelConfig) -> anyhow::Result<Self> {
        match params.model_type {
            ModelType::Stump { min_leaf_size } => Ok(Self {
                min_leaf_size: min_leaf_size.max(1),
            }),
            _ => bail!("Expected ModelType::Stump params, got {:?}", params.model_type),
        }
    }
}

impl ClassifierTrainer for StumpTrainer {
    type Model = StumpClassifier;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[bool],
        _x_eval: &Array2<f64>,
        _y_eval: &[bool],
        sample_weight: Option<&[f64]>,
    ) -> anyhow::Result<StumpClassifier> {
        check_training_input(x, y, sample_weight)?;
        let weight = |i: usize| sample_weight.map_or(1.0, |w| w[i]);

        let (total_w, total_pos) = (0..y.len()).fold((0.0, 0.0), |(tw, tp), i| {
            (tw + weight(i), if y[i] { tp + weight(i) } else { tp })
        });
        if total_w <= 0.0 {
            bail!("sample weights sum to zero");
        }
        let base_rate = total_pos / total_w;

        let mut best: Option<(f64, StumpClassifier)> = None;
        for feature in 0..x.ncols() {
            let column = x.column(feature);
            let mut order: Vec<usize> = (0..y.len()).collect();
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let (mut left_w, mut left_pos) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                left_w += weight(i);
                if y[i] {
                    left_pos += weight(i);
                }
                let (lo, hi) = (column[order[k]], column[order[k + 1]]);
                if lo == hi || k + 1 < self.min_leaf_size || order.len() - k - 1 < self.min_leaf_size {
                    continue;
                }
                let right_w = total_w - left_w;
                let right_pos = total_pos - left_pos;
                if left_w <= 0.0 || right_w <= 0.0 {
                    continue;
                }
                let impurity = left_w * gini(left_pos / left_w) + right_w * gini(right_pos / right_w);
                if best.as_ref().map_or(true, |(b, _)| impurity < *b) {
                    best = Some((
                        impurity,
                        StumpClassifier {
                            feature_index: feature,
                            threshold: lo + (hi - lo) / 2.0,
                            p_left: left_pos / left_w,
                            p_right: right_pos / right_w,
                            n_features: x.ncols(),
                        },
                    ));
                }
            }
        }

        Ok(match best {
            Some((impurity, stump)) => {
                log::trace!(
                    "Stump split on feature {} at {:.4} (weighted impurity {:.4})",
                    stump.feature_index,
                    stump.threshold,
                    impurity
                );
                stump
            }
            None => {
                log::warn!("No feature admits a split; falling back to a constant stump");
                StumpClassifier {
                    feature_index: 0,
                    threshold: f64::INFINITY,
                    p_left: base_rate,
                    p_right: base_rate,
                    n_features: x.ncols(),
                }
            }
        })
    }
}

fn gini(p: f64) -> f64 {
    2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_separating_feature() {
        // feature 1 separates, feature 0 is noise
        let x = Array2::from_shape_vec(
            (6, 2),
            vec![0.3, 1.0, 0.1, 1.2, 0.2, 0.9, 0.1, 5.0, 0.3, 5.5, 0.2, 6.0],
        )
        .unwrap();
        let y = [false, false, false, true, true, true];
        let trainer = StumpTrainer::new(&ModelConfig::stump()).unwrap();
        let stump = trainer.fit(&x, &y, &x, &y, None).unwrap();

        assert_eq!(stump.feature_index, 1);
        assert_eq!(stump.n_features(), Some(2));
        assert!(stump.threshold > 1.2 && stump.threshold < 5.0);
        assert_eq!(stump.predict(&x), y.to_vec());
    }

    #[test]
    fn weights_shift_leaf_probabilities() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let y = [false, true, true, true];
        let trainer = StumpTrainer::new(&ModelConfig::stump()).unwrap();
        let stump = trainer
            .fit(&x, &y, &x, &y, Some(&[3.0, 1.0, 1.0, 1.0]))
            .unwrap();
        assert!((stump.p_left - 0.25).abs() < 1e-12);
        assert!((stump.p_right - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_features_fall_back_to_base_rate() {
        let x = Array2::from_elem((4, 2), 1.0);
        let y = [false, true, true, true];
        let trainer = StumpTrainer::new(&ModelConfig::stump()).unwrap();
        let stump = trainer.fit(&x, &y, &x, &y, None).unwrap();
        assert!((stump.p_left - 0.75).abs() < 1e-12);
        assert_eq!(stump.p_left, stump.p_right);
    }
}
