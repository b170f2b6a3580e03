//! Per-feature attribution of fitted classifiers.
//!
//! `SamplingShapley` estimates Shapley values of `P(variant)` by sampling
//! feature permutations against a baseline row (the column means of the
//! explained matrix). For every sampled permutation the marginal
//! contributions telescope, so each row's attributions sum exactly to
//! `p(row) - p(baseline)`.
use anyhow::{bail, Context};
use ndarray::{Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::AttributionConfig;
use crate::models::BinaryClassifier;

/// Raw engine output. Binary engines emit one matrix; multi-class style
/// engines emit one matrix per class along the last axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// `(n_samples, n_features)`, attributions of the positive class.
    Binary(Array2<f64>),
    /// `(n_samples, n_features, n_classes)`.
    PerClass(Array3<f64>),
}

impl Attribution {
    pub fn n_samples(&self) -> usize {
        match self {
            Attribution::Binary(values) => values.nrows(),
            Attribution::PerClass(values) => values.len_of(Axis(0)),
        }
    }

    /// Attributions of class 1 (the variant), whatever the output shape.
    pub fn into_positive_class(self) -> anyhow::Result<Array2<f64>> {
        match self {
            Attribution::Binary(values) => Ok(values),
            Attribution::PerClass(values) => {
                let n_classes = values.len_of(Axis(2));
                if n_classes < 2 {
                    bail!("per-class attributions have {} classes, expected 2", n_classes);
                }
                Ok(values.index_axis(Axis(2), 1).to_owned())
            }
        }
    }
}

/// Computes attributions of a fitted model over a feature matrix.
pub trait AttributionEngine {
    fn attribute<M>(&self, model: &M, x: &Array2<f64>) -> anyhow::Result<Attribution>
    where
        M: BinaryClassifier + Sync + ?Sized;
}

/// Monte-Carlo permutation Shapley values.
#[derive(Debug, Clone)]
pub struct SamplingShapley {
    pub num_permutations: usize,
    pub seed: u64,
    /// Emit `Attribution::PerClass` with class 0 as the negation of class 1.
    pub per_class: bool,
}

impl SamplingShapley {
    pub fn new(config: &AttributionConfig, seed: u64) -> Self {
        Self {
            num_permutations: config.num_permutations,
            seed,
            per_class: config.per_class_output,
        }
    }

    /// Attributions of a single row, averaged over `num_permutations`.
    fn explain_row<M>(
        &self,
        model: &M,
        row: &Array1<f64>,
        baseline: &Array1<f64>,
        row_index: usize,
    ) -> Vec<f64>
    where
        M: BinaryClassifier + ?Sized,
    {
        let n_features = row.len();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(row_index as u64));

        // One batch per row: for each permutation, the baseline followed by
        // the rows obtained by switching in features one at a time.
        let steps = n_features + 1;
        let mut batch = Array2::<f64>::zeros((self.num_permutations * steps, n_features));
        let mut orders = Vec::with_capacity(self.num_permutations);
        let mut order: Vec<usize> = (0..n_features).collect();
        for p in 0..self.num_permutations {
            order.shuffle(&mut rng);
            let mut current = baseline.clone();
            batch.row_mut(p * steps).assign(&current);
            for (k, &feature) in order.iter().enumerate() {
                current[feature] = row[feature];
                batch.row_mut(p * steps + k + 1).assign(&current);
            }
            orders.push(order.clone());
        }

        let proba = model.predict_proba(&batch);
        let p_variant = proba.column(1);

        let mut phi = vec![0.0; n_features];
        for (p, order) in orders.iter().enumerate() {
            for (k, &feature) in order.iter().enumerate() {
                phi[feature] += p_variant[p * steps + k + 1] - p_variant[p * steps + k];
            }
        }
        let m = self.num_permutations as f64;
        phi.iter_mut().for_each(|v| *v /= m);
        phi
    }
}

impl AttributionEngine for SamplingShapley {
    fn attribute<M>(&self, model: &M, x: &Array2<f64>) -> anyhow::Result<Attribution>
    where
        M: BinaryClassifier + Sync + ?Sized,
    {
        if self.num_permutations == 0 {
            bail!("num_permutations must be at least 1");
        }
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Ok(self.wrap(Array2::zeros((0, n_features))));
        }

        let baseline = x
            .mean_axis(Axis(0))
            .context("Cannot compute the attribution baseline of an empty matrix")?;

        let rows: Vec<Vec<f64>> = (0..n_samples)
            .into_par_iter()
            .map(|i| self.explain_row(model, &x.row(i).to_owned(), &baseline, i))
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((n_samples, n_features), flat)
            .context("Attribution rows have inconsistent lengths")?;
        Ok(self.wrap(values))
    }
}

impl SamplingShapley {
    fn wrap(&self, values: Array2<f64>) -> Attribution {
        if !self.per_class {
            return Attribution::Binary(values);
        }
        let (n, f) = values.dim();
        let per_class = Array3::from_shape_fn((n, f, 2), |(r, c, k)| {
            if k == 1 {
                values[(r, c)]
            } else {
                -values[(r, c)]
            }
        });
        Attribution::PerClass(per_class)
    }
}
