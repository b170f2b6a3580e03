use ndarray::Array2;

/// A fitted probabilistic binary classifier.
///
/// Class 0 is the wild-type population and class 1 the variant.
pub trait BinaryClassifier {
    /// Per-row class probabilities, shape `(n_samples, 2)`:
    /// column 0 is `P(class 0)`, column 1 is `P(class 1)`.
    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64>;

    /// Hard labels; a row is predicted positive when `P(class 1) >= 0.5`.
    fn predict(&self, x: &Array2<f64>) -> Vec<bool> {
        self.predict_proba(x)
            .column(1)
            .iter()
            .map(|&p| p >= 0.5)
            .collect()
    }

    /// Number of feature columns the model was fitted on, when it records it.
    fn n_features(&self) -> Option<usize> {
        None
    }

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Something that can fit a `BinaryClassifier`.
///
/// The eval data is provided for trainers that use it for early stopping or
/// model selection; `sample_weight`, when present, has one entry per
/// training row.
pub trait ClassifierTrainer {
    type Model: BinaryClassifier;

    fn fit(
        &self,
        x: &Array2<f64>,
        y: &[bool],
        x_eval: &Array2<f64>,
        y_eval: &[bool],
        sample_weight: Option<&[f64]>,
    ) -> anyhow::Result<Self::Model>;
}

/// Stack a positive-class probability vector into the two-column layout.
pub(crate) fn two_class_proba(p_positive: impl IntoIterator<Item = f64>) -> Array2<f64> {
    let p: Vec<f64> = p_positive.into_iter().collect();
    Array2::from_shape_fn((p.len(), 2), |(r, c)| if c == 1 { p[r] } else { 1.0 - p[r] })
}
