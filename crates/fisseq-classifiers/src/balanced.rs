//! Class-balanced fitting of a binary trainer.
use crate::error::{OvwtError, Result};
use crate::models::ClassifierTrainer;
use crate::partition::VariantTask;

/// Inverse-frequency weights for binary labels.
///
/// Every sample of a class with `n_c` members out of `n` receives
/// `n / (2 * n_c)`, so both classes carry the same total weight.
pub fn balanced_sample_weights(labels: &[bool]) -> Vec<f64> {
    let n = labels.len() as f64;
    let n_pos = labels.iter().filter(|&&l| l).count() as f64;
    let n_neg = n - n_pos;
    labels
        .iter()
        .map(|&l| {
            let n_class = if l { n_pos } else { n_neg };
            n / (2.0 * n_class)
        })
        .collect()
}

/// Fit `trainer` on the training task with balanced weights.
///
/// The eval task is handed to the trainer unweighted. Trainer failures are
/// returned as `OvwtError::Training` tagged with `variant`.
pub fn train_balanced<T: ClassifierTrainer>(
    variant: &str,
    train: &VariantTask,
    eval: &VariantTask,
    trainer: &T,
) -> Result<T::Model> {
    let weights = balanced_sample_weights(&train.labels);
    log::debug!(
        "Fitting '{}' on {} rows ({} wild-type, {} variant); eval has {} rows",
        variant,
        train.len(),
        train.n_negative(),
        train.n_positive(),
        eval.len()
    );

    trainer
        .fit(
            &train.features,
            &train.labels,
            &eval.features,
            &eval.labels,
            Some(&weights),
        )
        .map_err(|source| OvwtError::Training {
            variant: variant.to_string(),
            source,
        })
}
