use anyhow::bail;
use ndarray::Array2;

/// Shared sanity checks run by every trainer before fitting.
pub(crate) fn check_training_input(
    x: &Array2<f64>,
    y: &[bool],
    sample_weight: Option<&[f64]>,
) -> anyhow::Result<()> {
    if x.nrows() != y.len() {
        bail!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        );
    }
    if x.ncols() == 0 {
        bail!("feature matrix has no columns");
    }
    let n_pos = y.iter().filter(|&&l| l).count();
    if n_pos == 0 || n_pos == y.len() {
        bail!(
            "training labels must contain both classes ({} positive of {})",
            n_pos,
            y.len()
        );
    }
    if let Some(w) = sample_weight {
        if w.len() != y.len() {
            bail!("{} sample weights for {} rows", w.len(), y.len());
        }
        if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
            bail!("sample weights must be finite and non-negative");
        }
    }
    if x.iter().any(|v| !v.is_finite()) {
        bail!("feature matrix contains non-finite values");
    }
    Ok(())
}

/// Mean binary cross-entropy, clipped away from 0 and 1.
pub(crate) fn log_loss(p_positive: &[f64], y: &[bool]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let eps = 1e-15;
    let total: f64 = p_positive
        .iter()
        .zip(y)
        .map(|(&p, &label)| {
            let p = p.clamp(eps, 1.0 - eps);
            if label {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / y.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_class_labels_are_rejected() {
        let x = Array2::zeros((3, 1));
        assert!(check_training_input(&x, &[true, true, true], None).is_err());
        assert!(check_training_input(&x, &[true, false, true], None).is_ok());
    }

    #[test]
    fn weight_length_is_checked() {
        let x = Array2::zeros((2, 1));
        assert!(check_training_input(&x, &[true, false], Some(&[1.0])).is_err());
    }

    #[test]
    fn log_loss_of_confident_correct_predictions_is_small() {
        let loss = log_loss(&[0.99, 0.01], &[true, false]);
        assert!(loss < 0.02);
    }
}
