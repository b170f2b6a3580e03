//! Wild-type versus variant task construction.
use ndarray::{concatenate, Array2, Axis};

use crate::data_handling::DatasetSplit;
use crate::error::{OvwtError, Result};

/// A binary classification problem: wild-type rows (label `false`) stacked
/// above the rows of one variant (label `true`).
#[derive(Debug, Clone, PartialEq)]
pub struct VariantTask {
    pub features: Array2<f64>,
    pub labels: Vec<bool>,
}

impl VariantTask {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_positive(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    pub fn n_negative(&self) -> usize {
        self.len() - self.n_positive()
    }
}

/// Boolean mask, true where the label equals `key`.
pub fn compute_mask(split: &DatasetSplit, key: &str) -> Vec<bool> {
    split.labels.iter().map(|label| label == key).collect()
}

/// Feature matrix of a split as a dense `f64` matrix.
pub fn extract_features(split: &DatasetSplit) -> Array2<f64> {
    split.features.clone()
}

/// Stack the rows selected by `wt_mask` above the rows selected by
/// `variant_mask`; labels are zero-initialised and the trailing variant block
/// set to one.
pub fn build_variant_task(
    wt_mask: &[bool],
    variant_mask: &[bool],
    features: &Array2<f64>,
) -> Result<VariantTask> {
    if wt_mask.len() != features.nrows() || variant_mask.len() != features.nrows() {
        return Err(OvwtError::ShapeMismatch(format!(
            "masks of length {} and {} for a feature matrix with {} rows",
            wt_mask.len(),
            variant_mask.len(),
            features.nrows()
        )));
    }

    let wt_rows = selected(wt_mask);
    let variant_rows = selected(variant_mask);

    let wt_features = features.select(Axis(0), &wt_rows);
    let variant_features = features.select(Axis(0), &variant_rows);
    let combined = concatenate(Axis(0), &[wt_features.view(), variant_features.view()])
        .map_err(|e| OvwtError::ShapeMismatch(e.to_string()))?;

    let mut labels = vec![false; combined.nrows()];
    for label in labels.iter_mut().skip(wt_rows.len()) {
        *label = true;
    }

    Ok(VariantTask {
        features: combined,
        labels,
    })
}

fn selected(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &m)| if m { Some(i) } else { None })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split() -> DatasetSplit {
        let labels = ["V1", "WT", "V2", "WT", "V1", "WT"];
        let features = Array2::from_shape_fn((6, 3), |(r, c)| (10 * r + c) as f64);
        DatasetSplit::new(labels.iter().map(|s| s.to_string()).collect(), features).unwrap()
    }

    #[test]
    fn wild_type_block_precedes_variant_block() {
        let s = split();
        let wt = compute_mask(&s, "WT");
        let v1 = compute_mask(&s, "V1");
        let task = build_variant_task(&wt, &v1, &extract_features(&s)).unwrap();

        assert_eq!(task.len(), 5);
        assert_eq!(task.labels, vec![false, false, false, true, true]);
        // rows 1, 3, 5 (WT) then 0, 4 (V1)
        let first_col: Vec<f64> = task.features.column(0).to_vec();
        assert_eq!(first_col, vec![10.0, 30.0, 50.0, 0.0, 40.0]);
    }

    #[test]
    fn absent_variant_yields_no_positive_rows() {
        let s = split();
        let wt = compute_mask(&s, "WT");
        let missing = compute_mask(&s, "V9");
        let task = build_variant_task(&wt, &missing, &s.features).unwrap();
        assert_eq!(task.n_positive(), 0);
        assert_eq!(task.n_negative(), 3);
    }

    #[test]
    fn mask_length_must_match_rows() {
        let s = split();
        let err = build_variant_task(&[true], &[false], &s.features);
        assert!(err.is_err());
    }
}
