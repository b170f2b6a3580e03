//! Attribution tables over whole dataset splits.
use ndarray::{concatenate, Array2, Axis};

use crate::attribution::engine::AttributionEngine;
use crate::data_handling::{DatasetSplit, Metadata};
use crate::error::{OvwtError, Result};
use crate::models::BinaryClassifier;
use crate::ovwt::check_model_widths;
use crate::partition::compute_mask;
use crate::registry::ModelRegistry;

/// One row per non wild-type sample: its label, the predicted variant
/// probability and one attribution value per feature column.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionTable {
    pub target_column: String,
    pub feature_columns: Vec<String>,
    pub labels: Vec<String>,
    pub p_is_var: Vec<f64>,
    /// `(labels.len(), feature_columns.len())`
    pub values: Array2<f64>,
    /// Stratum column and its per-row values, for stratified runs.
    pub group: Option<(String, Vec<String>)>,
}

impl AttributionTable {
    pub fn empty(metadata: &Metadata) -> Self {
        Self {
            target_column: metadata.target_column.clone(),
            feature_columns: metadata.feature_columns.clone(),
            labels: Vec::new(),
            p_is_var: Vec::new(),
            values: Array2::zeros((0, metadata.feature_columns.len())),
            group: None,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn group_column(&self) -> Option<&str> {
        self.group.as_ref().map(|(column, _)| column.as_str())
    }

    /// Tag every row with a stratum value.
    pub fn with_group(mut self, column: impl Into<String>, value: &str) -> Self {
        self.group = Some((column.into(), vec![value.to_string(); self.len()]));
        self
    }

    /// Stack `other` below this table. Columns must match.
    pub fn extend(&mut self, other: AttributionTable) -> Result<()> {
        if other.feature_columns != self.feature_columns
            || other.target_column != self.target_column
            || other.group_column() != self.group_column()
        {
            return Err(OvwtError::ShapeMismatch(
                "cannot concatenate attribution tables with different columns".to_string(),
            ));
        }
        self.values = concatenate(Axis(0), &[self.values.view(), other.values.view()])
            .map_err(|e| OvwtError::ShapeMismatch(e.to_string()))?;
        self.labels.extend(other.labels);
        self.p_is_var.extend(other.p_is_var);
        if let (Some((_, values)), Some((_, more))) = (self.group.as_mut(), other.group) {
            values.extend(more);
        }
        Ok(())
    }
}

/// Attribute every non wild-type row of `dataset` with the model registered
/// for its label.
///
/// Each label's rows are explained by that label's model only, and the
/// positive-class attributions are written back at the rows' positions.
/// Every label must have a model before any attribution is computed.
pub fn compute_attributions<M, E>(
    dataset: &DatasetSplit,
    registry: &ModelRegistry<M>,
    metadata: &Metadata,
    wt_key: &str,
    engine: &E,
) -> Result<AttributionTable>
where
    M: BinaryClassifier + Sync,
    E: AttributionEngine,
{
    let n_features = metadata.feature_columns.len();
    if dataset.n_features() != n_features {
        return Err(OvwtError::ShapeMismatch(format!(
            "dataset has {} feature columns, metadata lists {}",
            dataset.n_features(),
            n_features
        )));
    }
    check_model_widths(registry, n_features)?;

    let keep: Vec<bool> = compute_mask(dataset, wt_key).iter().map(|&is_wt| !is_wt).collect();
    let subset = dataset.filter(&keep);
    let variants = subset.distinct_labels();

    if let Some(missing) = variants.iter().find(|v| !registry.contains(v.as_str())) {
        return Err(OvwtError::MissingModel(missing.clone()));
    }

    let n_rows = subset.len();
    let mut values = Array2::<f64>::zeros((n_rows, n_features));
    let mut p_is_var = vec![0.0; n_rows];
    let mut written = vec![false; n_rows];

    for variant in &variants {
        let model = registry
            .get(variant)
            .ok_or_else(|| OvwtError::MissingModel(variant.clone()))?;
        let rows: Vec<usize> = compute_mask(&subset, variant)
            .iter()
            .enumerate()
            .filter_map(|(i, &hit)| hit.then_some(i))
            .collect();
        log::debug!("Computing attributions for '{}' over {} rows", variant, rows.len());

        let x = subset.features.select(Axis(0), &rows);
        let attributed = engine
            .attribute(model, &x)
            .and_then(|raw| raw.into_positive_class())
            .map_err(|source| OvwtError::Attribution {
                variant: variant.clone(),
                source,
            })?;
        if attributed.dim() != (rows.len(), n_features) {
            return Err(OvwtError::Attribution {
                variant: variant.clone(),
                source: anyhow::anyhow!(
                    "engine returned shape {:?}, expected {:?}",
                    attributed.dim(),
                    (rows.len(), n_features)
                ),
            });
        }
        let proba = model.predict_proba(&x);

        for (k, &row) in rows.iter().enumerate() {
            values.row_mut(row).assign(&attributed.row(k));
            p_is_var[row] = proba[(k, 1)];
            written[row] = true;
        }
    }

    let unwritten = written.iter().filter(|w| !**w).count();
    if unwritten > 0 {
        return Err(OvwtError::IncompleteAttribution(unwritten));
    }

    Ok(AttributionTable {
        target_column: metadata.target_column.clone(),
        feature_columns: metadata.feature_columns.clone(),
        labels: subset.labels,
        p_is_var,
        values,
        group: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::engine::{Attribution, SamplingShapley};
    use ndarray::array;

    /// Constant model whose attribution engine output is its own tag.
    #[derive(Debug)]
    struct Tagged(f64);

    impl BinaryClassifier for Tagged {
        fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
            Array2::from_shape_fn((x.nrows(), 2), |(_, c)| if c == 1 { self.0 } else { 1.0 - self.0 })
        }
    }

    struct TagEngine;

    impl AttributionEngine for TagEngine {
        fn attribute<M>(&self, model: &M, x: &Array2<f64>) -> anyhow::Result<Attribution>
        where
            M: BinaryClassifier + Sync + ?Sized,
        {
            let p = model.predict_proba(x);
            Ok(Attribution::Binary(Array2::from_shape_fn(x.dim(), |(r, _)| p[(r, 1)])))
        }
    }

    fn metadata() -> Metadata {
        Metadata::new("label", vec!["f0".into(), "f1".into()])
    }

    fn dataset() -> DatasetSplit {
        let labels = ["WT", "V1", "V2", "WT", "V1"].iter().map(|s| s.to_string()).collect();
        DatasetSplit::new(labels, Array2::zeros((5, 2))).unwrap()
    }

    #[test]
    fn every_non_wt_row_gets_its_own_model() {
        let mut registry = ModelRegistry::new();
        registry.insert("V1", Tagged(0.25));
        registry.insert("V2", Tagged(0.75));

        let table = compute_attributions(&dataset(), &registry, &metadata(), "WT", &TagEngine).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.labels, vec!["V1", "V2", "V1"]);
        assert_eq!(table.p_is_var, vec![0.25, 0.75, 0.25]);
        assert_eq!(table.values, array![[0.25, 0.25], [0.75, 0.75], [0.25, 0.25]]);
    }

    #[test]
    fn registry_trained_on_more_features_is_rejected() {
        use crate::models::stump::StumpClassifier;
        use crate::models::FittedModel;
        use crate::registry::{load_json, save_json};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        let mut registry = ModelRegistry::new();
        for label in ["V1", "V2"] {
            registry.insert(
                label,
                FittedModel::Stump(StumpClassifier {
                    feature_index: 2,
                    threshold: 0.5,
                    p_left: 0.1,
                    p_right: 0.9,
                    n_features: 3,
                }),
            );
        }
        save_json(&registry, &path).unwrap();
        let loaded: ModelRegistry<FittedModel> = load_json(&path).unwrap();

        let err = compute_attributions(&dataset(), &loaded, &metadata(), "WT", &TagEngine).unwrap_err();
        assert!(matches!(err, OvwtError::ShapeMismatch(msg) if msg.contains("3 features")));
    }

    #[test]
    fn missing_model_is_fatal() {
        let mut registry = ModelRegistry::new();
        registry.insert("V1", Tagged(0.25));
        let err = compute_attributions(&dataset(), &registry, &metadata(), "WT", &TagEngine).unwrap_err();
        assert!(matches!(err, OvwtError::MissingModel(label) if label == "V2"));
    }

    #[test]
    fn wrong_engine_shape_is_an_attribution_error() {
        struct Short;
        impl AttributionEngine for Short {
            fn attribute<M>(&self, _model: &M, _x: &Array2<f64>) -> anyhow::Result<Attribution>
            where
                M: BinaryClassifier + Sync + ?Sized,
            {
                Ok(Attribution::Binary(Array2::zeros((1, 2))))
            }
        }
        let mut registry = ModelRegistry::new();
        registry.insert("V1", Tagged(0.5));
        registry.insert("V2", Tagged(0.5));
        let err = compute_attributions(&dataset(), &registry, &metadata(), "WT", &Short).unwrap_err();
        assert!(matches!(err, OvwtError::Attribution { variant, .. } if variant == "V1"));
    }

    #[test]
    fn shapley_engine_runs_through_the_aggregator() {
        let mut registry = ModelRegistry::new();
        registry.insert("V1", Tagged(0.4));
        registry.insert("V2", Tagged(0.6));
        let engine = SamplingShapley {
            num_permutations: 4,
            seed: 1,
            per_class: true,
        };
        let table = compute_attributions(&dataset(), &registry, &metadata(), "WT", &engine).unwrap();
        // constant models attribute nothing
        assert!(table.values.iter().all(|v| *v == 0.0));
        assert_eq!(table.values.dim(), (3, 2));
    }

    #[test]
    fn tables_concatenate_row_wise() {
        let mut registry = ModelRegistry::new();
        registry.insert("V1", Tagged(0.1));
        registry.insert("V2", Tagged(0.2));
        let mut a = compute_attributions(&dataset(), &registry, &metadata(), "WT", &TagEngine).unwrap();
        let b = a.clone();
        a.extend(b).unwrap();
        assert_eq!(a.len(), 6);
        assert_eq!(a.values.nrows(), 6);
        assert!(AttributionTable::empty(&metadata()).is_empty());
    }
}
