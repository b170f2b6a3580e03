//! OvWT with depth-one trees, reporting the one feature each variant splits on.
use crate::config::{ModelConfig, ModelType};
use crate::data_handling::{Metadata, Splits};
use crate::error::{OvwtError, Result};
use crate::models::{build_trainer, FittedModel};
use crate::ovwt::{train_ovwt, OvwtOptions, OvwtRun};
use crate::registry::ModelRegistry;

/// The feature a variant's stump splits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFeature {
    pub label: String,
    pub feature_name: String,
}

#[derive(Debug)]
pub struct SingleFeatureRun {
    pub run: OvwtRun<FittedModel>,
    pub selected: Vec<SelectedFeature>,
}

/// Name the split feature of every stump in `labels` order.
pub fn selected_features<'a>(
    registry: &ModelRegistry<FittedModel>,
    labels: impl IntoIterator<Item = &'a str>,
    metadata: &Metadata,
) -> Result<Vec<SelectedFeature>> {
    labels
        .into_iter()
        .map(|label| {
            let model = registry
                .get(label)
                .ok_or_else(|| OvwtError::MissingModel(label.to_string()))?;
            let stump = model.as_stump().ok_or_else(|| {
                OvwtError::InvalidParameter(format!("model for '{}' is not a stump", label))
            })?;
            let feature_name = metadata
                .feature_columns
                .get(stump.feature_index)
                .ok_or_else(|| {
                    OvwtError::ShapeMismatch(format!(
                        "stump for '{}' splits on feature {} of {}",
                        label,
                        stump.feature_index,
                        metadata.feature_columns.len()
                    ))
                })?
                .clone();
            Ok(SelectedFeature {
                label: label.to_string(),
                feature_name,
            })
        })
        .collect()
}

/// Train stumps (one split on one feature) for every variant.
pub fn run_single_feature(
    splits: &Splits,
    metadata: &Metadata,
    options: &OvwtOptions,
    min_leaf_size: usize,
) -> Result<SingleFeatureRun> {
    let params = ModelConfig::new(1.0, ModelType::Stump { min_leaf_size });
    let run = train_ovwt(&build_trainer(params), splits, metadata, options)?;
    let selected = selected_features(
        &run.models,
        run.metrics.rows().iter().map(|row| row.label.as_str()),
        metadata,
    )?;
    for feature in &selected {
        log::info!("{} -> {}", feature.label, feature.feature_name);
    }
    Ok(SingleFeatureRun { run, selected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::DatasetSplit;
    use ndarray::Array2;

    /// Variant `V{k}` differs from wild type in feature `k` only.
    fn split(labels: &[&str]) -> DatasetSplit {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let features = Array2::from_shape_fn((labels.len(), 3), |(r, c)| {
            let noise = (r % 3) as f64 * 0.01;
            match (labels[r].as_str(), c) {
                ("V1", 1) | ("V2", 2) => 5.0 + noise,
                _ => noise,
            }
        });
        DatasetSplit::new(labels, features).unwrap()
    }

    #[test]
    fn each_variant_selects_its_own_feature() {
        let train = split(&["WT", "WT", "WT", "V2", "V2", "WT", "V1", "V1", "WT"]);
        let eval = split(&["WT", "V1", "WT", "V2"]);
        let metadata = Metadata::new("label", vec!["a".into(), "b".into(), "c".into()]);
        let result = run_single_feature(&Splits::new(train, eval, None), &metadata, &OvwtOptions::default(), 1)
            .unwrap();
        assert_eq!(
            result.selected,
            vec![
                SelectedFeature {
                    label: "V2".into(),
                    feature_name: "c".into()
                },
                SelectedFeature {
                    label: "V1".into(),
                    feature_name: "b".into()
                },
            ]
        );
    }

    #[test]
    fn unknown_label_is_a_missing_model() {
        let metadata = Metadata::new("label", vec!["a".into()]);
        let registry = ModelRegistry::new();
        let err = selected_features(&registry, ["V1"], &metadata).unwrap_err();
        assert!(matches!(err, OvwtError::MissingModel(_)));
    }
}
