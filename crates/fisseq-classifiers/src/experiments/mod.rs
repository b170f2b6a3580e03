//! Experiment variants built on top of the OvWT pipeline.
pub mod control;
pub mod single_feature;
pub mod stratified;

pub use control::{null_summary, run_wt_control, ControlRun, NullSummary};
pub use single_feature::{run_single_feature, selected_features, SelectedFeature, SingleFeatureRun};
pub use stratified::{
    evaluate_stratified, run_stratified, split_strata, strata, stratified_attributions,
    stratum_splits, StratifiedRun,
};

#[cfg(test)]
pub(crate) mod tests {
    use ndarray::Array2;

    use crate::attribution::{Attribution, AttributionEngine};
    use crate::data_handling::DatasetSplit;
    use crate::models::{BinaryClassifier, ClassifierTrainer};

    /// Wild-type rows get feature value 0.2, every other row 0.8.
    pub(crate) fn split(labels: &[&str]) -> DatasetSplit {
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let features = Array2::from_shape_fn((labels.len(), 2), |(r, _)| {
            if labels[r] == "WT" {
                0.2
            } else {
                0.8
            }
        });
        DatasetSplit::new(labels, features).unwrap()
    }

    #[derive(Debug)]
    pub(crate) struct Constant;

    impl BinaryClassifier for Constant {
        fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
            Array2::from_elem((x.nrows(), 2), 0.5)
        }
    }

    pub(crate) struct ConstantTrainer;

    impl ClassifierTrainer for ConstantTrainer {
        type Model = Constant;

        fn fit(
            &self,
            _x: &Array2<f64>,
            _y: &[bool],
            _x_eval: &Array2<f64>,
            _y_eval: &[bool],
            _sample_weight: Option<&[f64]>,
        ) -> anyhow::Result<Constant> {
            Ok(Constant)
        }
    }

    pub(crate) struct ConstantEngine;

    impl AttributionEngine for ConstantEngine {
        fn attribute<M>(&self, _model: &M, x: &Array2<f64>) -> anyhow::Result<Attribution>
        where
            M: BinaryClassifier + Sync + ?Sized,
        {
            Ok(Attribution::Binary(Array2::zeros(x.dim())))
        }
    }
}
