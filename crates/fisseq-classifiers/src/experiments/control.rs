//! Wild-type versus wild-type null runs.
//!
//! Each trial relabels a random subset of the wild-type rows as a synthetic
//! variant `{wt}_{i}` and runs the ordinary OvWT pipeline, so the resulting
//! metrics describe how well a classifier separates wild type from itself.
use rand::rngs::StdRng;
use rand::SeedableRng;
use statrs::statistics::Statistics;

use crate::attribution::{compute_attributions, AttributionEngine, AttributionTable};
use crate::config::ControlConfig;
use crate::data_handling::{DatasetKind, Metadata, Splits};
use crate::error::{OvwtError, Result};
use crate::metrics::MetricsTable;
use crate::models::ClassifierTrainer;
use crate::ovwt::{check_inputs, ensure_wild_type, train_ovwt, OvwtOptions};
use crate::registry::ModelRegistry;

/// Concatenated output of all control trials.
#[derive(Debug)]
pub struct ControlRun<M> {
    /// Models of every trial, keyed by the trial's pseudo-label.
    pub models: ModelRegistry<M>,
    pub metrics: MetricsTable,
    /// Per dataset, empty when attributions were not requested.
    pub attributions: Vec<(DatasetKind, AttributionTable)>,
}

/// Mean and standard deviation of a null ROC AUC distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NullSummary {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Summarise the populated ROC AUC cells of one dataset.
pub fn null_summary(metrics: &MetricsTable, dataset: DatasetKind) -> Option<NullSummary> {
    let values: Vec<f64> = metrics.roc_auc_column(dataset).into_iter().flatten().collect();
    if values.is_empty() {
        return None;
    }
    let std_dev = if values.len() > 1 { values.iter().std_dev() } else { 0.0 };
    Some(NullSummary {
        n: values.len(),
        mean: values.iter().mean(),
        std_dev,
    })
}

/// Run `config.num_iters` wild-type-vs-wild-type trials.
///
/// Only wild-type rows of each split take part. Trial `i` relabels
/// `floor(len * sample_proportion)` rows of every split with the suffix
/// `_{i}`; draws come from a single generator seeded with `seed`. Metrics and
/// attribution tables are concatenated across trials without deduplication.
pub fn run_wt_control<T, E>(
    trainer: &T,
    splits: &Splits,
    metadata: &Metadata,
    wt_key: &str,
    config: &ControlConfig,
    seed: u64,
    engine: Option<&E>,
) -> Result<ControlRun<T::Model>>
where
    T: ClassifierTrainer,
    T::Model: Sync,
    E: AttributionEngine,
{
    check_inputs(splits, metadata)?;
    if config.num_iters == 0 {
        return Err(OvwtError::InvalidParameter(
            "num_iters must be at least 1".to_string(),
        ));
    }

    let wt_only = splits.try_map(|_, split| Ok(split.only_label(wt_key)))?;
    ensure_wild_type(&wt_only.train, wt_key, None)?;
    log::info!(
        "WT vs. WT control: {} iterations over {} wild-type training rows",
        config.num_iters,
        wt_only.train.len()
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let options = OvwtOptions {
        wt_key: wt_key.to_string(),
        seed,
        permute_labels: false,
    };

    let mut models = ModelRegistry::new();
    let mut metrics = MetricsTable::new(metadata.target_column.clone(), splits.active_datasets());
    let mut attributions: Vec<(DatasetKind, AttributionTable)> = match engine {
        Some(_) => splits
            .active_datasets()
            .into_iter()
            .map(|kind| (kind, AttributionTable::empty(metadata)))
            .collect(),
        None => Vec::new(),
    };

    for i in 0..config.num_iters {
        log::info!("========== WT vs. WT Iteration: {} ==========", i + 1);
        let suffix = format!("_{}", i);
        let trial = wt_only
            .try_map(|_, split| split.sample_and_relabel(config.sample_proportion, &suffix, &mut rng))?;

        let run = train_ovwt(trainer, &trial, metadata, &options)?;

        if let Some(engine) = engine {
            for (kind, table) in attributions.iter_mut() {
                if let Some(split) = trial.get(*kind) {
                    table.extend(compute_attributions(split, &run.models, metadata, wt_key, engine)?)?;
                }
            }
        }

        metrics.extend(run.metrics)?;
        models.merge(run.models);
    }

    if let Some(summary) = null_summary(&metrics, DatasetKind::Eval) {
        log::info!(
            "Null eval ROC AUC over {} trials: mean {:.3}, std {:.3}",
            summary.n,
            summary.mean,
            summary.std_dev
        );
    }

    Ok(ControlRun {
        models,
        metrics,
        attributions,
    })
}
