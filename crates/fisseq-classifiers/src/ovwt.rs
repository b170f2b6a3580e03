//! One-vs-wild-type training and evaluation.
//!
//! For every distinct non wild-type label of the training split a binary task
//! "wild type vs. this label" is built on each dataset, a class balanced
//! classifier is fitted on the training task and scored on every dataset in
//! which the label occurs.
use crate::balanced::train_balanced;
use crate::config::OvwtConfig;
use crate::data_handling::{DatasetKind, DatasetSplit, Metadata, Splits, DEFAULT_WT_KEY};
use crate::error::{OvwtError, Result};
use crate::metrics::{score, DatasetScore, MetricsTable};
use crate::models::{BinaryClassifier, ClassifierTrainer};
use crate::partition::{build_variant_task, compute_mask, extract_features, VariantTask};
use crate::registry::ModelRegistry;

/// Per-run knobs of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OvwtOptions {
    pub wt_key: String,
    pub seed: u64,
    /// Shuffle the label column of every split before training.
    pub permute_labels: bool,
}

impl Default for OvwtOptions {
    fn default() -> Self {
        Self {
            wt_key: DEFAULT_WT_KEY.to_string(),
            seed: 42,
            permute_labels: false,
        }
    }
}

impl From<&OvwtConfig> for OvwtOptions {
    fn from(config: &OvwtConfig) -> Self {
        Self {
            wt_key: config.wt_key.clone(),
            seed: config.seed,
            permute_labels: config.permute_labels,
        }
    }
}

/// Models and metrics produced by one OvWT pass.
#[derive(Debug)]
pub struct OvwtRun<M> {
    pub models: ModelRegistry<M>,
    pub metrics: MetricsTable,
    /// The label-permuted copy of the input the models were trained on.
    pub permuted: Option<Splits>,
}

impl<M> OvwtRun<M> {
    /// The splits the models were trained and scored on: the permuted copy
    /// when labels were permuted, `input` otherwise. Attributions must be
    /// computed on these.
    pub fn trained_on<'a>(&'a self, input: &'a Splits) -> &'a Splits {
        self.permuted.as_ref().unwrap_or(input)
    }
}

/// A variant task on one dataset, with the number of variant rows it holds.
struct DatasetTask {
    kind: DatasetKind,
    task: VariantTask,
    n_variant: usize,
}

/// Wild-type mask and feature matrix of one dataset, computed once per run.
struct PreparedSplit<'a> {
    kind: DatasetKind,
    split: &'a DatasetSplit,
    wt_mask: Vec<bool>,
    features: ndarray::Array2<f64>,
}

fn prepare<'a>(splits: &'a Splits, wt_key: &str) -> Vec<PreparedSplit<'a>> {
    splits
        .iter()
        .map(|(kind, split)| PreparedSplit {
            kind,
            split,
            wt_mask: compute_mask(split, wt_key),
            features: extract_features(split),
        })
        .collect()
}

fn variant_tasks(prepared: &[PreparedSplit<'_>], variant: &str) -> Result<Vec<DatasetTask>> {
    prepared
        .iter()
        .map(|p| {
            let variant_mask = compute_mask(p.split, variant);
            let n_variant = variant_mask.iter().filter(|&&m| m).count();
            let task = build_variant_task(&p.wt_mask, &variant_mask, &p.features)?;
            Ok(DatasetTask {
                kind: p.kind,
                task,
                n_variant,
            })
        })
        .collect()
}

fn score_tasks<M: BinaryClassifier + ?Sized>(
    model: &M,
    variant: &str,
    tasks: &[DatasetTask],
) -> Result<Vec<Option<DatasetScore>>> {
    tasks
        .iter()
        .map(|t| {
            if t.n_variant == 0 {
                log::warn!("'{}' has no rows in the {} split; skipping metrics", variant, t.kind);
                return Ok(None);
            }
            score(model, &t.task.features, &t.task.labels, variant, t.kind).map(Some)
        })
        .collect()
}

/// Verify the splits agree with the metadata before any work is done.
pub(crate) fn check_inputs(splits: &Splits, metadata: &Metadata) -> Result<()> {
    metadata.validate()?;
    splits.validate()?;
    let n_features = metadata.feature_columns.len();
    if splits.n_features() != n_features {
        return Err(OvwtError::ShapeMismatch(format!(
            "splits have {} feature columns, metadata lists {}",
            splits.n_features(),
            n_features
        )));
    }
    Ok(())
}

/// Every model must read exactly `n_features` columns.
pub(crate) fn check_model_widths<M: BinaryClassifier>(
    registry: &ModelRegistry<M>,
    n_features: usize,
) -> Result<()> {
    for (label, model) in registry.iter() {
        if let Some(expected) = model.n_features() {
            if expected != n_features {
                return Err(OvwtError::ShapeMismatch(format!(
                    "model for '{}' was trained on {} features, data has {}",
                    label, expected, n_features
                )));
            }
        }
    }
    Ok(())
}

pub(crate) fn ensure_wild_type(
    split: &DatasetSplit,
    wt_key: &str,
    stratum: Option<&str>,
) -> Result<()> {
    if split.count_label(wt_key) == 0 {
        return Err(OvwtError::NoWildType {
            wt_key: wt_key.to_string(),
            dataset: DatasetKind::Train,
            stratum: stratum.map(|s| s.to_string()),
        });
    }
    Ok(())
}

/// Train one classifier per non wild-type label of the training split.
///
/// Metrics rows follow the order in which labels first appear in the
/// training split. A label absent from eval or test is still trained; its
/// cells for those datasets stay empty. Any failure aborts the whole pass.
///
/// With `permute_labels` every split is shuffled first (`Splits::permuted`)
/// and the shuffled copy is returned in `OvwtRun::permuted`.
pub fn train_ovwt<T: ClassifierTrainer>(
    trainer: &T,
    splits: &Splits,
    metadata: &Metadata,
    options: &OvwtOptions,
) -> Result<OvwtRun<T::Model>> {
    check_inputs(splits, metadata)?;

    let permuted = if options.permute_labels {
        log::info!("Permuting labels of every split (seed {})", options.seed);
        Some(splits.permuted(options.seed))
    } else {
        None
    };
    let (models, metrics) = train_variants(
        trainer,
        permuted.as_ref().unwrap_or(splits),
        metadata,
        &options.wt_key,
    )?;

    log::info!("Trained {} classifiers", models.len());
    Ok(OvwtRun {
        models,
        metrics,
        permuted,
    })
}

fn train_variants<T: ClassifierTrainer>(
    trainer: &T,
    splits: &Splits,
    metadata: &Metadata,
    wt_key: &str,
) -> Result<(ModelRegistry<T::Model>, MetricsTable)> {
    ensure_wild_type(&splits.train, wt_key, None)?;

    let prepared = prepare(splits, wt_key);
    let mut metrics = MetricsTable::new(metadata.target_column.clone(), splits.active_datasets());
    let mut models = ModelRegistry::new();

    for variant in splits.train.distinct_labels() {
        if variant == wt_key {
            log::trace!("Skipping wild-type key '{}'", wt_key);
            continue;
        }
        log::info!("Training classifier {}", variant);

        let tasks = variant_tasks(&prepared, &variant)?;
        let [train, eval, ..] = tasks.as_slice() else {
            return Err(OvwtError::ShapeMismatch(
                "train and eval tasks are required".to_string(),
            ));
        };
        let model = train_balanced(&variant, &train.task, &eval.task, trainer)?;
        let scores = score_tasks(&model, &variant, &tasks)?;

        metrics.push(variant.clone(), scores)?;
        models.insert(variant, model);
    }
    Ok((models, metrics))
}

/// Re-score an existing registry without training.
///
/// Rows follow the registry's label order; a registry entry keyed by the
/// wild-type key is skipped.
pub fn evaluate_ovwt<M: BinaryClassifier>(
    registry: &ModelRegistry<M>,
    splits: &Splits,
    metadata: &Metadata,
    wt_key: &str,
) -> Result<MetricsTable> {
    check_inputs(splits, metadata)?;
    check_model_widths(registry, splits.n_features())?;

    let prepared = prepare(splits, wt_key);
    let mut metrics = MetricsTable::new(metadata.target_column.clone(), splits.active_datasets());

    for (variant, model) in registry.iter() {
        if variant == wt_key {
            log::trace!("Skipping wild-type key '{}'", wt_key);
            continue;
        }
        log::info!("Evaluating classifier {}", variant);
        let tasks = variant_tasks(&prepared, variant)?;
        let scores = score_tasks(model, variant, &tasks)?;
        metrics.push(variant, scores)?;
    }
    Ok(metrics)
}
