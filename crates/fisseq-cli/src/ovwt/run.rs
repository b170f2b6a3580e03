//! The `fisseq ovwt` run helpers: load inputs, run one experiment, write its
//! outputs.
use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use fisseq_classifiers::attribution::{compute_attributions, AttributionTable, SamplingShapley};
use fisseq_classifiers::config::{ModelType, OvwtConfig};
use fisseq_classifiers::data_handling::{DatasetKind, Metadata, Splits};
use fisseq_classifiers::experiments::{
    evaluate_stratified, run_single_feature, run_stratified, run_wt_control, split_strata,
    stratified_attributions, SelectedFeature,
};
use fisseq_classifiers::io::{write_attributions_csv, write_metrics_csv, write_selected_features_csv};
use fisseq_classifiers::metrics::MetricsTable;
use fisseq_classifiers::models::{build_trainer, BinaryClassifier, FittedModel};
use fisseq_classifiers::ovwt::{evaluate_ovwt, train_ovwt, OvwtOptions};
use fisseq_classifiers::registry::{load_json, save_json, ModelRegistry, StratifiedRegistry};
use fisseq_classifiers::report::{ovwt_report, RunKind};

use super::input::OvwtRunInputs;
use super::output::{
    attributions_file, OutputStage, METRICS_FILE, MODELS_FILE, REPORT_FILE, SELECTED_FEATURES_FILE,
};

/// Everything one run persists.
struct RunOutputs<'a> {
    kind: RunKind,
    metrics: &'a MetricsTable,
    example_counts: Option<HashMap<String, usize>>,
    /// Serialized registry; `None` when the run reused a persisted one.
    models: Option<serde_json::Value>,
    attributions: &'a [(DatasetKind, AttributionTable)],
    selected: Option<&'a [SelectedFeature]>,
}

fn engine(config: &OvwtConfig) -> SamplingShapley {
    SamplingShapley::new(&config.attribution, config.seed)
}

fn serialize_models<T: serde::Serialize>(models: &T) -> Result<serde_json::Value> {
    serde_json::to_value(models).context("Failed to serialize the model registry")
}

/// Attribution tables of every split explained by one flat registry.
fn split_attributions<M: BinaryClassifier + Sync>(
    splits: &Splits,
    registry: &ModelRegistry<M>,
    metadata: &Metadata,
    config: &OvwtConfig,
) -> Result<Vec<(DatasetKind, AttributionTable)>> {
    if !config.compute_attributions {
        return Ok(Vec::new());
    }
    let engine = engine(config);
    splits
        .iter()
        .map(|(kind, split)| {
            log::info!("[FISSEQ::OvWT] Computing {} attributions", kind);
            let table = compute_attributions(split, registry, metadata, &config.wt_key, &engine)
                .with_context(|| format!("Failed to compute {} attributions", kind))?;
            Ok((kind, table))
        })
        .collect()
}

/// Stage every output and move them into place together.
fn write_outputs(inputs: &OvwtRunInputs, outputs: RunOutputs<'_>) -> Result<Vec<PathBuf>> {
    let mut stage = OutputStage::new(&inputs.output_dir)?;

    let sorted = outputs.metrics.sorted_by_label_desc();
    write_metrics_csv(stage.path(METRICS_FILE), &sorted, outputs.example_counts.as_ref())
        .context("Failed to write the metrics table")?;

    if let Some(models) = &outputs.models {
        save_json(models, stage.path(MODELS_FILE)).context("Failed to write the model registry")?;
    }

    for (kind, table) in outputs.attributions {
        write_attributions_csv(stage.path(&attributions_file(kind.as_str())), table)
            .with_context(|| format!("Failed to write {} attributions", kind))?;
    }

    if let Some(selected) = outputs.selected {
        write_selected_features_csv(
            stage.path(SELECTED_FEATURES_FILE),
            outputs.metrics.target_column(),
            selected,
        )
        .context("Failed to write the selected features")?;
    }

    if inputs.config.report {
        let config_json =
            serde_json::to_string_pretty(&inputs.config).context("Failed to serialize the config")?;
        let report = ovwt_report(outputs.kind, outputs.metrics, outputs.selected, &config_json);
        let path = stage.path(REPORT_FILE);
        report
            .save_to_file(&path)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }

    let written = stage.commit()?;
    for path in &written {
        log::info!("[FISSEQ::OvWT] Wrote {}", path.display());
    }
    Ok(written)
}

/// `ovwt train`: one classifier per variant, then attributions.
pub fn run_train(inputs: &OvwtRunInputs) -> Result<Vec<PathBuf>> {
    let config = &inputs.config;
    let metadata = inputs.load_metadata()?;
    let splits = inputs.load_splits(&metadata, None)?;

    let trainer = build_trainer(config.model.clone());
    let run = train_ovwt(&trainer, &splits, &metadata, &OvwtOptions::from(config))?;
    let trained_on = run.trained_on(&splits);
    let attributions = split_attributions(trained_on, &run.models, &metadata, config)?;

    write_outputs(
        inputs,
        RunOutputs {
            kind: RunKind::Ovwt,
            metrics: &run.metrics,
            example_counts: Some(trained_on.train.label_counts()),
            models: Some(serialize_models(&run.models)?),
            attributions: &attributions,
            selected: None,
        },
    )
}

/// `ovwt single-feature`: stumps instead of the configured model.
pub fn run_single_feature_cmd(inputs: &OvwtRunInputs) -> Result<Vec<PathBuf>> {
    let config = &inputs.config;
    let metadata = inputs.load_metadata()?;
    let splits = inputs.load_splits(&metadata, None)?;

    let min_leaf_size = match config.model.model_type {
        ModelType::Stump { min_leaf_size } => min_leaf_size,
        _ => 1,
    };
    let sf = run_single_feature(&splits, &metadata, &OvwtOptions::from(config), min_leaf_size)?;
    let trained_on = sf.run.trained_on(&splits);
    let attributions = split_attributions(trained_on, &sf.run.models, &metadata, config)?;

    write_outputs(
        inputs,
        RunOutputs {
            kind: RunKind::SingleFeature,
            metrics: &sf.run.metrics,
            example_counts: Some(trained_on.train.label_counts()),
            models: Some(serialize_models(&sf.run.models)?),
            attributions: &attributions,
            selected: Some(sf.selected.as_slice()),
        },
    )
}

/// `ovwt attributions`: score and explain a persisted registry.
pub fn run_attributions(inputs: &OvwtRunInputs) -> Result<Vec<PathBuf>> {
    let config = &inputs.config;
    let metadata = inputs.load_metadata()?;
    let splits = inputs.load_splits(&metadata, None)?;

    let models_path = inputs.require_models()?;
    let registry: ModelRegistry<FittedModel> = load_json(models_path)
        .with_context(|| format!("Failed to load models: {}", models_path.display()))?;
    log::info!("[FISSEQ::OvWT] Loaded {} models", registry.len());

    let metrics = evaluate_ovwt(&registry, &splits, &metadata, &config.wt_key)?;
    let attributions = split_attributions(&splits, &registry, &metadata, config)?;

    write_outputs(
        inputs,
        RunOutputs {
            kind: RunKind::Evaluation,
            metrics: &metrics,
            example_counts: Some(splits.train.label_counts()),
            models: None,
            attributions: &attributions,
            selected: None,
        },
    )
}

/// `ovwt stratified`: an independent model set per value of the stratify
/// column.
pub fn run_stratified_cmd(inputs: &OvwtRunInputs) -> Result<Vec<PathBuf>> {
    let config = &inputs.config;
    let column = inputs.require_stratify_column()?;
    let metadata = inputs.load_metadata()?;
    let splits = inputs.load_splits(&metadata, Some(column))?;

    let trainer = build_trainer(config.model.clone());
    let run = run_stratified(&trainer, &splits, &metadata, column, &OvwtOptions::from(config))?;
    let attributions = if config.compute_attributions {
        stratified_attributions(&run.models, &run.strata, &metadata, column, &config.wt_key, &engine(config))
            .context("Failed to compute stratified attributions")?
    } else {
        Vec::new()
    };

    write_outputs(
        inputs,
        RunOutputs {
            kind: RunKind::Stratified,
            metrics: &run.metrics,
            example_counts: None,
            models: Some(serialize_models(&run.models)?),
            attributions: &attributions,
            selected: None,
        },
    )
}

/// `ovwt stratified-test`: evaluate a persisted nested registry.
pub fn run_stratified_test(inputs: &OvwtRunInputs) -> Result<Vec<PathBuf>> {
    let config = &inputs.config;
    let column = inputs.require_stratify_column()?;
    let metadata = inputs.load_metadata()?;
    let splits = inputs.load_splits(&metadata, Some(column))?;

    let models_path = inputs.require_models()?;
    let registry: StratifiedRegistry<FittedModel> = load_json(models_path)
        .with_context(|| format!("Failed to load models: {}", models_path.display()))?;
    log::info!(
        "[FISSEQ::OvWT] Loaded {} models over {} strata",
        registry.n_models(),
        registry.len()
    );

    let metrics = evaluate_stratified(&registry, &splits, &metadata, column, &config.wt_key)?;
    let attributions = if config.compute_attributions {
        let strata = split_strata(&splits, column)?;
        stratified_attributions(&registry, &strata, &metadata, column, &config.wt_key, &engine(config))
            .context("Failed to compute stratified attributions")?
    } else {
        Vec::new()
    };

    write_outputs(
        inputs,
        RunOutputs {
            kind: RunKind::Evaluation,
            metrics: &metrics,
            example_counts: None,
            models: None,
            attributions: &attributions,
            selected: None,
        },
    )
}

/// `ovwt wtvwt-control`: repeated wild-type-vs-wild-type null trials.
pub fn run_wt_control_cmd(inputs: &OvwtRunInputs) -> Result<Vec<PathBuf>> {
    let config = &inputs.config;
    let metadata = inputs.load_metadata()?;
    let splits = inputs.load_splits(&metadata, None)?;

    let trainer = build_trainer(config.model.clone());
    let attribution_engine = config.compute_attributions.then(|| engine(config));
    let run = run_wt_control(
        &trainer,
        &splits,
        &metadata,
        &config.wt_key,
        &config.control,
        config.seed,
        attribution_engine.as_ref(),
    )?;

    // every trial relabels the same number of wild-type training rows
    let per_trial =
        (splits.train.count_label(&config.wt_key) as f64 * config.control.sample_proportion) as usize;
    let example_counts = run
        .metrics
        .rows()
        .iter()
        .map(|row| (row.label.clone(), per_trial))
        .collect();

    write_outputs(
        inputs,
        RunOutputs {
            kind: RunKind::WtControl,
            metrics: &run.metrics,
            example_counts: Some(example_counts),
            models: Some(serialize_models(&run.models)?),
            attributions: &run.attributions,
            selected: None,
        },
    )
}
