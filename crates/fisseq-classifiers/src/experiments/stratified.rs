//! OvWT runs repeated independently within each value of a grouping column.
use crate::attribution::{compute_attributions, AttributionEngine, AttributionTable};
use crate::data_handling::{distinct_in_order, DatasetKind, Metadata, Splits};
use crate::error::{OvwtError, Result};
use crate::metrics::MetricsTable;
use crate::models::{BinaryClassifier, ClassifierTrainer};
use crate::ovwt::{check_inputs, ensure_wild_type, evaluate_ovwt, train_ovwt, OvwtOptions};
use crate::registry::StratifiedRegistry;

/// Output of a stratified run: one registry per stratum and the
/// concatenated, group-tagged metrics.
#[derive(Debug)]
pub struct StratifiedRun<M> {
    pub models: StratifiedRegistry<M>,
    pub metrics: MetricsTable,
    /// Each stratum's splits as its models saw them, labels permuted when
    /// the run permuted them.
    pub strata: Vec<(String, Splits)>,
}

/// Stratum values in order of first appearance in the eval split.
pub fn strata(splits: &Splits, column: &str) -> Result<Vec<String>> {
    for (_, split) in splits.iter() {
        split.group_values(column)?;
    }
    Ok(distinct_in_order(splits.eval.group_values(column)?))
}

/// Rows of every split whose `column` equals `value`.
pub fn stratum_splits(splits: &Splits, column: &str, value: &str) -> Result<Splits> {
    splits.try_map(|_, split| split.stratum(column, value))
}

/// Every stratum's splits, in `strata` order.
pub fn split_strata(splits: &Splits, column: &str) -> Result<Vec<(String, Splits)>> {
    strata(splits, column)?
        .into_iter()
        .map(|value| {
            let sub = stratum_splits(splits, column, &value)?;
            Ok((value, sub))
        })
        .collect()
}

fn empty_table(metadata: &Metadata, splits: &Splits, column: &str) -> MetricsTable {
    MetricsTable::new(metadata.target_column.clone(), splits.active_datasets()).with_group(column, "")
}

/// Train an OvWT model set per stratum.
///
/// A stratum without wild-type training rows is fatal. When labels are
/// permuted, each stratum draws from its own seed (`seed + stratum index`).
pub fn run_stratified<T: ClassifierTrainer>(
    trainer: &T,
    splits: &Splits,
    metadata: &Metadata,
    column: &str,
    options: &OvwtOptions,
) -> Result<StratifiedRun<T::Model>> {
    check_inputs(splits, metadata)?;
    let subsets = split_strata(splits, column)?;
    log::info!("Stratifying over {} values of '{}'", subsets.len(), column);

    let mut models = StratifiedRegistry::new();
    let mut metrics = empty_table(metadata, splits, column);
    let mut strata = Vec::with_capacity(subsets.len());

    for (i, (value, sub)) in subsets.into_iter().enumerate() {
        log::info!("---------- Training over {} = {} ----------", column, value);
        ensure_wild_type(&sub.train, &options.wt_key, Some(&value))?;

        let stratum_options = OvwtOptions {
            seed: options.seed.wrapping_add(i as u64),
            ..options.clone()
        };
        let run = train_ovwt(trainer, &sub, metadata, &stratum_options)?;
        metrics.extend(run.metrics.with_group(column, &value))?;
        models.insert(value.clone(), run.models);
        strata.push((value, run.permuted.unwrap_or(sub)));
    }

    Ok(StratifiedRun {
        models,
        metrics,
        strata,
    })
}

/// Score a nested registry stratum by stratum.
///
/// Every stratum of the data must have a registry entry.
pub fn evaluate_stratified<M: BinaryClassifier>(
    registry: &StratifiedRegistry<M>,
    splits: &Splits,
    metadata: &Metadata,
    column: &str,
    wt_key: &str,
) -> Result<MetricsTable> {
    check_inputs(splits, metadata)?;
    let values = strata(splits, column)?;
    let mut metrics = empty_table(metadata, splits, column);

    for value in &values {
        log::info!("---------- Evaluating over {} = {} ----------", column, value);
        let stratum_registry = registry
            .get(value)
            .ok_or_else(|| OvwtError::MissingStratum(value.clone()))?;
        let sub = stratum_splits(splits, column, value)?;
        let table = evaluate_ovwt(stratum_registry, &sub, metadata, wt_key)?;
        metrics.extend(table.with_group(column, value))?;
    }
    Ok(metrics)
}

/// Attribution tables of every dataset, each stratum explained by its own
/// registry and tagged with its stratum value.
///
/// `strata` comes from `split_strata`, or from `StratifiedRun::strata` when
/// the models were just trained.
pub fn stratified_attributions<M, E>(
    registry: &StratifiedRegistry<M>,
    strata: &[(String, Splits)],
    metadata: &Metadata,
    column: &str,
    wt_key: &str,
    engine: &E,
) -> Result<Vec<(DatasetKind, AttributionTable)>>
where
    M: BinaryClassifier + Sync,
    E: AttributionEngine,
{
    let datasets = strata
        .first()
        .map(|(_, sub)| sub.active_datasets())
        .unwrap_or_default();
    let mut tables: Vec<(DatasetKind, AttributionTable)> = datasets
        .into_iter()
        .map(|kind| (kind, AttributionTable::empty(metadata).with_group(column, "")))
        .collect();

    for (value, sub) in strata {
        let stratum_registry = registry
            .get(value)
            .ok_or_else(|| OvwtError::MissingStratum(value.clone()))?;
        for (kind, table) in tables.iter_mut() {
            let Some(split) = sub.get(*kind) else {
                continue;
            };
            let part = compute_attributions(split, stratum_registry, metadata, wt_key, engine)?;
            table.extend(part.with_group(column, value))?;
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::DatasetSplit;
    use crate::experiments::tests::{split, ConstantTrainer, ConstantEngine};
    use crate::registry::ModelRegistry;

    fn with_plates(labels: &[&str], plates: &[&str]) -> DatasetSplit {
        split(labels)
            .with_group("plate", plates.iter().map(|s| s.to_string()).collect())
            .unwrap()
    }

    fn metadata() -> Metadata {
        Metadata::new("label", vec!["f0".into(), "f1".into()])
    }

    fn splits() -> Splits {
        Splits::new(
            with_plates(&["WT", "V1", "WT", "V1", "V2"], &["a", "a", "b", "b", "b"]),
            with_plates(&["WT", "V1", "WT", "V1"], &["b", "b", "a", "a"]),
            None,
        )
    }

    #[test]
    fn strata_follow_eval_order() {
        assert_eq!(strata(&splits(), "plate").unwrap(), vec!["b", "a"]);
        assert!(matches!(
            strata(&splits(), "well").unwrap_err(),
            OvwtError::MissingColumn { .. }
        ));
    }

    #[test]
    fn metrics_are_tagged_and_concatenated() {
        let run = run_stratified(&ConstantTrainer, &splits(), &metadata(), "plate", &OvwtOptions::default())
            .unwrap();
        assert_eq!(run.metrics.group_column(), Some("plate"));
        let rows: Vec<_> = run
            .metrics
            .rows()
            .iter()
            .map(|r| (r.label.as_str(), r.group.as_deref()))
            .collect();
        assert_eq!(rows, vec![("V1", Some("b")), ("V2", Some("b")), ("V1", Some("a"))]);
        assert_eq!(run.models.len(), 2);
        assert_eq!(run.models.n_models(), 3);
    }

    #[test]
    fn permuted_strata_use_their_own_seed() {
        let options = OvwtOptions {
            permute_labels: true,
            seed: 9,
            ..OvwtOptions::default()
        };
        let run = run_stratified(&ConstantTrainer, &splits(), &metadata(), "plate", &options).unwrap();
        let plain = split_strata(&splits(), "plate").unwrap();
        assert_eq!(run.strata.len(), 2);
        for (i, ((value, permuted), (plain_value, sub))) in run.strata.iter().zip(&plain).enumerate() {
            assert_eq!(value, plain_value);
            assert_eq!(permuted, &sub.permuted(9 + i as u64));
        }

        let tables =
            stratified_attributions(&run.models, &run.strata, &metadata(), "plate", "WT", &ConstantEngine).unwrap();
        let (_, eval) = &tables[1];
        let expected: Vec<String> = run
            .strata
            .iter()
            .flat_map(|(_, sub)| sub.eval.labels.iter().filter(|l| *l != "WT").cloned())
            .collect();
        assert_eq!(eval.labels, expected);
    }

    #[test]
    fn stratum_without_wild_type_is_fatal() {
        let splits = Splits::new(
            with_plates(&["WT", "V1", "V1"], &["a", "a", "b"]),
            with_plates(&["WT", "V1", "WT", "V1"], &["a", "a", "b", "b"]),
            None,
        );
        let err = run_stratified(&ConstantTrainer, &splits, &metadata(), "plate", &OvwtOptions::default())
            .unwrap_err();
        assert!(matches!(err, OvwtError::NoWildType { stratum: Some(s), .. } if s == "b"));
    }

    #[test]
    fn evaluation_requires_every_stratum() {
        let run = run_stratified(&ConstantTrainer, &splits(), &metadata(), "plate", &OvwtOptions::default())
            .unwrap();
        let table = evaluate_stratified(&run.models, &splits(), &metadata(), "plate", "WT").unwrap();
        assert_eq!(table.len(), 3);

        let mut partial = StratifiedRegistry::new();
        partial.insert("b", ModelRegistry::new());
        let err = evaluate_stratified(&partial, &splits(), &metadata(), "plate", "WT").unwrap_err();
        assert!(matches!(err, OvwtError::MissingStratum(s) if s == "a"));
    }

    #[test]
    fn attributions_cover_every_stratum() {
        let run = run_stratified(&ConstantTrainer, &splits(), &metadata(), "plate", &OvwtOptions::default())
            .unwrap();
        let tables =
            stratified_attributions(&run.models, &run.strata, &metadata(), "plate", "WT", &ConstantEngine).unwrap();
        let (kind, train) = &tables[0];
        assert_eq!(*kind, DatasetKind::Train);
        assert_eq!(train.len(), 3);
        assert_eq!(train.group.as_ref().map(|(_, v)| v.clone()), Some(vec!["b".to_string(), "b".into(), "a".into()]));
    }
}
