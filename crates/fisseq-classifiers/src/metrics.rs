//! ROC AUC / accuracy scoring and the per-variant metrics table.
//!
//! The table schema (which datasets have columns) is fixed when the table is
//! created; rows are appended in processing order.
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data_handling::DatasetKind;
use crate::error::{OvwtError, Result};
use crate::models::BinaryClassifier;

/// Scores of one model on one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetScore {
    pub roc_auc: f64,
    pub accuracy: f64,
}

/// Area under the ROC curve of `scores` against binary `labels`.
///
/// Tied scores receive their average rank. Returns `None` when the lengths
/// differ or the labels contain a single class, for which the AUC is
/// undefined.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }
    let n = scores.len();
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of ascending ranks (1-based) of the positive samples
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            if labels[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j;
    }

    let n_pos_f = n_pos as f64;
    let u = rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Some(u / (n_pos_f * n_neg as f64))
}

/// Fraction of predictions equal to the labels; `None` when the lengths
/// differ or there are no labels.
pub fn accuracy(predicted: &[bool], labels: &[bool]) -> Option<f64> {
    if predicted.len() != labels.len() || labels.is_empty() {
        return None;
    }
    let correct = predicted.iter().zip(labels).filter(|(p, l)| p == l).count();
    Some(correct as f64 / labels.len() as f64)
}

/// Score `model` on `(features, labels)`.
///
/// The predicted label of a row is `P(variant) >= 0.5`. Single-class labels
/// are an error naming `variant` and `dataset`.
pub fn score<M: BinaryClassifier + ?Sized>(
    model: &M,
    features: &Array2<f64>,
    labels: &[bool],
    variant: &str,
    dataset: DatasetKind,
) -> Result<DatasetScore> {
    let proba = model.predict_proba(features);
    if proba.nrows() != labels.len() || proba.ncols() != 2 {
        return Err(OvwtError::ShapeMismatch(format!(
            "model returned probabilities of shape {:?} for {} rows",
            proba.dim(),
            labels.len()
        )));
    }
    let p_variant = proba.column(1).to_vec();
    let predicted: Vec<bool> = p_variant.iter().map(|&p| p >= 0.5).collect();

    let roc_auc = roc_auc(&p_variant, labels).ok_or_else(|| OvwtError::UndefinedRocAuc {
        variant: variant.to_string(),
        dataset,
    })?;
    let accuracy = accuracy(&predicted, labels).ok_or_else(|| {
        OvwtError::ShapeMismatch(format!("no labels to score '{}' on {}", variant, dataset))
    })?;

    log::info!("{} ROC AUC: {:.2}", dataset, roc_auc);
    log::info!("{} Accuracy: {:.2}", dataset, accuracy);

    Ok(DatasetScore { roc_auc, accuracy })
}

/// One row of the metrics table.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub label: String,
    /// Aligned with `MetricsTable::datasets`; `None` when the variant had no
    /// rows in that dataset.
    pub scores: Vec<Option<DatasetScore>>,
    pub group: Option<String>,
}

/// Per-variant metrics with a schema fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    target_column: String,
    datasets: Vec<DatasetKind>,
    group_column: Option<String>,
    rows: Vec<MetricsRow>,
}

impl MetricsTable {
    pub fn new(target_column: impl Into<String>, datasets: Vec<DatasetKind>) -> Self {
        Self {
            target_column: target_column.into(),
            datasets,
            group_column: None,
            rows: Vec::new(),
        }
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn datasets(&self) -> &[DatasetKind] {
        &self.datasets
    }

    pub fn group_column(&self) -> Option<&str> {
        self.group_column.as_deref()
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in output order, e.g. `train_roc_auc, train_accuracy, ...`.
    pub fn metric_columns(&self) -> Vec<String> {
        self.datasets
            .iter()
            .flat_map(|d| [format!("{}_roc_auc", d), format!("{}_accuracy", d)])
            .collect()
    }

    /// Append a row; `scores` must be given for each dataset of the schema.
    pub fn push(&mut self, label: impl Into<String>, scores: Vec<Option<DatasetScore>>) -> Result<()> {
        if scores.len() != self.datasets.len() {
            return Err(OvwtError::ShapeMismatch(format!(
                "metrics row has {} dataset entries, table has {}",
                scores.len(),
                self.datasets.len()
            )));
        }
        self.rows.push(MetricsRow {
            label: label.into(),
            scores,
            group: None,
        });
        Ok(())
    }

    /// Score of `label` on `dataset`, if that cell was populated.
    pub fn get(&self, label: &str, dataset: DatasetKind) -> Option<DatasetScore> {
        let pos = self.datasets.iter().position(|d| *d == dataset)?;
        self.rows
            .iter()
            .find(|row| row.label == label)
            .and_then(|row| row.scores[pos])
    }

    /// All values of one metric column, in row order.
    pub fn roc_auc_column(&self, dataset: DatasetKind) -> Vec<Option<f64>> {
        match self.datasets.iter().position(|d| *d == dataset) {
            Some(pos) => self
                .rows
                .iter()
                .map(|row| row.scores[pos].map(|s| s.roc_auc))
                .collect(),
            None => vec![None; self.rows.len()],
        }
    }

    /// Tag every row with a stratum value.
    pub fn with_group(mut self, column: impl Into<String>, value: &str) -> Self {
        self.group_column = Some(column.into());
        for row in self.rows.iter_mut() {
            row.group = Some(value.to_string());
        }
        self
    }

    /// Append the rows of `other`, which must share this table's schema.
    pub fn extend(&mut self, other: MetricsTable) -> Result<()> {
        if other.datasets != self.datasets
            || other.target_column != self.target_column
            || other.group_column != self.group_column
        {
            return Err(OvwtError::ShapeMismatch(
                "cannot concatenate metrics tables with different schemas".to_string(),
            ));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Row-wise concatenation of tables sharing one schema.
    pub fn concat(tables: Vec<MetricsTable>) -> Result<Option<MetricsTable>> {
        let mut iter = tables.into_iter();
        let Some(mut first) = iter.next() else {
            return Ok(None);
        };
        for table in iter {
            first.extend(table)?;
        }
        Ok(Some(first))
    }

    /// Rows ordered by label, descending; ties keep their relative order.
    pub fn sorted_by_label_desc(&self) -> MetricsTable {
        let mut sorted = self.clone();
        sorted.rows.sort_by(|a, b| b.label.cmp(&a.label));
        sorted
    }
}
