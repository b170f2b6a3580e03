//! In-memory dataset splits and the metadata describing them.
//!
//! A `DatasetSplit` holds the target label of every row, the numeric feature
//! matrix (rows aligned with the labels) and any auxiliary grouping columns
//! that were requested at load time. Splits are never mutated in place by the
//! pipeline; every transformation returns a new split.
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use ndarray::{Array2, Axis};
use rand::seq::{index, SliceRandom};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{OvwtError, Result};

/// Default key identifying wild-type rows in the target column.
pub const DEFAULT_WT_KEY: &str = "WT";

/// Static description of the input tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub target_column: String,
    pub feature_columns: Vec<String>,
}

impl Metadata {
    pub fn new(target_column: impl Into<String>, feature_columns: Vec<String>) -> Self {
        Self {
            target_column: target_column.into(),
            feature_columns,
        }
    }

    /// Reject metadata that cannot describe a usable table.
    pub fn validate(&self) -> Result<()> {
        if self.target_column.trim().is_empty() {
            return Err(OvwtError::InvalidMetadata(
                "target_column must not be empty".to_string(),
            ));
        }
        if self.feature_columns.is_empty() {
            return Err(OvwtError::InvalidMetadata(
                "feature_columns must list at least one column".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for column in &self.feature_columns {
            if !seen.insert(column.as_str()) {
                return Err(OvwtError::InvalidMetadata(format!(
                    "feature column '{}' is listed twice",
                    column
                )));
            }
            if column == &self.target_column {
                return Err(OvwtError::InvalidMetadata(format!(
                    "target column '{}' is also listed as a feature",
                    column
                )));
            }
        }
        Ok(())
    }
}

/// The named datasets a run can score against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Train,
    Eval,
    Test,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Train => "train",
            DatasetKind::Eval => "eval",
            DatasetKind::Test => "test",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table of samples: labels, features and optional grouping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    pub labels: Vec<String>,
    pub features: Array2<f64>,
    /// Auxiliary categorical columns (e.g. a stratification column), row aligned.
    pub groups: BTreeMap<String, Vec<String>>,
}

impl DatasetSplit {
    pub fn new(labels: Vec<String>, features: Array2<f64>) -> Result<Self> {
        if labels.len() != features.nrows() {
            return Err(OvwtError::ShapeMismatch(format!(
                "{} labels for a feature matrix with {} rows",
                labels.len(),
                features.nrows()
            )));
        }
        Ok(Self {
            labels,
            features,
            groups: BTreeMap::new(),
        })
    }

    /// Attach a row-aligned grouping column.
    pub fn with_group(mut self, column: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let column = column.into();
        if values.len() != self.len() {
            return Err(OvwtError::ShapeMismatch(format!(
                "group column '{}' has {} values for {} rows",
                column,
                values.len(),
                self.len()
            )));
        }
        self.groups.insert(column, values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Distinct labels in order of first appearance.
    pub fn distinct_labels(&self) -> Vec<String> {
        distinct_in_order(&self.labels)
    }

    /// Number of rows carrying each label.
    pub fn label_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_label(&self, label: &str) -> usize {
        self.labels.iter().filter(|l| l.as_str() == label).count()
    }

    /// Keep the rows where `mask` is true, preserving their order.
    pub fn filter(&self, mask: &[bool]) -> DatasetSplit {
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| if keep { Some(i) } else { None })
            .collect();
        self.select_rows(&selected)
    }

    pub fn select_rows(&self, indices: &[usize]) -> DatasetSplit {
        DatasetSplit {
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
            features: self.features.select(Axis(0), indices),
            groups: self
                .groups
                .iter()
                .map(|(name, values)| {
                    (
                        name.clone(),
                        indices.iter().map(|&i| values[i].clone()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Rows whose label equals `label`.
    pub fn only_label(&self, label: &str) -> DatasetSplit {
        let mask: Vec<bool> = self.labels.iter().map(|l| l == label).collect();
        self.filter(&mask)
    }

    /// Shuffle the label column independently of the features.
    pub fn permute_labels<R: Rng + ?Sized>(&self, rng: &mut R) -> DatasetSplit {
        let mut labels = self.labels.clone();
        labels.shuffle(rng);
        DatasetSplit {
            labels,
            features: self.features.clone(),
            groups: self.groups.clone(),
        }
    }

    /// Append `suffix` to the label of a random `proportion` of rows.
    ///
    /// The number of relabelled rows is `floor(len * proportion)`.
    pub fn sample_and_relabel<R: Rng + ?Sized>(
        &self,
        proportion: f64,
        suffix: &str,
        rng: &mut R,
    ) -> Result<DatasetSplit> {
        if !(0.0..=1.0).contains(&proportion) {
            return Err(OvwtError::InvalidParameter(format!(
                "sample proportion must lie in [0, 1], got {}",
                proportion
            )));
        }
        let n_sampled = (self.len() as f64 * proportion) as usize;
        let mut labels = self.labels.clone();
        for idx in index::sample(rng, self.len(), n_sampled).into_iter() {
            labels[idx].push_str(suffix);
        }
        Ok(DatasetSplit {
            labels,
            features: self.features.clone(),
            groups: self.groups.clone(),
        })
    }

    /// Values of a grouping column, failing when it was not loaded.
    pub fn group_values(&self, column: &str) -> Result<&[String]> {
        self.groups
            .get(column)
            .map(|values| values.as_slice())
            .ok_or_else(|| OvwtError::MissingColumn {
                column: column.to_string(),
                source_name: "dataset split".to_string(),
            })
    }

    /// Rows whose grouping column equals `value`.
    pub fn stratum(&self, column: &str, value: &str) -> Result<DatasetSplit> {
        let mask: Vec<bool> = self
            .group_values(column)?
            .iter()
            .map(|v| v == value)
            .collect();
        Ok(self.filter(&mask))
    }
}

/// The train / eval / optional test splits of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Splits {
    pub train: DatasetSplit,
    pub eval: DatasetSplit,
    pub test: Option<DatasetSplit>,
}

impl Splits {
    pub fn new(train: DatasetSplit, eval: DatasetSplit, test: Option<DatasetSplit>) -> Self {
        Self { train, eval, test }
    }

    /// Datasets active for this run, in the order metrics are reported.
    pub fn active_datasets(&self) -> Vec<DatasetKind> {
        let mut kinds = vec![DatasetKind::Train, DatasetKind::Eval];
        if self.test.is_some() {
            kinds.push(DatasetKind::Test);
        }
        kinds
    }

    pub fn get(&self, kind: DatasetKind) -> Option<&DatasetSplit> {
        match kind {
            DatasetKind::Train => Some(&self.train),
            DatasetKind::Eval => Some(&self.eval),
            DatasetKind::Test => self.test.as_ref(),
        }
    }

    /// Iterate over `(kind, split)` for every supplied split.
    pub fn iter(&self) -> impl Iterator<Item = (DatasetKind, &DatasetSplit)> {
        self.active_datasets()
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|split| (kind, split)))
    }

    /// Apply `f` to every supplied split.
    pub fn try_map<F>(&self, mut f: F) -> Result<Splits>
    where
        F: FnMut(DatasetKind, &DatasetSplit) -> Result<DatasetSplit>,
    {
        Ok(Splits {
            train: f(DatasetKind::Train, &self.train)?,
            eval: f(DatasetKind::Eval, &self.eval)?,
            test: match &self.test {
                Some(test) => Some(f(DatasetKind::Test, test)?),
                None => None,
            },
        })
    }

    /// Copy with the label column of train, eval and test shuffled, in that
    /// order, from one RNG seeded with `seed`.
    pub fn permuted(&self, seed: u64) -> Splits {
        let mut rng = StdRng::seed_from_u64(seed);
        Splits {
            train: self.train.permute_labels(&mut rng),
            eval: self.eval.permute_labels(&mut rng),
            test: self.test.as_ref().map(|test| test.permute_labels(&mut rng)),
        }
    }

    pub fn n_features(&self) -> usize {
        self.train.n_features()
    }

    /// Ensure every split has the same number of feature columns.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_features();
        for (kind, split) in self.iter() {
            if split.n_features() != n {
                return Err(OvwtError::ShapeMismatch(format!(
                    "{} split has {} feature columns, train has {}",
                    kind,
                    split.n_features(),
                    n
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn distinct_in_order(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}
