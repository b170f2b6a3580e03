//! CSV writers for run outputs.
use std::collections::HashMap;
use std::path::Path;

use crate::attribution::AttributionTable;
use crate::error::{OvwtError, Result};
use crate::experiments::SelectedFeature;
use crate::metrics::MetricsTable;

/// Name of the per-variant training row count column.
pub const EXAMPLE_COUNT_COLUMN: &str = "example_count";

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).map_err(|source| OvwtError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn write_record<I, T>(wtr: &mut csv::Writer<std::fs::File>, path: &Path, record: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    wtr.write_record(record).map_err(|source| OvwtError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn flush(mut wtr: csv::Writer<std::fs::File>, path: &Path) -> Result<()> {
    wtr.flush().map_err(|source| OvwtError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a metrics table; empty cells stand for skipped datasets.
///
/// With `example_counts`, a trailing `example_count` column holds the number
/// of training rows of each label (0 when absent).
pub fn write_metrics_csv<P: AsRef<Path>>(
    path: P,
    table: &MetricsTable,
    example_counts: Option<&HashMap<String, usize>>,
) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = writer(path)?;

    let mut header = vec![table.target_column().to_string()];
    if let Some(group) = table.group_column() {
        header.push(group.to_string());
    }
    header.extend(table.metric_columns());
    if example_counts.is_some() {
        header.push(EXAMPLE_COUNT_COLUMN.to_string());
    }
    write_record(&mut wtr, path, &header)?;

    for row in table.rows() {
        let mut record = vec![row.label.clone()];
        if table.group_column().is_some() {
            record.push(row.group.clone().unwrap_or_default());
        }
        for score in &row.scores {
            match score {
                Some(s) => {
                    record.push(s.roc_auc.to_string());
                    record.push(s.accuracy.to_string());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        if let Some(counts) = example_counts {
            record.push(counts.get(&row.label).copied().unwrap_or(0).to_string());
        }
        write_record(&mut wtr, path, &record)?;
    }

    flush(wtr, path)
}

/// Write an attribution table: label, optional group, `p_is_var`, then one
/// column per feature.
pub fn write_attributions_csv<P: AsRef<Path>>(path: P, table: &AttributionTable) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = writer(path)?;

    let mut header = vec![table.target_column.clone()];
    if let Some(group) = table.group_column() {
        header.push(group.to_string());
    }
    header.push("p_is_var".to_string());
    header.extend(table.feature_columns.iter().cloned());
    write_record(&mut wtr, path, &header)?;

    for (i, label) in table.labels.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(label.clone());
        if let Some((_, values)) = &table.group {
            record.push(values.get(i).cloned().unwrap_or_default());
        }
        record.push(table.p_is_var[i].to_string());
        record.extend(table.values.row(i).iter().map(|v| v.to_string()));
        write_record(&mut wtr, path, &record)?;
    }

    flush(wtr, path)
}

/// Write the `{target_column},feature_name` table of a single-feature run.
pub fn write_selected_features_csv<P: AsRef<Path>>(
    path: P,
    target_column: &str,
    selected: &[SelectedFeature],
) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = writer(path)?;
    write_record(&mut wtr, path, [target_column, "feature_name"])?;
    for feature in selected {
        write_record(&mut wtr, path, [feature.label.as_str(), feature.feature_name.as_str()])?;
    }
    flush(wtr, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::DatasetKind;
    use crate::metrics::DatasetScore;
    use ndarray::array;

    fn read(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn metrics_leave_skipped_cells_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train_results.csv");
        let mut table = MetricsTable::new("aaChanges", vec![DatasetKind::Train, DatasetKind::Eval]);
        let s = DatasetScore {
            roc_auc: 0.75,
            accuracy: 0.5,
        };
        table.push("V1", vec![Some(s), Some(s)]).unwrap();
        table.push("V2", vec![Some(s), None]).unwrap();
        let counts: HashMap<String, usize> = [("V1".to_string(), 10), ("V2".to_string(), 3)].into();

        write_metrics_csv(&path, &table.sorted_by_label_desc(), Some(&counts)).unwrap();
        assert_eq!(
            read(&path),
            vec![
                "aaChanges,train_roc_auc,train_accuracy,eval_roc_auc,eval_accuracy,example_count",
                "V2,0.75,0.5,,,3",
                "V1,0.75,0.5,0.75,0.5,10",
            ]
        );
    }

    #[test]
    fn grouped_metrics_carry_the_group_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train_results.csv");
        let mut table = MetricsTable::new("aaChanges", vec![DatasetKind::Train]);
        table.push("V1", vec![None]).unwrap();
        let table = table.with_group("plate", "A");
        write_metrics_csv(&path, &table, None).unwrap();
        assert_eq!(read(&path), vec!["aaChanges,plate,train_roc_auc,train_accuracy", "V1,A,,"]);
    }

    #[test]
    fn attribution_rows_follow_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval_attributions.csv");
        let table = AttributionTable {
            target_column: "aaChanges".into(),
            feature_columns: vec!["f0".into(), "f1".into()],
            labels: vec!["V1".into()],
            p_is_var: vec![0.25],
            values: array![[0.5, -1.0]],
            group: None,
        };
        write_attributions_csv(&path, &table).unwrap();
        assert_eq!(read(&path), vec!["aaChanges,p_is_var,f0,f1", "V1,0.25,0.5,-1"]);
    }

    #[test]
    fn selected_features_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected_features.csv");
        let selected = vec![SelectedFeature {
            label: "V1".into(),
            feature_name: "emb_3".into(),
        }];
        write_selected_features_csv(&path, "aaChanges", &selected).unwrap();
        assert_eq!(read(&path), vec!["aaChanges,feature_name", "V1,emb_3"]);
    }
}
