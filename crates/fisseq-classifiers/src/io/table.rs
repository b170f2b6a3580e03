//! Delimited-text reader for dataset splits.
use std::path::Path;

use csv::StringRecord;
use ndarray::Array2;

use crate::data_handling::{DatasetSplit, Metadata};
use crate::error::{OvwtError, Result};

/// Options for reading one split.
#[derive(Debug, Clone)]
pub struct TableReaderConfig {
    pub target_column: String,
    /// Feature columns to load, in order.
    pub feature_columns: Vec<String>,
    /// Extra categorical columns to keep (e.g. a stratify column).
    pub group_columns: Vec<String>,
    /// Field delimiter; inferred from the file extension when `None`.
    pub delimiter: Option<u8>,
}

impl TableReaderConfig {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            target_column: metadata.target_column.clone(),
            feature_columns: metadata.feature_columns.clone(),
            group_columns: Vec::new(),
            delimiter: None,
        }
    }

    pub fn with_group_column(mut self, column: impl Into<String>) -> Self {
        self.group_columns.push(column.into());
        self
    }
}

/// `\t` for `.tsv`/`.tab` files, `,` otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

/// Read the split stored at `path` using the columns named by `metadata`.
pub fn read_split<P: AsRef<Path>>(path: P, metadata: &Metadata) -> Result<DatasetSplit> {
    read_split_with_config(path, &TableReaderConfig::from_metadata(metadata))
}

/// Read a split with explicit column configuration.
///
/// Missing columns are reported before any row is parsed; a feature cell that
/// is not a number is reported with its file, 1-based data row and column.
pub fn read_split_with_config<P: AsRef<Path>>(
    path: P,
    config: &TableReaderConfig,
) -> Result<DatasetSplit> {
    let path = path.as_ref();
    let csv_err = |source: csv::Error| OvwtError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter.unwrap_or_else(|| delimiter_for(path)))
        .has_headers(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let source_name = path.display().to_string();
    let require = |name: &str| -> Result<usize> {
        find_column(&headers, name).ok_or_else(|| OvwtError::MissingColumn {
            column: name.to_string(),
            source_name: source_name.clone(),
        })
    };

    let target_idx = require(&config.target_column)?;
    let feature_indices = config
        .feature_columns
        .iter()
        .map(|name| require(name))
        .collect::<Result<Vec<_>>>()?;
    let group_indices = config
        .group_columns
        .iter()
        .map(|name| require(name))
        .collect::<Result<Vec<_>>>()?;

    let mut labels = Vec::new();
    let mut features = Vec::new();
    let mut groups: Vec<Vec<String>> = vec![Vec::new(); group_indices.len()];

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let row = row_idx + 1;

        labels.push(field(&record, target_idx).to_string());
        for (&idx, name) in feature_indices.iter().zip(&config.feature_columns) {
            let raw = field(&record, idx);
            let value = raw.parse::<f64>().map_err(|_| OvwtError::Parse {
                path: path.to_path_buf(),
                row,
                column: name.clone(),
                value: raw.to_string(),
            })?;
            features.push(value);
        }
        for (values, &idx) in groups.iter_mut().zip(&group_indices) {
            values.push(field(&record, idx).to_string());
        }
    }

    let n_rows = labels.len();
    let x = Array2::from_shape_vec((n_rows, feature_indices.len()), features)
        .map_err(|e| OvwtError::ShapeMismatch(e.to_string()))?;
    log::debug!(
        "Read {} rows x {} features from {}",
        n_rows,
        feature_indices.len(),
        path.display()
    );

    let mut split = DatasetSplit::new(labels, x)?;
    for (name, values) in config.group_columns.iter().zip(groups) {
        split = split.with_group(name.clone(), values)?;
    }
    Ok(split)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn metadata() -> Metadata {
        Metadata::new("aaChanges", vec!["emb_1".into(), "emb_0".into()])
    }

    #[test]
    fn reads_columns_in_metadata_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "train.csv",
            "id,emb_0,aaChanges,emb_1\n0,0.5,WT,1.5\n1,-2,V1,3e-1\n",
        );
        let split = read_split(&path, &metadata()).unwrap();
        assert_eq!(split.labels, vec!["WT", "V1"]);
        assert_eq!(split.features, ndarray::array![[1.5, 0.5], [0.3, -2.0]]);
    }

    #[test]
    fn tab_separated_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "eval.tsv", "aaChanges\temb_0\temb_1\tplate\nWT\t1\t2\tA\n");
        let config = TableReaderConfig::from_metadata(&metadata()).with_group_column("plate");
        let split = read_split_with_config(&path, &config).unwrap();
        assert_eq!(split.group_values("plate").unwrap().to_vec(), vec!["A".to_string()]);
    }

    #[test]
    fn missing_column_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "train.csv", "aaChanges,emb_0\nWT,1\n");
        match read_split(&path, &metadata()).unwrap_err() {
            OvwtError::MissingColumn { column, .. } => assert_eq!(column, "emb_1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_cell_reports_row_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "train.csv", "aaChanges,emb_0,emb_1\nWT,1,2\nV1,abc,2\n");
        match read_split(&path, &metadata()).unwrap_err() {
            OvwtError::Parse { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "emb_0");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
