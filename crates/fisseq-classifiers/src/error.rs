use std::path::PathBuf;

use crate::data_handling::DatasetKind;

/// Errors raised by the one-vs-wild-type pipeline.
///
/// Configuration problems are reported before any model is fitted. Failures
/// that happen while a variant is being processed always carry the variant
/// label so a failed run can be traced back to its input.
#[derive(Debug, thiserror::Error)]
pub enum OvwtError {
    #[error("column '{column}' not found in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("no wild-type rows (key '{wt_key}') in the {dataset} split{}", stratum_suffix(.stratum))]
    NoWildType {
        wt_key: String,
        dataset: DatasetKind,
        stratum: Option<String>,
    },

    #[error("ROC AUC is undefined for variant '{variant}' on {dataset}: labels contain a single class")]
    UndefinedRocAuc { variant: String, dataset: DatasetKind },

    #[error("no fitted model registered for label '{0}'")]
    MissingModel(String),

    #[error("no models registered for stratum '{0}'")]
    MissingStratum(String),

    #[error("training failed for variant '{variant}'")]
    Training {
        variant: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("attribution failed for variant '{variant}'")]
    Attribution {
        variant: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("attribution table has {0} rows that were never written")]
    IncompleteAttribution(usize),

    #[error("failed to parse '{value}' in column '{column}' at row {row} of {}", .path.display())]
    Parse {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error on {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn stratum_suffix(stratum: &Option<String>) -> String {
    match stratum {
        Some(value) => format!(" of stratum '{}'", value),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, OvwtError>;
