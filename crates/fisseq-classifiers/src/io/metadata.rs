use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::data_handling::Metadata;
use crate::error::{OvwtError, Result};

/// Load and validate the metadata JSON describing the input tables.
pub fn load_metadata<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| OvwtError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata: Metadata =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| OvwtError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    metadata.validate()?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_valid_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(
            &path,
            r#"{"target_column": "aaChanges", "feature_columns": ["emb_0", "emb_1"]}"#,
        )
        .unwrap();
        let metadata = load_metadata(&path).unwrap();
        assert_eq!(metadata.feature_columns.len(), 2);
    }

    #[test]
    fn missing_key_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, r#"{"target_column": "aaChanges"}"#).unwrap();
        assert!(matches!(load_metadata(&path).unwrap_err(), OvwtError::Json { .. }));
    }

    #[test]
    fn empty_feature_list_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, r#"{"target_column": "aaChanges", "feature_columns": []}"#).unwrap();
        assert!(matches!(
            load_metadata(&path).unwrap_err(),
            OvwtError::InvalidMetadata(_)
        ));
    }
}
