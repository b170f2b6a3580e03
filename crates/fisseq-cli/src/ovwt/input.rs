use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ArgMatches;

use fisseq_classifiers::config::{OvwtConfig, ModelType};
use fisseq_classifiers::data_handling::{Metadata, Splits};
use fisseq_classifiers::io::{load_metadata, read_split_with_config, TableReaderConfig};

/// Everything a `fisseq ovwt` subcommand needs, after config file and flag
/// overrides have been merged.
#[derive(Debug, Clone)]
pub struct OvwtRunInputs {
    pub train: PathBuf,
    pub eval: PathBuf,
    pub test: Option<PathBuf>,
    pub metadata: PathBuf,
    pub output_dir: PathBuf,
    pub config: OvwtConfig,
    pub stratify_column: Option<String>,
    /// Persisted registry to evaluate or explain instead of training.
    pub models: Option<PathBuf>,
}

/// Load a run configuration from a JSON file.
pub fn load_ovwt_config<P: AsRef<Path>>(path: P) -> Result<OvwtConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: OvwtConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

pub fn validate_tsv_or_csv_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path.display()),
    }

    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    Ok(())
}

/// Merge the optional config file with command line overrides.
///
/// Flags that a subcommand does not declare are simply absent.
pub fn config_from_arguments(matches: &ArgMatches) -> Result<OvwtConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("[FISSEQ::OvWT] Using config: {:?}", path);
            load_ovwt_config(path)?
        }
        None => OvwtConfig::default(),
    };

    if let Some(wt_key) = try_get::<String>(matches, "wt_key") {
        config.wt_key = wt_key.clone();
    }
    if let Some(seed) = try_get::<u64>(matches, "seed") {
        config.seed = *seed;
    }
    if let Some(model_type) = try_get::<String>(matches, "model_type") {
        config.model.model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
    }
    if try_flag(matches, "permute_labels") {
        config.permute_labels = true;
    }
    if try_flag(matches, "no_report") {
        config.report = false;
    }
    if try_flag(matches, "no_attributions") {
        config.compute_attributions = false;
    }
    if let Some(num_iters) = try_get::<usize>(matches, "num_iters") {
        config.control.num_iters = *num_iters;
    }
    if let Some(proportion) = try_get::<f64>(matches, "sample_proportion") {
        config.control.sample_proportion = *proportion;
    }

    Ok(config)
}

fn try_get<'a, T: Clone + Send + Sync + 'static>(matches: &'a ArgMatches, id: &str) -> Option<&'a T> {
    matches.try_get_one::<T>(id).ok().flatten()
}

fn try_flag(matches: &ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

impl OvwtRunInputs {
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let path = |id: &str| -> Result<PathBuf> {
            matches
                .get_one::<PathBuf>(id)
                .cloned()
                .with_context(|| format!("missing required argument <{}>", id))
        };

        let inputs = Self {
            train: path("train")?,
            eval: path("eval")?,
            test: try_get::<PathBuf>(matches, "test").cloned(),
            metadata: path("metadata")?,
            output_dir: path("output_dir")?,
            config: config_from_arguments(matches)?,
            stratify_column: try_get::<String>(matches, "stratify_column").cloned(),
            models: try_get::<PathBuf>(matches, "models").cloned(),
        };
        inputs.validate()?;
        Ok(inputs)
    }

    /// Check the input files before anything is read.
    pub fn validate(&self) -> Result<()> {
        validate_tsv_or_csv_file(&self.train)?;
        validate_tsv_or_csv_file(&self.eval)?;
        if let Some(test) = &self.test {
            validate_tsv_or_csv_file(test)?;
        }
        if !self.metadata.exists() {
            anyhow::bail!("File does not exist: {}", self.metadata.display());
        }
        if let Some(models) = &self.models {
            if !models.exists() {
                anyhow::bail!("File does not exist: {}", models.display());
            }
        }
        Ok(())
    }

    pub fn load_metadata(&self) -> Result<Metadata> {
        load_metadata(&self.metadata)
            .with_context(|| format!("Failed to load metadata: {}", self.metadata.display()))
    }

    /// Read every split, keeping `group_column` when one is given.
    pub fn load_splits(&self, metadata: &Metadata, group_column: Option<&str>) -> Result<Splits> {
        let mut reader = TableReaderConfig::from_metadata(metadata);
        if let Some(column) = group_column {
            reader = reader.with_group_column(column);
        }
        let read = |path: &Path| {
            log::info!("[FISSEQ::OvWT] Reading {}", path.display());
            read_split_with_config(path, &reader)
                .with_context(|| format!("Failed to read split: {}", path.display()))
        };

        let train = read(&self.train)?;
        let eval = read(&self.eval)?;
        let test = match &self.test {
            Some(path) => Some(read(path)?),
            None => None,
        };
        Ok(Splits::new(train, eval, test))
    }

    pub fn require_stratify_column(&self) -> Result<&str> {
        self.stratify_column
            .as_deref()
            .context("--stratify-column is required for stratified runs")
    }

    pub fn require_models(&self) -> Result<&Path> {
        self.models
            .as_deref()
            .context("--models is required to reuse a trained registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::File::create(&path).unwrap();
        assert!(validate_tsv_or_csv_file(&path).is_err());

        let path = dir.path().join("data.tsv");
        std::fs::File::create(&path).unwrap();
        assert!(validate_tsv_or_csv_file(&path).is_ok());
    }

    #[test]
    fn config_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"seed": 7, "control": {"num_iters": 3}}"#).unwrap();

        let config = load_ovwt_config(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.control.num_iters, 3);
        assert_eq!(config.control.sample_proportion, 0.5);
        assert_eq!(config.wt_key, "WT");
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let err = load_ovwt_config("/nonexistent/config.json").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/config.json"));
    }
}
