pub mod metadata;
pub mod table;
pub mod writer;

pub use metadata::load_metadata;
pub use table::{read_split, read_split_with_config, TableReaderConfig};
pub use writer::{write_attributions_csv, write_metrics_csv, write_selected_features_csv};
