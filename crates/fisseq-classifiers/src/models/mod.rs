pub mod classifier_trait;
pub mod factory;
pub mod gbdt;
pub mod stump;
pub(crate) mod utils;

pub use classifier_trait::{BinaryClassifier, ClassifierTrainer};
pub use factory::{build_trainer, FittedModel, ModelTrainer};
