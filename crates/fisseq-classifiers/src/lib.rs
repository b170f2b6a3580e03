//! fisseq-classifiers: one-vs-wild-type (OvWT) classifiers over variant
//! feature embeddings.
//!
//! For every variant label a binary "wild type vs. variant" classifier is
//! trained with class-balanced weights, scored with ROC AUC and accuracy on
//! the train / eval / optional test splits, and explained with per-feature
//! attribution values. Stratified runs and wild-type-vs-wild-type null runs
//! are built on the same pipeline.
//!
//! Trainers and attribution engines are collaborators behind the
//! `ClassifierTrainer` and `AttributionEngine` traits; the crate ships a GBDT
//! trainer, a decision-stump trainer and a sampling Shapley engine.
pub mod attribution;
pub mod balanced;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod experiments;
pub mod io;
pub mod metrics;
pub mod models;
pub mod ovwt;
pub mod partition;
pub mod registry;
pub mod report;

pub use error::{OvwtError, Result};
