//! `fisseq ovwt` subcommands.
pub mod input;
pub mod output;
pub mod run;
