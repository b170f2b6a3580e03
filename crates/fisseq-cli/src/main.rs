use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use fisseq_cli::ovwt::input::OvwtRunInputs;
use fisseq_cli::ovwt::run::{
    run_attributions, run_single_feature_cmd, run_stratified_cmd, run_stratified_test, run_train,
    run_wt_control_cmd,
};

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FISSEQ_LOG", "error,fisseq=info"))
        .init();

    let matches = Command::new("fisseq")
        .version(clap::crate_version!())
        .about("\u{1F9EC} FISSEQ CLI - One-vs-Wild-Type Variant Classifiers")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("ovwt")
                .about("Train, evaluate and explain one-vs-wild-type classifiers")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    run_args(Command::new("train").about(
                        "Train one wild-type vs. variant classifier per variant and compute attributions",
                    ))
                    .arg(model_type_arg())
                    .arg(permute_labels_arg())
                    .arg(no_attributions_arg()),
                )
                .subcommand(
                    run_args(Command::new("single-feature").about(
                        "Train decision stumps and report the single feature each variant splits on",
                    ))
                    .arg(no_attributions_arg()),
                )
                .subcommand(
                    run_args(Command::new("attributions").about(
                        "Score and explain the variants of a previously trained model registry",
                    ))
                    .arg(models_arg()),
                )
                .subcommand(
                    run_args(Command::new("stratified").about(
                        "Train an independent set of classifiers within each value of a grouping column",
                    ))
                    .arg(stratify_column_arg())
                    .arg(model_type_arg())
                    .arg(permute_labels_arg())
                    .arg(no_attributions_arg()),
                )
                .subcommand(
                    run_args(Command::new("stratified-test").about(
                        "Evaluate a stratified model registry stratum by stratum",
                    ))
                    .arg(stratify_column_arg())
                    .arg(models_arg())
                    .arg(no_attributions_arg()),
                )
                .subcommand(
                    run_args(Command::new("wtvwt-control").about(
                        "Run repeated wild-type vs. wild-type null trials",
                    ))
                    .arg(model_type_arg())
                    .arg(no_attributions_arg())
                    .arg(
                        Arg::new("num_iters")
                            .long("num-iters")
                            .help("Number of control trials. Overrides control.num_iters in the config.")
                            .value_parser(clap::value_parser!(usize))
                            .value_hint(ValueHint::Other),
                    )
                    .arg(
                        Arg::new("sample_proportion")
                            .long("sample-proportion")
                            .help(
                                "Fraction of wild-type rows relabelled in each trial. \
                                 Overrides control.sample_proportion in the config.",
                            )
                            .value_parser(clap::value_parser!(f64))
                            .value_hint(ValueHint::Other),
                    ),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("ovwt", sub_m)) => handle_ovwt(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

/// Inputs and options shared by every `ovwt` subcommand.
fn run_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("train")
                .help("Training split (*.csv or *.tsv)")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("eval")
                .help("Evaluation split (*.csv or *.tsv)")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("metadata")
                .help("Metadata JSON naming the target and feature columns")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_dir")
                .help("Directory the run outputs are written to")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .help("Optional held-out test split (*.csv or *.tsv)")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("wt_key")
                .long("wt-key")
                .help("Target value identifying wild-type rows [default: WT]")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for every shuffle and subsample. Overrides the seed in the config.")
                .value_parser(clap::value_parser!(u64))
                .value_hint(ValueHint::Other),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the run JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("no_report")
                .long("no-report")
                .help("Disable HTML report generation.")
                .action(ArgAction::SetTrue),
        )
}

fn model_type_arg() -> Arg {
    Arg::new("model_type")
        .long("model-type")
        .help("Override the model type from the JSON config.")
        .value_parser(["gbdt", "stump"])
        .value_hint(ValueHint::Other)
}

fn permute_labels_arg() -> Arg {
    Arg::new("permute_labels")
        .long("permute-labels")
        .help("Shuffle the label column of every split before training (null baseline).")
        .action(ArgAction::SetTrue)
}

fn no_attributions_arg() -> Arg {
    Arg::new("no_attributions")
        .long("no-attributions")
        .help("Skip the per-row feature attributions.")
        .action(ArgAction::SetTrue)
}

fn stratify_column_arg() -> Arg {
    Arg::new("stratify_column")
        .long("stratify-column")
        .help("Grouping column to stratify over")
        .required(true)
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .value_hint(ValueHint::Other)
}

fn models_arg() -> Arg {
    Arg::new("models")
        .short('m')
        .long("models")
        .help("Path to a models.json registry written by a training run")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn handle_ovwt(matches: &ArgMatches) -> Result<()> {
    let Some((name, sub_m)) = matches.subcommand() else {
        unreachable!("Subcommand is required by CLI configuration")
    };

    let result = OvwtRunInputs::from_arguments(sub_m).and_then(|inputs| {
        if sub_m.get_one::<PathBuf>("config").is_none() {
            eprintln!("[FISSEQ::OvWT] No config provided; using defaults.");
            let default_json = serde_json::to_string_pretty(&inputs.config).unwrap_or_default();
            eprintln!("[FISSEQ::OvWT] Default config:\n{}", default_json);
        }
        log::info!("[FISSEQ::OvWT] Running {} into {:?}", name, inputs.output_dir);

        match name {
            "train" => run_train(&inputs),
            "single-feature" => run_single_feature_cmd(&inputs),
            "attributions" => run_attributions(&inputs),
            "stratified" => run_stratified_cmd(&inputs),
            "stratified-test" => run_stratified_test(&inputs),
            "wtvwt-control" => run_wt_control_cmd(&inputs),
            _ => unreachable!(),
        }
    });

    match result {
        Ok(written) => {
            eprintln!("[FISSEQ::OvWT] Completed {}: wrote {} files.", name, written.len());
            Ok(())
        }
        Err(e) => {
            log::error!("OvWT {} failed: {:#}", name, e);
            std::process::exit(1)
        }
    }
}
