//! Run reports: metrics overview, ROC AUC charts and the run configuration.
pub mod plots;
pub mod report;

use maud::html;

use crate::experiments::{null_summary, SelectedFeature};
use crate::metrics::MetricsTable;
use plots::{mean_roc_auc, plot_null_histogram, plot_roc_auc_bars};
pub use report::{Report, ReportSection};

/// What kind of run the report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Ovwt,
    SingleFeature,
    Stratified,
    Evaluation,
    WtControl,
}

impl RunKind {
    pub fn title(&self) -> &'static str {
        match self {
            RunKind::Ovwt => "One-vs-Wild-Type Report",
            RunKind::SingleFeature => "Single-Feature One-vs-Wild-Type Report",
            RunKind::Stratified => "Stratified One-vs-Wild-Type Report",
            RunKind::Evaluation => "One-vs-Wild-Type Evaluation Report",
            RunKind::WtControl => "Wild-Type vs. Wild-Type Control Report",
        }
    }
}

/// Build the report of one run.
///
/// `config_json` is shown verbatim in the configuration section.
pub fn ovwt_report(
    kind: RunKind,
    metrics: &MetricsTable,
    selected: Option<&[SelectedFeature]>,
    config_json: &str,
) -> Report {
    let mut report = Report::new("fisseq", env!("CARGO_PKG_VERSION"), None, kind.title());

    /* Section 1: Overview */
    {
        let mut overview = ReportSection::new("Overview");
        let means = mean_roc_auc(metrics);
        overview.add_content(html! {
            p {
                (metrics.len()) " classifiers over the "
                (metrics.target_column()) " column"
                @if let Some(group) = metrics.group_column() {
                    ", stratified by " (group)
                }
                "."
            }
            table {
                tr { th { "Dataset" } th { "Mean ROC AUC" } }
                @for (dataset, mean) in &means {
                    tr {
                        td { (dataset) }
                        td {
                            @match mean {
                                Some(m) => { (format!("{:.3}", m)) }
                                None => { "-" }
                            }
                        }
                    }
                }
            }
        });
        report.add_section(overview);
    }

    /* Section 2: per-variant or null-distribution charts */
    if kind == RunKind::WtControl {
        let mut null_section = ReportSection::new("Null Distribution");
        null_section.add_content(html! {
            p { "ROC AUC of classifiers separating randomly relabelled wild-type rows from the rest of the wild type." }
            table {
                tr { th { "Dataset" } th { "Trials" } th { "Mean" } th { "Std. dev." } }
                @for &dataset in metrics.datasets() {
                    @if let Some(summary) = null_summary(metrics, dataset) {
                        tr {
                            td { (dataset) }
                            td { (summary.n) }
                            td { (format!("{:.3}", summary.mean)) }
                            td { (format!("{:.3}", summary.std_dev)) }
                        }
                    }
                }
            }
        });
        null_section.add_plot(plot_null_histogram(metrics, "Null ROC AUC"));
        report.add_section(null_section);
    } else {
        let mut roc_section = ReportSection::new("ROC AUC");
        roc_section.add_content(html! { "ROC AUC of each variant classifier on every dataset it occurs in." });
        roc_section.add_plot(plot_roc_auc_bars(metrics, "ROC AUC per Variant"));
        report.add_section(roc_section);
    }

    if let Some(selected) = selected {
        let mut features = ReportSection::new("Selected Features");
        features.add_content(html! {
            table {
                tr { th { (metrics.target_column()) } th { "Feature" } }
                @for feature in selected {
                    tr { td { (feature.label) } td { (feature.feature_name) } }
                }
            }
        });
        report.add_section(features);
    }

    /* Section 3: Configuration */
    {
        let mut config_section = ReportSection::new("Configuration");
        config_section.add_content(html! {
            style {
                ".code-container {
                    background-color: #f5f5f5;
                    padding: 10px;
                    border-radius: 5px;
                    overflow-x: auto;
                    font-family: monospace;
                    white-space: pre-wrap;
                }"
            }
            div class="code-container" {
                pre {
                    code { (config_json) }
                }
            }
        });
        report.add_section(config_section);
    }

    report
}
