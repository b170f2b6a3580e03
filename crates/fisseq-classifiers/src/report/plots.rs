use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Histogram, Plot};

use crate::data_handling::DatasetKind;
use crate::metrics::MetricsTable;

/// Row label used on the x axis; grouped rows read `label (group)`.
fn row_name(label: &str, group: Option<&str>) -> String {
    match group {
        Some(group) => format!("{} ({})", label, group),
        None => label.to_string(),
    }
}

/// Grouped bars of ROC AUC per variant, one trace per dataset.
///
/// Skipped cells are left out of their dataset's trace.
pub fn plot_roc_auc_bars(metrics: &MetricsTable, title: &str) -> Plot {
    let mut plot = Plot::new();
    for &dataset in metrics.datasets() {
        let (names, values): (Vec<String>, Vec<f64>) = metrics
            .rows()
            .iter()
            .zip(metrics.roc_auc_column(dataset))
            .filter_map(|(row, auc)| auc.map(|v| (row_name(&row.label, row.group.as_deref()), v)))
            .unzip();
        plot.add_trace(Bar::new(names, values).name(dataset.as_str()));
    }

    let layout = Layout::new()
        .title(title)
        .bar_mode(BarMode::Group)
        .x_axis(Axis::new().title("Variant"))
        .y_axis(Axis::new().title("ROC AUC").range(vec![0.0, 1.0]));
    plot.set_layout(layout);
    plot
}

/// Histogram of null ROC AUC values, one trace per dataset.
pub fn plot_null_histogram(metrics: &MetricsTable, title: &str) -> Plot {
    let mut plot = Plot::new();
    for &dataset in metrics.datasets() {
        let values: Vec<f64> = metrics.roc_auc_column(dataset).into_iter().flatten().collect();
        if values.is_empty() {
            continue;
        }
        plot.add_trace(Histogram::new(values).name(dataset.as_str()));
    }

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("ROC AUC"))
        .y_axis(Axis::new().title("Trials"));
    plot.set_layout(layout);
    plot
}

/// Mean ROC AUC of each dataset, skipping empty cells.
pub fn mean_roc_auc(metrics: &MetricsTable) -> Vec<(DatasetKind, Option<f64>)> {
    metrics
        .datasets()
        .iter()
        .map(|&dataset| {
            let values: Vec<f64> = metrics.roc_auc_column(dataset).into_iter().flatten().collect();
            let mean = if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            };
            (dataset, mean)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DatasetScore;

    fn table() -> MetricsTable {
        let mut table = MetricsTable::new("label", vec![DatasetKind::Train, DatasetKind::Eval]);
        let s = |roc_auc| Some(DatasetScore { roc_auc, accuracy: 1.0 });
        table.push("V1", vec![s(0.9), s(0.7)]).unwrap();
        table.push("V2", vec![s(0.8), None]).unwrap();
        table
    }

    #[test]
    fn means_skip_empty_cells() {
        let means = mean_roc_auc(&table());
        assert!((means[0].1.unwrap() - 0.85).abs() < 1e-12);
        assert_eq!(means[1].1, Some(0.7));
    }

    #[test]
    fn plots_serialise_every_dataset_trace() {
        let json = plot_roc_auc_bars(&table(), "ROC AUC").to_json();
        assert!(json.contains("\"train\""));
        assert!(json.contains("\"eval\""));
        let hist = plot_null_histogram(&table(), "Null").to_json();
        assert!(hist.contains("histogram"));
    }
}
