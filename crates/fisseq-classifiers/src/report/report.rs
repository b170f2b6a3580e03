//! Self-contained HTML reports made of titled sections.
use std::path::Path;

use chrono::Local;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// One titled block of the report.
#[derive(Debug, Clone)]
pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
    n_plots: usize,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            content: Vec::new(),
            n_plots: 0,
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.content.push(content);
    }

    /// Embed a plotly chart; the plotly.js bundle is loaded once by the page.
    pub fn add_plot(&mut self, plot: Plot) {
        let div_id = format!("{}-plot-{}", slug(&self.title), self.n_plots);
        self.n_plots += 1;
        self.content
            .push(PreEscaped(plot.to_inline_html(Some(div_id.as_str()))));
    }

    fn render(&self) -> Markup {
        html! {
            section id=(slug(&self.title)) {
                h2 { (self.title) }
                @for block in &self.content {
                    div class="block" { (block) }
                }
            }
        }
    }
}

/// A report page.
#[derive(Debug, Clone)]
pub struct Report {
    software: String,
    version: String,
    logo: Option<String>,
    title: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(software: &str, version: &str, logo: Option<&str>, title: &str) -> Self {
        Self {
            software: software.to_string(),
            version: version.to_string(),
            logo: logo.map(|l| l.to_string()),
            title: title.to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.title.as_str())
    }

    pub fn render(&self) -> Markup {
        let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em auto; max-width: 1100px; color: #222; }
                        header { border-bottom: 1px solid #ddd; margin-bottom: 1.5em; }
                        .logo { height: 48px; }
                        .meta { color: #666; font-size: 0.9em; }
                        table { border-collapse: collapse; }
                        td, th { border: 1px solid #ddd; padding: 4px 8px; text-align: right; }
                        .block { margin: 1em 0; }"
                    }
                }
                body {
                    header {
                        @if let Some(logo) = &self.logo {
                            img class="logo" src=(logo) alt=(self.software);
                        }
                        h1 { (self.title) }
                        p class="meta" {
                            (self.software) " " (self.version) " | generated " (generated)
                        }
                    }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.render().into_string())
    }
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_in_order() {
        let mut report = Report::new("fisseq", "0.1.0", None, "OvWT Report");
        let mut a = ReportSection::new("Overview");
        a.add_content(html! { p { "hello" } });
        report.add_section(a);
        report.add_section(ReportSection::new("Configuration"));

        let page = report.render().into_string();
        let overview = page.find("<h2>Overview</h2>").unwrap();
        let config = page.find("<h2>Configuration</h2>").unwrap();
        assert!(overview < config);
        assert!(page.contains("<p>hello</p>"));
        assert!(page.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn plot_divs_are_unique_per_section() {
        let mut section = ReportSection::new("ROC AUC");
        section.add_plot(Plot::new());
        section.add_plot(Plot::new());
        let html = section.render().into_string();
        assert!(html.contains("roc-auc-plot-0"));
        assert!(html.contains("roc-auc-plot-1"));
    }
}
