//! Presentation of scoring results.
//!
//! Renders the terminal dashboard (preview, metrics, charts) and builds the
//! JSON summary report. Nothing here feeds back into scoring.

use crate::config::ReportConfig;
use crate::types::{ScoredTable, Summary, FRAUD_PROBABILITY_COLUMN, PREDICTION_COLUMN};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Original columns shown in the preview before the scored columns
const PREVIEW_LEADING_COLUMNS: usize = 4;

/// Widest preview cell before truncation
const PREVIEW_CELL_WIDTH: usize = 12;

/// Width of the proportion chart bars
const CHART_WIDTH: usize = 40;

/// Count of probabilities per equal-width bucket over [0, 1]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbabilityHistogram {
    pub buckets: Vec<u64>,
}

impl ProbabilityHistogram {
    pub fn from_probabilities(probabilities: &[f64], bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        let mut buckets = vec![0u64; bucket_count];
        for &p in probabilities {
            let bucket = ((p * bucket_count as f64) as usize).min(bucket_count - 1);
            buckets[bucket] += 1;
        }
        Self { buckets }
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }
}

/// Machine-readable summary of one scoring run
#[derive(Debug, Clone, Serialize)]
pub struct ScoringReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub model: String,
    pub summary: Summary,
    pub fraud_rate: f64,
    pub probability_histogram: ProbabilityHistogram,
}

impl ScoringReport {
    pub fn new(
        source: &str,
        model: &str,
        table: &ScoredTable,
        summary: Summary,
        histogram_buckets: usize,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            source: source.to_string(),
            model: model.to_string(),
            fraud_rate: summary.fraud_rate(),
            summary,
            probability_histogram: ProbabilityHistogram::from_probabilities(
                table.probabilities(),
                histogram_buckets,
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Terminal rendering of a scored upload
pub struct Dashboard<'a> {
    table: &'a ScoredTable,
    summary: &'a Summary,
    config: &'a ReportConfig,
}

impl<'a> Dashboard<'a> {
    pub fn new(table: &'a ScoredTable, summary: &'a Summary, config: &'a ReportConfig) -> Self {
        Self {
            table,
            summary,
            config,
        }
    }

    /// Full dashboard text.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        lines.push("╔══════════════════════════════════════════════════════════════╗".to_string());
        lines.push("║               FRAUD DETECTION - PREDICTION RESULTS           ║".to_string());
        lines.push("╚══════════════════════════════════════════════════════════════╝".to_string());

        lines.extend(self.render_preview());
        lines.push(String::new());
        lines.extend(self.render_metrics());
        lines.push(String::new());
        lines.extend(self.render_proportions());
        lines.push(String::new());
        lines.extend(self.render_distribution());

        lines.join("\n")
    }

    /// First `preview_rows` scored rows
    fn render_preview(&self) -> Vec<String> {
        let headers = self.table.headers();
        let scored_columns: Vec<usize> = [FRAUD_PROBABILITY_COLUMN, PREDICTION_COLUMN]
            .iter()
            .filter_map(|name| headers.iter().position(|h| h == name))
            .collect();
        let leading: Vec<usize> = (0..headers.len())
            .filter(|i| !scored_columns.contains(i))
            .take(PREVIEW_LEADING_COLUMNS)
            .collect();
        let hidden = headers.len() - leading.len() - scored_columns.len();

        let shown = self.table.len().min(self.config.preview_rows);
        let mut lines = vec![format!(
            "Preview: first {} of {} rows{}",
            shown,
            self.table.len(),
            if hidden > 0 {
                format!(" ({} columns hidden)", hidden)
            } else {
                String::new()
            }
        )];

        let mut header_cells = vec![format!("{:>5}", "#")];
        header_cells.extend(
            leading
                .iter()
                .chain(scored_columns.iter())
                .map(|&i| cell(&headers[i])),
        );
        lines.push(header_cells.join(" "));

        for (index, row) in self.table.rows().iter().take(shown).enumerate() {
            let mut cells = vec![format!("{:>5}", index)];
            cells.extend(leading.iter().map(|&i| cell(&row[i])));
            cells.push(cell(&format!("{:.4}", self.table.probabilities()[index])));
            cells.push(cell(self.table.predictions()[index].as_str()));
            lines.push(cells.join(" "));
        }

        lines
    }

    fn render_metrics(&self) -> Vec<String> {
        vec![
            "Model Insights".to_string(),
            format!("  Total Transactions: {:>8}", self.summary.total),
            format!("  Fraudulent:         {:>8}", self.summary.fraudulent),
            format!("  Legitimate:         {:>8}", self.summary.legitimate),
        ]
    }

    /// Fraud vs legit share as two bars
    fn render_proportions(&self) -> Vec<String> {
        let mut lines = vec!["Fraud vs Legit Transactions".to_string()];
        for (label, count) in [
            ("Fraudulent", self.summary.fraudulent),
            ("Legitimate", self.summary.legitimate),
        ] {
            let pct = percent(count as u64, self.summary.total as u64);
            let bar_len = ((pct / 100.0) * CHART_WIDTH as f64).round() as usize;
            lines.push(format!(
                "  {:10} {:<width$} {:>5.1}% ({})",
                label,
                "█".repeat(bar_len.min(CHART_WIDTH)),
                pct,
                count,
                width = CHART_WIDTH
            ));
        }
        lines
    }

    fn render_distribution(&self) -> Vec<String> {
        let histogram = ProbabilityHistogram::from_probabilities(
            self.table.probabilities(),
            self.config.histogram_buckets,
        );
        let total = histogram.total();
        let bucket_count = histogram.buckets.len() as f64;

        let mut lines = vec!["Fraud Probability Distribution".to_string()];
        for (i, &count) in histogram.buckets.iter().enumerate() {
            let pct = percent(count, total);
            let bar_len = (pct / 2.0) as usize;
            lines.push(format!(
                "  {:.2}-{:.2}: {:>6} ({:>5.1}%) {}",
                i as f64 / bucket_count,
                (i + 1) as f64 / bucket_count,
                count,
                pct,
                "█".repeat(bar_len.min(CHART_WIDTH / 2))
            ));
        }
        lines
    }
}

fn percent(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Right-align and truncate a value for the preview grid.
fn cell(value: &str) -> String {
    let truncated: String = if value.chars().count() > PREVIEW_CELL_WIDTH {
        let mut s: String = value.chars().take(PREVIEW_CELL_WIDTH - 1).collect();
        s.push('…');
        s
    } else {
        value.to_string()
    };
    format!("{:>width$}", truncated, width = PREVIEW_CELL_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Prediction, RawTable};

    fn scored(rows: usize) -> (ScoredTable, Summary) {
        let headers: Vec<String> = ["Time", "V1", "V2", "V3", "V4", "Amount"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let data = (0..rows)
            .map(|i| headers.iter().map(|_| i.to_string()).collect())
            .collect();
        let raw = RawTable::new(headers, data).unwrap();
        let probabilities: Vec<f64> = (0..rows).map(|i| (i % 10) as f64 / 10.0).collect();
        let predictions: Vec<Prediction> = probabilities
            .iter()
            .map(|&p| {
                if p >= 0.8 {
                    Prediction::Fraudulent
                } else {
                    Prediction::Legitimate
                }
            })
            .collect();
        let summary = Summary::from_predictions(&predictions);
        (ScoredTable::augment(&raw, probabilities, predictions), summary)
    }

    #[test]
    fn test_histogram_buckets() {
        let h = ProbabilityHistogram::from_probabilities(&[0.0, 0.05, 0.5, 0.99, 1.0], 10);
        assert_eq!(h.buckets.len(), 10);
        assert_eq!(h.buckets[0], 2);
        assert_eq!(h.buckets[5], 1);
        // 1.0 lands in the last bucket
        assert_eq!(h.buckets[9], 2);
        assert_eq!(h.total(), 5);
    }

    #[test]
    fn test_preview_limited_to_configured_rows() {
        let (table, summary) = scored(30);
        let config = ReportConfig::default();

        let text = Dashboard::new(&table, &summary, &config).render();

        assert!(text.contains("Preview: first 20 of 30 rows (2 columns hidden)"));
        let preview_lines = text
            .lines()
            .skip_while(|l| !l.starts_with("Preview"))
            .skip(2)
            .take_while(|l| !l.is_empty())
            .count();
        assert_eq!(preview_lines, 20);
    }

    #[test]
    fn test_metrics_and_proportions() {
        let (table, summary) = scored(10);
        let config = ReportConfig::default();

        let text = Dashboard::new(&table, &summary, &config).render();

        assert!(text.contains("Total Transactions:       10"));
        assert!(text.contains("Fraudulent:                2"));
        assert!(text.contains("Legitimate:                8"));
        assert!(text.contains("20.0% (2)"));
        assert!(text.contains("80.0% (8)"));
    }

    #[test]
    fn test_report_json() {
        let (table, summary) = scored(4);
        let report = ScoringReport::new("upload.csv", "fraud_xgb_model", &table, summary, 10);

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["source"], "upload.csv");
        assert_eq!(value["summary"]["total"], 4);
        assert_eq!(value["summary"]["fraudulent"], 0);
        assert_eq!(value["probability_histogram"]["buckets"].as_array().unwrap().len(), 10);
        assert!(Uuid::parse_str(value["report_id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_cell_truncation() {
        assert_eq!(cell("short").trim(), "short");
        let long = cell("0.123456789012345");
        assert_eq!(long.chars().count(), PREVIEW_CELL_WIDTH);
        assert!(long.ends_with('…'));
    }
}
