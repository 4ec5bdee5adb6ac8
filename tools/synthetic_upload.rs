//! Synthetic Upload Generator
//!
//! Writes random transactions in the sample schema to a CSV file for
//! exercising the dashboard by hand.
//!
//! Usage: synthetic-upload <output.csv> [rows] [fraud_rate] [include_label]

use fraud_dashboard::sample::SAMPLE_COLUMNS;
use rand::Rng;
use tracing::info;

/// Random transaction generator
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    elapsed_seconds: f64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            elapsed_seconds: 0.0,
        }
    }

    fn next_time(&mut self) -> f64 {
        self.elapsed_seconds += self.rng.gen_range(1.0..120.0);
        self.elapsed_seconds.round()
    }

    /// Components near zero and a moderate amount
    fn generate_legitimate(&mut self) -> Vec<f64> {
        let mut row = Vec::with_capacity(SAMPLE_COLUMNS.len());
        row.push(self.next_time());
        for _ in 0..28 {
            row.push(self.rng.gen_range(-1.5..1.5));
        }
        row.push(self.rng.gen_range(1.0..300.0));
        row
    }

    /// Extreme components on the usual fraud signatures and a large amount
    fn generate_suspicious(&mut self) -> Vec<f64> {
        let mut row = self.generate_legitimate();
        // V3, V10, V12, V14, V17 run strongly negative on fraud in this schema
        for index in [3, 10, 12, 14, 17] {
            row[index] = self.rng.gen_range(-12.0..-4.0);
        }
        row[4] = self.rng.gen_range(3.0..8.0);
        row[29] = self.rng.gen_range(500.0..5000.0);
        row
    }
}

/// Fraud rate argument as a probability; unparsable or non-finite input
/// falls back to 10%.
fn parse_fraud_rate(arg: Option<&str>) -> f64 {
    arg.and_then(|s| s.parse::<f64>().ok())
        .filter(|rate| rate.is_finite())
        .unwrap_or(0.1)
        .clamp(0.0, 1.0)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synthetic_upload=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let output = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("synthetic_upload.csv");
    let rows: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate = parse_fraud_rate(args.get(3).map(String::as_str));
    let include_label: bool = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(false);

    info!(
        output = %output,
        rows = rows,
        fraud_rate = fraud_rate,
        include_label = include_label,
        "Configuration loaded"
    );

    let mut wtr = csv::Writer::from_path(output)?;
    let mut header: Vec<&str> = SAMPLE_COLUMNS.to_vec();
    if include_label {
        header.push("Class");
    }
    wtr.write_record(&header)?;

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..rows {
        let suspicious = rng.gen_bool(fraud_rate);
        let values = if suspicious {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let mut record: Vec<String> = values.iter().map(|v| format!("{:.6}", v)).collect();
        if include_label {
            record.push(u8::from(suspicious).to_string());
        }
        wtr.write_record(&record)?;

        if (i + 1) % 1000 == 0 {
            info!("Generated {}/{} rows", i + 1, rows);
        }
    }
    wtr.flush()?;

    info!(
        "Completed! Wrote {} rows ({} legitimate, {} suspicious) to {}",
        rows, legitimate_count, suspicious_count, output
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_rate_parsing() {
        assert_eq!(parse_fraud_rate(Some("0.25")), 0.25);
        assert_eq!(parse_fraud_rate(Some("3")), 1.0);
        assert_eq!(parse_fraud_rate(Some("-1")), 0.0);
        assert_eq!(parse_fraud_rate(Some("abc")), 0.1);
        assert_eq!(parse_fraud_rate(None), 0.1);
    }

    #[test]
    fn test_non_finite_fraud_rate_falls_back() {
        assert_eq!(parse_fraud_rate(Some("NaN")), 0.1);
        assert_eq!(parse_fraud_rate(Some("inf")), 0.1);
        assert_eq!(parse_fraud_rate(Some("-inf")), 0.1);
    }

    #[test]
    fn test_generated_rows_match_sample_width() {
        let mut generator = TransactionGenerator::new();
        assert_eq!(generator.generate_legitimate().len(), SAMPLE_COLUMNS.len());
        let suspicious = generator.generate_suspicious();
        assert_eq!(suspicious.len(), SAMPLE_COLUMNS.len());
        assert!(suspicious[29] >= 500.0);
    }
}
