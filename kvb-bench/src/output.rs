//! Run output: latency sample files and the JSON report.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::BenchConfig;
use crate::error::{BenchError, BenchResult};
use crate::stats::Report;

/// Writes one latency sample (milliseconds) per line.
pub fn write_latencies(path: &Path, samples: &[f64]) -> BenchResult<()> {
    let to_output_err = |source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(to_output_err)?;
    let mut writer = BufWriter::new(file);
    for sample in samples {
        writeln!(writer, "{sample:.6}").map_err(to_output_err)?;
    }
    writer.flush().map_err(to_output_err)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    config: &'a BenchConfig,
    report: &'a Report,
}

/// Renders the configuration and report as pretty-printed JSON.
pub fn to_json(config: &BenchConfig, report: &Report) -> BenchResult<String> {
    Ok(serde_json::to_string_pretty(&JsonReport { config, report })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::worker::WorkerResult;

    fn report() -> Report {
        let result = WorkerResult {
            worker: 0,
            latencies_ms: vec![0.5, 1.25],
            completed: 2,
            errors: 0,
            error_replies: 0,
        };
        Report::from_results("127.0.0.1:9000", vec![result], Duration::from_secs(1))
    }

    #[test]
    fn writes_one_sample_per_line() {
        let path = std::env::temp_dir().join(format!("kvb-latencies-{}.txt", std::process::id()));
        write_latencies(&path, &report().latencies_ms).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<f64> = text.lines().map(|line| line.parse().unwrap()).collect();
        assert_eq!(parsed, vec![0.5, 1.25]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn json_contains_config_and_totals() {
        let json = to_json(&BenchConfig::default(), &report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["config"]["pipeline_depth"], 16);
        assert_eq!(value["report"]["total_ops"], 2);
        assert_eq!(value["report"]["latency"]["p50"], 0.5);
        assert!(value["report"].get("latencies_ms").is_none());
    }

    #[test]
    fn unwritable_path_is_output_error() {
        let path = Path::new("/nonexistent-dir/kvb/latencies.txt");
        assert!(matches!(
            write_latencies(path, &[1.0]),
            Err(BenchError::Output { .. })
        ));
    }
}
