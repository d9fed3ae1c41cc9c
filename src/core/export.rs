//! Export of current stats and recent history

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use quai_dash_types::{Reading, ReconciledView, SourceKind};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::history::HistoryPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{}' (expected json or csv)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    exported_at: DateTime<Utc>,
    current: &'a ReconciledView,
    history: &'a [HistoryPoint],
}

pub fn to_json(
    view: &ReconciledView,
    history: &[HistoryPoint],
    now: DateTime<Utc>,
) -> Result<String> {
    let document = ExportDocument {
        exported_at: now,
        current: view,
        history,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// One flattened CSV row: (metric, value, source)
type Row = (&'static str, Option<String>, Option<SourceKind>);

fn reading<T: ToString>(metric: &'static str, reading: &Reading<T>) -> Row {
    (metric, reading.value().map(T::to_string), reading.source())
}

fn plain<T: ToString>(metric: &'static str, value: Option<T>) -> Row {
    (metric, value.map(|v| v.to_string()), None)
}

fn current_rows(view: &ReconciledView) -> Vec<Row> {
    let sync = match &view.sync_status {
        Reading::Known { value, source, .. } => (
            "sync_progress",
            Some(value.progress_percent().to_string()),
            Some(*source),
        ),
        Reading::Unknown => ("sync_progress", None, None),
    };
    vec![
        reading("block_height", &view.block_height),
        reading("difficulty", &view.difficulty),
        reading("block_time", &view.block_time),
        reading("network_hash_rate", &view.network_hash_rate),
        reading("peer_count", &view.peer_count),
        sync,
        reading("gas_price", &view.gas_price),
        reading("pending_tx_count", &view.pending_tx_count),
        reading("local_hash_rate", &view.local_hash_rate),
        reading("power_usage", &view.power_usage),
        reading("mining", &view.mining),
        plain("max_gpu_temperature", view.max_gpu_temperature()),
        plain("time_to_block", view.derived.time_to_block),
        plain("block_probability", view.derived.block_probability),
        plain("efficiency", view.derived.efficiency),
        plain("share_rate", view.derived.share_rate),
        plain("average_hash_rate", view.derived.average_hash_rate),
        plain("average_power", view.derived.average_power),
        plain("average_temperature", view.derived.average_temperature),
        plain("accepted_shares", Some(view.totals.accepted_shares)),
        plain("rejected_shares", Some(view.totals.rejected_shares)),
        plain("rewards_accrued", Some(view.totals.rewards_accrued)),
        plain("uptime_secs", Some(view.totals.uptime_secs)),
    ]
}

fn history_rows(point: &HistoryPoint) -> [Row; 5] {
    [
        plain("hash_rate", point.hash_rate),
        plain("power", point.power),
        plain("temperature", point.temperature),
        plain("block_height", point.block_height),
        plain("share_rate", point.share_rate),
    ]
}

/// Flattened CSV: `section,timestamp,metric,value,source`
///
/// Unknown values are written as empty cells.
pub fn to_csv(view: &ReconciledView, history: &[HistoryPoint]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["section", "timestamp", "metric", "value", "source"])?;

    let generated_at = view.generated_at.to_rfc3339();
    for (metric, value, source) in current_rows(view) {
        writer.write_record([
            "current",
            generated_at.as_str(),
            metric,
            value.as_deref().unwrap_or(""),
            source.map(SourceKind::as_str).unwrap_or(""),
        ])?;
    }
    for point in history {
        let at = point.at.to_rfc3339();
        for (metric, value, _) in history_rows(point) {
            let value = value.as_deref().unwrap_or("");
            writer.write_record(["history", at.as_str(), metric, value, ""])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Write an export file
pub fn export_to_path(
    path: &Path,
    format: ExportFormat,
    view: &ReconciledView,
    history: &[HistoryPoint],
) -> Result<()> {
    let content = match format {
        ExportFormat::Json => to_json(view, history, Utc::now())?,
        ExportFormat::Csv => to_csv(view, history)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content).with_context(|| format!("writing export to {:?}", path))?;
    info!("Exported {} stats to {:?}", format, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_view() -> ReconciledView {
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut view = ReconciledView::empty(at);
        view.block_height = Reading::known(1234, SourceKind::Explorer, at);
        view.local_hash_rate = Reading::known(3e7, SourceKind::Simulated, at);
        view.totals.accepted_shares = 9;
        view
    }

    fn sample_history() -> Vec<HistoryPoint> {
        vec![HistoryPoint {
            at: Utc.timestamp_opt(1_699_999_999, 0).unwrap(),
            hash_rate: Some(2.9e7),
            power: None,
            temperature: Some(64.5),
            block_height: Some(1233),
            share_rate: None,
        }]
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_contains_current_and_history() {
        let json = to_json(&sample_view(), &sample_history(), Utc::now()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["current"]["block_height"]["known"]["value"], 1234);
        assert_eq!(value["current"]["difficulty"], "unknown");
        assert_eq!(value["history"][0]["block_height"], 1233);
        assert!(value["history"][0]["power"].is_null());
    }

    #[test]
    fn test_csv_leaves_unknown_cells_empty() {
        let csv = to_csv(&sample_view(), &sample_history()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "section,timestamp,metric,value,source");
        assert!(lines.contains(&"current,2023-11-14T22:13:20+00:00,block_height,1234,explorer"));
        assert!(lines.contains(&"current,2023-11-14T22:13:20+00:00,difficulty,,"));
        assert!(lines.contains(&"history,2023-11-14T22:13:19+00:00,power,,"));
        assert!(lines.contains(&"history,2023-11-14T22:13:19+00:00,temperature,64.5,"));
    }

    #[test]
    fn test_export_to_path_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("stats.csv");
        export_to_path(&path, ExportFormat::Csv, &sample_view(), &[]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("section,timestamp"));
    }
}
