//! Output renderers and formatting helpers.

use std::fmt::Write as _;

use anyhow::anyhow;
use reelswarm_session::SessionSnapshot;
use reelswarm_torrent_core::ContentRecord;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

pub(crate) fn render_records(records: &[ContentRecord], format: OutputFormat) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => to_json(&records)?,
        OutputFormat::Table => records_table(records),
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn records_table(records: &[ContentRecord]) -> String {
    if records.is_empty() {
        return "no results".to_string();
    }
    let mut out = format!(
        "{:<16} {:<12} {:>4} {:<7} {:>6} TITLE",
        "ID", "KIND", "YEAR", "QUALITY", "SEEDS"
    );
    for record in records {
        let year = record.year.map_or_else(|| "-".to_string(), |year| year.to_string());
        let seeds = record
            .seeder_count
            .map_or_else(|| "-".to_string(), |seeds| seeds.to_string());
        let title = if record.magnet_uri.is_some() {
            record.title.clone()
        } else {
            format!("{} (no magnet)", record.title)
        };
        let _ = write!(
            out,
            "\n{:<16} {:<12} {:>4} {:<7} {:>6} {}",
            record.id,
            record.kind.as_str(),
            year,
            record.quality_label.as_deref().unwrap_or("-"),
            seeds,
            title
        );
    }
    out
}

pub(crate) fn render_snapshot(snapshot: &SessionSnapshot, format: OutputFormat) -> CliResult<()> {
    let text = match format {
        OutputFormat::Json => to_json(snapshot)?,
        OutputFormat::Table => snapshot_table(snapshot),
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn snapshot_table(snapshot: &SessionSnapshot) -> String {
    let mut out = format!("state: {}", snapshot.state.as_str());
    if let Some(id) = snapshot.session_id {
        let _ = write!(out, "\nsession: {id}");
    }
    if let Some(title) = &snapshot.title {
        let _ = write!(out, "\ntitle: {title}");
    }
    if let Some(file) = &snapshot.selected_file {
        let _ = write!(out, "\nfile: {} ({})", file.name, format_bytes(file.size_bytes));
    }
    if snapshot.session_id.is_some() {
        let telemetry = &snapshot.telemetry;
        let _ = write!(
            out,
            "\nprogress: {:.1}%\nrates: down {}/s / up {}/s",
            telemetry.progress_ratio * 100.0,
            format_bytes(telemetry.download_rate),
            format_bytes(telemetry.upload_rate)
        );
    }
    if let Some(uri) = &snapshot.playback_uri {
        let _ = write!(out, "\nplayback: {uri}");
    }
    if let Some(outcome) = snapshot.last_outcome {
        let _ = write!(out, "\nlast outcome: {}", outcome.as_str());
    }
    if let Some(message) = &snapshot.message {
        let _ = write!(out, "\nmessage: {message}");
    }
    out
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
