//! Inspect command implementation.

use chrono::{DateTime, Utc};
use looprec_core::{RecorderConfig, RetentionSet, SegmentNamer};
use looprec_storage::{DiskVolume, Volume};
use serde::Serialize;

/// Recording directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Recording directory.
    pub path: String,
    /// Free space in bytes.
    pub free_bytes: u64,
    /// Volume size in bytes.
    pub total_bytes: u64,
    /// Configured threshold in bytes.
    pub threshold_bytes: u64,
    /// Whether free space is below the threshold.
    pub below_threshold: bool,
    /// Bytes held by retained segments.
    pub retained_bytes: u64,
    /// Segments, oldest first.
    pub segments: Vec<SegmentInfo>,
}

/// A single retained segment.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Segment id.
    pub id: String,
    /// File name.
    pub file: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Creation time (RFC 3339, UTC).
    pub created: String,
}

/// Runs the inspect command.
pub fn run(config: &RecorderConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(config)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects segment and space information without taking the volume lock,
/// so a running recorder can be inspected.
pub fn inspect(config: &RecorderConfig) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let volume = DiskVolume::open(&config.volume_path)?;
    let namer = SegmentNamer::new(config.file_prefix.clone(), config.file_suffix.clone());
    let set = RetentionSet::rebuild(&volume, &namer)?;

    let free_bytes = volume.free_space()?;
    let segments = set
        .iter()
        .map(|segment| SegmentInfo {
            id: segment.id().to_string(),
            file: segment
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: segment.size_bytes().unwrap_or(0),
            created: DateTime::<Utc>::from(segment.created_at()).to_rfc3339(),
        })
        .collect();

    Ok(InspectResult {
        path: config.volume_path.display().to_string(),
        free_bytes,
        total_bytes: volume.total_space()?,
        threshold_bytes: config.threshold_bytes,
        below_threshold: free_bytes < config.threshold_bytes,
        retained_bytes: set.total_bytes(),
        segments,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("LoopRec Volume Inspection");
    println!("=========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Space:");
    println!("  Free:       {}", format_size(result.free_bytes));
    println!("  Total:      {}", format_size(result.total_bytes));
    println!(
        "  Threshold:  {}{}",
        format_size(result.threshold_bytes),
        if result.below_threshold { " (below)" } else { "" }
    );
    println!();
    println!(
        "Segments: {} ({})",
        result.segments.len(),
        format_size(result.retained_bytes)
    );
    for segment in &result.segments {
        println!(
            "  {}  {:>10}  {}",
            segment.created,
            format_size(segment.size_bytes),
            segment.file
        );
    }
}

pub(crate) fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
