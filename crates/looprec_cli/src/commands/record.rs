//! Record command implementation.

use looprec_core::{CommandCapture, Orchestrator, RecorderConfig, StopSignal, VolumeDir};
use tracing::info;

/// Runs the record command until Ctrl-C.
pub fn run(
    config: RecorderConfig,
    capture: CommandCapture,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = VolumeDir::open(&config.volume_path, config.create_if_missing)?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        info!("stop requested, finishing current segment");
        handler_stop.trigger();
    })?;

    println!("Recording to {}", dir.path().display());
    println!("Press Ctrl-C to stop.");
    println!();

    let mut orchestrator = Orchestrator::new(config, dir.volume(), capture)?;
    let summary = orchestrator.run(&stop)?;

    println!();
    println!("Recording stopped:");
    println!("  Segments sealed:   {}", summary.segments_sealed);
    println!("  Segments evicted:  {}", summary.segments_evicted);
    println!("  Capture failures:  {}", summary.capture_failures);
    if let Some(last) = summary.last_segment {
        println!("  Last segment:      {last}");
    }

    Ok(())
}
