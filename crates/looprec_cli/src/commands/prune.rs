//! Prune command implementation.

use crate::commands::inspect::format_size;
use looprec_core::{CoreError, RecorderConfig, RetentionManager, SegmentNamer, VolumeDir};
use looprec_storage::Volume;

/// Runs the prune command.
///
/// Takes the volume lock, so it refuses to run next to a recorder.
pub fn run(config: &RecorderConfig, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dir = VolumeDir::open(&config.volume_path, false)?;
    let namer = SegmentNamer::new(config.file_prefix.clone(), config.file_suffix.clone());
    let mut recovered = dir.recover(&namer)?;
    let volume = dir.volume();
    let manager = RetentionManager::new(config.threshold_bytes);

    let free = volume.free_space()?;
    println!("Pruning {}", dir.path().display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();
    println!("  Free space:  {}", format_size(free));
    println!("  Threshold:   {}", format_size(config.threshold_bytes));
    println!("  Segments:    {}", recovered.set.len());
    println!();

    if dry_run {
        let plan = manager.plan(free, &recovered.set);
        if plan.evict.is_empty() {
            println!("Nothing to evict");
        } else {
            println!("Would evict {} segment(s):", plan.evict.len());
            for id in &plan.evict {
                println!("  {}", namer.file_name(id));
            }
        }
        println!();
        println!(
            "Projected free space: {}{}",
            format_size(plan.projected_free_bytes),
            if plan.satisfied { "" } else { " (still below threshold)" }
        );
        return Ok(());
    }

    match manager.ensure_capacity(&*volume, &mut recovered.set) {
        Ok(report) => {
            println!(
                "Evicted {} segment(s), freed {}",
                report.evicted_count(),
                format_size(report.freed_bytes)
            );
            for id in &report.failed {
                println!("  could not delete {}", namer.file_name(id));
            }
            println!("Free space now: {}", format_size(report.free_bytes));
            Ok(())
        }
        Err(err @ CoreError::InsufficientSpace { .. }) => {
            println!("Every segment was evicted and free space is still short");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn dry_run_deletes_nothing() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("loop_a.h264"), vec![0u8; 10]).unwrap();

        let config = RecorderConfig::new(temp.path()).threshold_bytes(u64::MAX);
        run(&config, true).unwrap();
        assert!(temp.path().join("loop_a.h264").exists());
    }

    #[test]
    fn zero_threshold_keeps_everything() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("loop_a.h264"), vec![0u8; 10]).unwrap();

        let config = RecorderConfig::new(temp.path()).threshold_bytes(0);
        run(&config, false).unwrap();
        assert!(temp.path().join("loop_a.h264").exists());
    }

    #[test]
    fn unreachable_threshold_evicts_all_and_fails() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("loop_a.h264"), vec![0u8; 10]).unwrap();
        fs::write(temp.path().join("keep.txt"), b"not managed").unwrap();

        let config = RecorderConfig::new(temp.path()).threshold_bytes(u64::MAX);
        assert!(run(&config, false).is_err());
        assert!(!temp.path().join("loop_a.h264").exists());
        assert!(temp.path().join("keep.txt").exists());
    }

    #[test]
    fn refuses_missing_directory() {
        let temp = tempdir().unwrap();
        let config = RecorderConfig::new(temp.path().join("missing"));
        assert!(run(&config, true).is_err());
    }
}
