use anyhow::{Context, Result};
use std::path::Path;

pub mod error;
pub mod image;
pub mod recovery;
pub mod yaffs2;

pub use error::RecoveryError;
pub use image::{open_image, ImageSource};
pub use recovery::{
    RecoveredFile, RecoveryConfig, RecoveryEngine, RecoveryProgress, RecoveryReport,
};
pub use yaffs2::{ScanStatistics, TimestampZone, UnitIndex, UnitLayout};

/// Index an image without writing anything
pub fn scan_image(image_path: &Path, layout: &UnitLayout) -> Result<(UnitIndex, ScanStatistics)> {
    tracing::info!("Scanning {}", image_path.display());

    let mut source = open_image(image_path)
        .with_context(|| format!("cannot open image {}", image_path.display()))?;
    let mut index = UnitIndex::new();
    let stats = index.build(&mut source, layout)?;

    Ok((index, stats))
}

/// Scan an image and recover every file version into `config.output_dir`
pub fn recover_image(image_path: &Path, config: RecoveryConfig) -> Result<RecoveryReport> {
    recover_image_with_progress(image_path, config, |_| {})
}

/// Same as [`recover_image`], forwarding progress events to `on_progress`
pub fn recover_image_with_progress<F>(
    image_path: &Path,
    config: RecoveryConfig,
    on_progress: F,
) -> Result<RecoveryReport>
where
    F: Fn(RecoveryProgress) + Send + Sync + 'static,
{
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("cannot create output directory {}", config.output_dir.display())
    })?;

    let source = open_image(image_path)
        .with_context(|| format!("cannot open image {}", image_path.display()))?;

    tracing::info!(
        "Starting recovery of {} to {}",
        image_path.display(),
        config.output_dir.display()
    );

    let mut engine = RecoveryEngine::new(config);
    engine.set_progress_callback(on_progress);
    engine.build(source)?;
    let report = engine.recover()?;
    engine.clear();

    Ok(report)
}
