use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ConvertConfig;
use crate::scanner::SourceFile;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedImage {
    pub source: PathBuf,
    pub file_name: String,
    pub path: PathBuf,
    pub dimensions: (u32, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedImage {
    pub source: PathBuf,
    pub error: String,
}

/// Outcome of converting one source directory, in scan order.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub converted: Vec<ConvertedImage>,
    pub failed: Vec<FailedImage>,
    // sources skipped because a later file in scan order has the same webp name
    pub superseded: Vec<PathBuf>,
}

impl ConversionReport {
    pub fn produced(&self, file_name: &str) -> bool {
        self.converted.iter().any(|c| c.file_name == file_name)
    }
}

/// `photo.jpg` -> `photo.webp`. Only the last extension is replaced.
pub fn webp_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}.webp")
}

/// Target size for an image whose longer side exceeds `max_dimension`.
///
/// Returns `None` when the image already fits.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width <= max_dimension && height <= max_dimension {
        return None;
    }

    let max = max_dimension as f64;
    let scale = (max / width as f64).min(max / height as f64);

    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);

    Some((new_width, new_height))
}

/// Convert every source file into `output_dir`.
///
/// Failures are logged and recorded; they never stop the batch. When several
/// sources map to the same webp name only the last one in scan order is
/// converted.
pub fn process_images(
    sources: &[SourceFile],
    output_dir: &Path,
    config: &ConvertConfig,
) -> ConversionReport {
    log::debug!(
        "Converting {} files into {}",
        sources.len(),
        output_dir.display()
    );

    let mut report = ConversionReport::default();

    let mut last_for_name = HashMap::new();
    for (idx, source) in sources.iter().enumerate() {
        last_for_name.insert(webp_file_name(&source.file_name), idx);
    }

    let mut jobs = Vec::with_capacity(sources.len());
    for (idx, source) in sources.iter().enumerate() {
        let file_name = webp_file_name(&source.file_name);
        let winner = last_for_name[&file_name];
        if winner == idx {
            jobs.push(source);
        } else {
            log::warn!(
                "Skipping {}: {} also converts to {file_name}",
                source.path.display(),
                sources[winner].path.display()
            );
            report.superseded.push(source.path.clone());
        }
    }

    let results: Vec<_> = jobs
        .par_iter()
        .map(|&source| (source, convert_to_webp(source, output_dir, config)))
        .collect();

    for (source, result) in results {
        match result {
            Ok(converted) => report.converted.push(converted),
            Err(e) => {
                log::warn!("Failed to convert {}: {:#}", source.path.display(), e);
                report.failed.push(FailedImage {
                    source: source.path.clone(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    log::debug!(
        "Converted {} files, {} failed",
        report.converted.len(),
        report.failed.len()
    );

    report
}

/// Decode one image, shrink it to fit the max dimension, and write it as webp.
pub fn convert_to_webp(
    source: &SourceFile,
    output_dir: &Path,
    config: &ConvertConfig,
) -> Result<ConvertedImage> {
    let file_name = webp_file_name(&source.file_name);
    let output_path = output_dir.join(&file_name);

    let img = ImageReader::open(&source.path)
        .with_context(|| format!("Failed to open image: {}", source.path.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read image: {}", source.path.display()))?
        .decode()
        .with_context(|| format!("Failed to decode image: {}", source.path.display()))?;

    let (width, height) = img.dimensions();
    let img = match fit_within(width, height, config.max_dimension) {
        Some((new_width, new_height)) => {
            log::info!(
                "Resizing {} ({width}x{height} -> {new_width}x{new_height})",
                source.path.display()
            );
            img.resize_exact(new_width, new_height, FilterType::Lanczos3)
        }
        None => img,
    };

    let data = compress_to_webp(&img, config.quality)?;
    write_atomic(&output_path, &data)?;

    log::info!(
        "Converted {} -> {}",
        source.path.display(),
        output_path.display()
    );

    Ok(ConvertedImage {
        source: source.path.clone(),
        file_name,
        path: output_path,
        dimensions: img.dimensions(),
    })
}

/// Compress an image to WebP format with the specified quality
pub fn compress_to_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // the encoder only takes 8-bit rgb(a)
    let img = if img.color().has_alpha() {
        DynamicImage::from(img.to_rgba8())
    } else {
        DynamicImage::from(img.to_rgb8())
    };

    let encoder = webp::Encoder::from_image(&img)
        .map_err(|e| anyhow::anyhow!("Failed to create WebP encoder: {}", e))?;
    let webp_data = encoder
        .encode_simple(false, quality as f32)
        .map_err(|e| anyhow::anyhow!("Failed to encode WebP: {:?}", e))?;

    Ok(webp_data.to_vec())
}

// Write through a temp file in the same directory so a failed write never
// leaves a truncated file under the final name.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(data)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    // temp files are created owner-only, outputs get the usual 0644
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to save {}", path.display()))?;

    Ok(())
}
