use anyhow::{Context, Result};
use std::fs::create_dir_all;
use std::path::Path;

use crate::config::Config;
use crate::image_processor::{process_images, ConversionReport};
use crate::manifest::{DanglingReference, Manifest};
use crate::scanner::{self, SourceFile};

#[derive(Debug, Clone)]
pub struct Summary {
    pub avatars: ConversionReport,
    pub images: ConversionReport,
    pub records: usize,
    pub dangling: Vec<DanglingReference>,
}

impl Summary {
    pub fn converted(&self) -> usize {
        self.avatars.converted.len() + self.images.converted.len()
    }

    pub fn failed(&self) -> usize {
        self.avatars.failed.len() + self.images.failed.len()
    }
}

/// Scan, convert, and rewrite the manifest.
///
/// Everything that can abort the run (missing source directories, an
/// unreadable or invalid manifest) is checked before the first file is
/// written.
pub fn run(config: &Config) -> Result<Summary> {
    let layout = &config.layout;
    log::debug!("running with config: {:?}", config);

    let avatar_sources =
        scanner::list_files(&layout.avatar_dir()).context("Failed to scan avatar directory")?;
    let image_sources =
        scanner::list_files(&layout.image_dir()).context("Failed to scan image directory")?;

    let manifest_path = layout.manifest_path();
    let manifest = Manifest::load(&manifest_path)?;
    log::info!(
        "Loaded {} records from {}",
        manifest.len(),
        manifest_path.display()
    );

    let avatar_webp_dir = layout.avatar_webp_dir();
    let image_webp_dir = layout.image_webp_dir();
    for dir in [&avatar_webp_dir, &image_webp_dir] {
        create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.convert.threads.unwrap_or(0))
        .build()
        .context("Failed to build thread pool")?;

    let avatars = pool.install(|| convert_dir("avatar", &avatar_sources, &avatar_webp_dir, config));
    let images = pool.install(|| convert_dir("image", &image_sources, &image_webp_dir, config));

    let manifest = manifest.rewrite(&layout.avatar_prefix, &layout.image_prefix);

    let dangling = manifest.dangling_references(&avatars, &images);
    for reference in &dangling {
        log::warn!(
            "Record {} `{}` points at {}, which was not produced by this run",
            reference.index,
            reference.field,
            reference.path
        );
    }

    manifest.save(&manifest_path)?;
    log::info!("Updated paths in {}", manifest_path.display());

    Ok(Summary {
        records: manifest.len(),
        avatars,
        images,
        dangling,
    })
}

fn convert_dir(
    kind: &str,
    sources: &[SourceFile],
    output_dir: &Path,
    config: &Config,
) -> ConversionReport {
    log::info!("Converting {} {kind} files", sources.len());
    let report = process_images(sources, output_dir, &config.convert);
    log::info!(
        "Converted {} {kind} files ({} failed)",
        report.converted.len(),
        report.failed.len()
    );
    report
}
