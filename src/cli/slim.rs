//! `slim` command: the whole run over one unpacked archive.
//!
//! ```text
//! open archive ─► index ─► load payloads ─► scan references
//!                                                │
//!        write back ◄─ summaries ◄─ pipeline (parallel)
//! ```
//!
//! Nothing is written if the index is inconsistent or the run was interrupted.

use anyhow::{Context, Result, bail};

use crate::archive::{Archive, DirectoryArchive, PayloadUpdate};
use crate::cli::SlimArgs;
use crate::codec::{Codec, ImageCodec, ImageFormat};
use crate::config::DeckConfig;
use crate::core::shutdown_flag;
use crate::index::{ImageIndex, ImageRecord, Stage};
use crate::logger::ProgressLine;
use crate::metadata;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::report::LogReporter;
use crate::report::summary::{SizePoint, Summary, summarize};
use crate::scan::ReferenceScanner;
use crate::utils::plural::plural_count;
use crate::utils::size::natural_size;
use crate::{debug, log};

/// Slim the archive at `args.deck`, in place or into `args.output`.
pub fn slim_deck(args: &SlimArgs, config: &DeckConfig) -> Result<()> {
    slim_with(args, config, &ImageCodec)
}

fn slim_with(args: &SlimArgs, config: &DeckConfig, codec: &dyn Codec) -> Result<()> {
    let settings = config.settings()?;
    let preset = config.quality.preset;
    if preset > 0 && !config.overrides().is_empty() {
        log!("warning"; "quality level {preset} ignores explicit quality options");
    }
    debug!("slim"; "settings: {:?}", settings);

    let source = DirectoryArchive::open(&args.deck)?;
    let mut archive = match &args.output {
        Some(dest) => {
            log!("slim"; "copying {} to {}", args.deck.display(), dest.display());
            source.copy_to(dest)?
        }
        None => source,
    };
    let data_before = archive.data_size()?;

    let root = archive.metadata().context("failed to read package metadata")?;
    let mut index = ImageIndex::build(&root).context("malformed image index")?;
    index
        .load_payloads(&archive)
        .context("malformed image index")?;
    log!("index"; "found {}", plural_count(index.len(), "image"));

    let fragments = archive.fragments()?;
    let reporter = LogReporter;
    let options = config.scan_options(metadata::slide_size(&fragments));
    let stats = ReferenceScanner::new(options).scan(&fragments, &mut index, &reporter);
    log!(
        "scan";
        "{} in {}",
        plural_count(stats.references, "reference"),
        plural_count(stats.fragments, "fragment")
    );
    if stats.dangling > 0 {
        debug!("scan"; "{} to unknown images", plural_count(stats.dangling, "reference"));
    }

    let pipeline = Pipeline::new(codec, settings, &reporter, shutdown_flag());
    let progress = ProgressLine::new(&[("images", index.len())]);
    let outcome = pipeline.run(&mut index, Some(&progress));
    progress.finish();

    if outcome.is_interrupted() {
        bail!(
            "interrupted with {} left, archive not written",
            plural_count(outcome.skipped, "image")
        );
    }

    for stage in pipeline.stages() {
        log_stage(index.records(), stage);
    }
    for record in outcome.relocated.iter().filter_map(|id| index.get(*id)) {
        log!(
            "convert";
            "{} {} -> {} (name taken)",
            record.id(),
            record.source_filename(),
            record.filename
        );
    }

    let updates = PayloadUpdate::collect(index.records());
    archive.write_back(&updates)?;
    log_failures(&outcome);

    let images = summarize(index.records(), SizePoint::Original, SizePoint::Optimized);
    let data_after = archive.data_size()?;
    log!(
        "done";
        "{} rewritten, images {}, archive data {} -> {}",
        plural_count(updates.len(), "image"),
        describe(&images),
        natural_size(data_before),
        natural_size(data_after)
    );
    Ok(())
}

/// Summary of the records a stage actually changed.
fn log_stage(records: &[ImageRecord], stage: Stage) {
    let (from, to) = match stage {
        Stage::Normalize => (SizePoint::Original, SizePoint::Converted),
        Stage::Resize => (SizePoint::Converted, SizePoint::Resized),
        Stage::Optimize => (SizePoint::Resized, SizePoint::Optimized),
    };
    let changed: Vec<&ImageRecord> = records
        .iter()
        .filter(|r| r.lineage.get(stage).is_some_and(|s| s.applied))
        .collect();

    if changed.is_empty() {
        log!(stage.name(); "nothing to do");
        return;
    }

    if stage == Stage::Normalize {
        for format in [ImageFormat::Tiff, ImageFormat::Png] {
            let group: Vec<&ImageRecord> = changed
                .iter()
                .copied()
                .filter(|r| ImageFormat::from_path(r.source_filename()) == Some(format))
                .collect();
            if group.is_empty() {
                continue;
            }
            let summary = summarize(group.iter().copied(), from, to);
            log!(
                stage.name();
                "{} {}: {}",
                group.len(),
                format,
                describe(&summary)
            );
        }
        return;
    }

    let summary = summarize(changed.iter().copied(), from, to);
    log!(
        stage.name();
        "{}: {}",
        plural_count(changed.len(), "image"),
        describe(&summary)
    );
}

fn log_failures(outcome: &RunOutcome) {
    if outcome.failed.is_empty() {
        return;
    }
    log!(
        "failed";
        "{} kept at their last good stage:",
        plural_count(outcome.failed.len(), "image")
    );
    for failed in &outcome.failed {
        log!(
            "failed";
            "{} {} ({}): {}",
            failed.id,
            failed.filename,
            failed.failure.stage,
            failed.failure.message
        );
    }
}

fn describe(summary: &Summary) -> String {
    format!(
        "{} -> {} ({:.1}% smaller)",
        natural_size(summary.total_before),
        natural_size(summary.total_after),
        summary.reduction_percent
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ImageId;
    use crate::testing::{DeckBuilder, FakeCodec, fake_image, image_object, show_object};
    use image::{DynamicImage, ImageFormat as Encoding, RgbImage};
    use serde_json::Value;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn encoded(width: u32, height: u32, encoding: Encoding) -> Vec<u8> {
        let raster = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 2) as u8, (y * 2) as u8, 128])
        }));
        let mut bytes = Cursor::new(Vec::new());
        raster.write_to(&mut bytes, encoding).unwrap();
        bytes.into_inner()
    }

    fn tiff(width: u32, height: u32) -> Vec<u8> {
        encoded(width, height, Encoding::Tiff)
    }

    fn args(deck: &Path, quality: u8, output: Option<PathBuf>) -> SlimArgs {
        SlimArgs {
            deck: deck.to_path_buf(),
            quality: Some(quality),
            resize_factor: None,
            jpeg_quality: None,
            png_convert: false,
            output,
        }
    }

    fn config(args: &SlimArgs) -> DeckConfig {
        let mut config = DeckConfig::default();
        config.apply_args(args);
        config
    }

    /// `identifier=fileName` of every data entry.
    fn metadata_names(deck: &Path) -> Vec<String> {
        let text = std::fs::read_to_string(deck.join("Index/Metadata.json")).unwrap();
        let root: Value = serde_json::from_str(&text).unwrap();
        root["chunks"][0]["archives"][0]["objects"][0]["datas"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| {
                format!(
                    "{}={}",
                    d["identifier"].as_str().unwrap(),
                    d["fileName"].as_str().unwrap()
                )
            })
            .collect()
    }

    fn reload(deck: &Path) -> ImageIndex {
        let archive = DirectoryArchive::open(deck).unwrap();
        let mut index = ImageIndex::build(&archive.metadata().unwrap()).unwrap();
        index.load_payloads(&archive).unwrap();
        index
    }

    #[test]
    fn test_slim_into_output_directory() {
        let dir = TempDir::new().unwrap();
        let deck = dir.path().join("talk");
        DeckBuilder::new()
            .image(5, "photo.tif", &tiff(128, 96))
            .slide("Document", vec![show_object(1024, 768)])
            .slide("Slide-1", vec![image_object(5, 16.0, 12.0)])
            .write(&deck);

        let out = dir.path().join("talk-slim");
        let args = args(&deck, 1, Some(out.clone()));
        slim_deck(&args, &config(&args)).unwrap();

        // Source untouched, copy converted and renamed
        assert!(deck.join("Data/photo.tif").exists());
        assert!(!out.join("Data/photo.tif").exists());
        assert!(out.join("Data/photo.jpg").exists());

        assert_eq!(metadata_names(&out), vec!["5=photo.jpg"]);
        reload(&out);
    }

    #[test]
    fn test_conversion_keeps_image_with_the_same_name() {
        let dir = TempDir::new().unwrap();
        let jpeg = encoded(64, 48, Encoding::Jpeg);
        DeckBuilder::new()
            .image(1, "photo.tif", &tiff(128, 96))
            .image(2, "photo.jpg", &jpeg)
            .write(dir.path());

        let args = args(dir.path(), 0, None);
        slim_deck(&args, &config(&args)).unwrap();

        assert!(!dir.path().join("Data/photo.tif").exists());
        assert_eq!(std::fs::read(dir.path().join("Data/photo.jpg")).unwrap(), jpeg);
        assert!(dir.path().join("Data/photo-1.jpg").exists());
        assert_eq!(metadata_names(dir.path()), vec!["1=photo-1.jpg", "2=photo.jpg"]);
        assert_eq!(reload(dir.path()).len(), 2);
    }

    #[test]
    fn test_later_stage_failure_writes_converted_image() {
        let dir = TempDir::new().unwrap();
        DeckBuilder::new()
            .image(3, "scan.tif", &fake_image(100, 100, false, 90_000))
            .write(dir.path());

        // Preset 1 converts at 95, then optimizes at 80
        let codec = FakeCodec::failing_at(ImageFormat::Jpeg, 80);
        let args = args(dir.path(), 1, None);
        slim_with(&args, &config(&args), &codec).unwrap();

        assert!(!dir.path().join("Data/scan.tif").exists());
        let converted = std::fs::read(dir.path().join("Data/scan.jpg")).unwrap();
        let expected = FakeCodec::encoded_len(100, 100, ImageFormat::Jpeg, 95);
        assert_eq!(converted.len() as u64, expected);
        assert_eq!(metadata_names(dir.path()), vec!["3=scan.jpg"]);

        let index = reload(dir.path());
        assert_eq!(index.get(ImageId(3)).unwrap().lineage.original, expected);
    }

    #[test]
    fn test_orphan_image_aborts_before_writing() {
        let dir = TempDir::new().unwrap();
        let deck = dir.path().join("talk");
        let tiff = tiff(8, 8);
        DeckBuilder::new().image(1, "a.tif", &tiff).write(&deck);
        std::fs::write(deck.join("Data/stray.png"), b"png").unwrap();

        let args = args(&deck, 1, None);
        let err = slim_deck(&args, &config(&args)).unwrap_err();
        assert!(format!("{err:#}").contains("stray.png"));
        assert_eq!(std::fs::read(deck.join("Data/a.tif")).unwrap(), tiff);
    }
}
