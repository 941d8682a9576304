//! `fieldtrack` CLI: calibration, yard-marker labels, projection and tracking
//! over JSON detection files.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fieldtrack::correspondence::CorrespondenceStore;
use fieldtrack::format::{
    load_json, save_json, CalibrationFile, CorrespondenceFile, DetectionFile, MarkerFile,
};
use fieldtrack::{Config, Homography, Pipeline, YardMarkerLabel};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fieldtrack", version, about = "Football player tracking in field coordinates")]
struct Cli {
    /// JSON config file; missing keys keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct HomographySource {
    /// Correspondence file to calibrate from
    #[arg(long, conflicts_with = "calibration")]
    correspondences: Option<PathBuf>,

    /// Output of a previous `calibrate` run
    #[arg(long)]
    calibration: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the image-to-field homography from a correspondence file.
    Calibrate {
        correspondences: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Resolve yard-marker labels to field positions.
    Label {
        #[arg(required = true)]
        labels: Vec<String>,
    },
    /// Turn detected yard markers into a correspondence file.
    Markers {
        markers: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Attach field coordinates to every detection.
    Project {
        detections: PathBuf,
        #[command(flatten)]
        homography: HomographySource,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Track detections across frames.
    Track {
        detections: PathBuf,
        #[command(flatten)]
        homography: HomographySource,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write the field-projected detections
        #[arg(long)]
        transformed: Option<PathBuf>,
        #[arg(long)]
        max_age: Option<u32>,
        #[arg(long)]
        n_init: Option<u32>,
        #[arg(long)]
        min_iou: Option<f32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(path) = &cli.config {
        require(&[path.as_path()])?;
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Calibrate {
            correspondences,
            output,
        } => calibrate(config, &correspondences, &output),
        Commands::Label { labels } => label(&config, &labels),
        Commands::Markers { markers, output } => markers_to_correspondences(&config, &markers, &output),
        Commands::Project {
            detections,
            homography,
            output,
        } => project(config, &detections, &homography, &output),
        Commands::Track {
            detections,
            homography,
            output,
            transformed,
            max_age,
            n_init,
            min_iou,
        } => {
            let mut config = config;
            if let Some(v) = max_age {
                config.tracker.max_age = v;
            }
            if let Some(v) = n_init {
                config.tracker.n_init = v;
            }
            if let Some(v) = min_iou {
                config.tracker.min_iou = v;
            }

            track(config, &detections, &homography, &output, transformed.as_deref())
        }
    }
}

/// Fails before any processing when an input file is missing.
fn require(paths: &[&Path]) -> Result<()> {
    for p in paths {
        if !p.exists() {
            return Err(fieldtrack::Error::MissingInputFile(p.to_path_buf()).into());
        }
    }

    Ok(())
}

fn calibrate(config: Config, correspondences: &Path, output: &Path) -> Result<()> {
    require(&[correspondences])?;

    let file: CorrespondenceFile = load_json(correspondences)
        .with_context(|| format!("reading {}", correspondences.display()))?;

    let mut pipeline = Pipeline::new(config)?;
    let report = pipeline
        .calibrate(&file.store())
        .context("calibration failed; re-acquire correspondences")?;

    println!(
        "calibrated from {} points: rms {:.3} ft, max {:.3} ft",
        file.correspondences.len(),
        report.rms_ft,
        report.max_ft
    );
    if !report.within_tolerance() {
        println!("points above tolerance: {:?}", report.outliers);
    }

    save_json(
        output,
        &CalibrationFile {
            report,
            metadata: file.metadata,
        },
    )?;

    Ok(())
}

fn label(config: &Config, labels: &[String]) -> Result<()> {
    for raw in labels {
        let label = YardMarkerLabel::parse(raw)?;
        let r = label.resolve(&config.markers, &config.field);

        println!(
            "{}: {} {} hash, yard line {} (painted {}), field ({:.1}, {:.1}) ft",
            label,
            label.near_far().as_str(),
            label.left_right().as_str(),
            r.yard_line,
            r.yard_number,
            r.field_point.x,
            r.field_point.y
        );
    }

    Ok(())
}

fn markers_to_correspondences(config: &Config, markers: &Path, output: &Path) -> Result<()> {
    require(&[markers])?;

    let file: MarkerFile =
        load_json(markers).with_context(|| format!("reading {}", markers.display()))?;
    let store = CorrespondenceStore::from_markers(&file.markers, &config.markers, &config.field)?;

    if let Err(err) = store.validate() {
        log::warn!("correspondences not yet usable for calibration: {}", err);
    }

    save_json(
        output,
        &CorrespondenceFile {
            correspondences: store.points().to_vec(),
            metadata: file.metadata,
        },
    )?;

    Ok(())
}

fn load_homography(pipeline: &mut Pipeline, src: &HomographySource) -> Result<Option<Homography>> {
    if let Some(path) = &src.calibration {
        let file: CalibrationFile =
            load_json(path).with_context(|| format!("reading {}", path.display()))?;
        return Ok(Some(file.report.homography));
    }

    if let Some(path) = &src.correspondences {
        let file: CorrespondenceFile =
            load_json(path).with_context(|| format!("reading {}", path.display()))?;
        let report = pipeline
            .calibrate(&file.store())
            .context("calibration failed; re-acquire correspondences")?;
        return Ok(Some(report.homography));
    }

    Ok(None)
}

fn source_paths<'a>(detections: &'a Path, src: &'a HomographySource) -> Vec<&'a Path> {
    std::iter::once(detections)
        .chain(src.correspondences.as_deref())
        .chain(src.calibration.as_deref())
        .collect()
}

fn project(config: Config, detections: &Path, src: &HomographySource, output: &Path) -> Result<()> {
    require(&source_paths(detections, src))?;

    let mut pipeline = Pipeline::new(config)?;
    let homography = match load_homography(&mut pipeline, src)? {
        Some(h) => h,
        None => bail!("project needs --correspondences or --calibration"),
    };
    pipeline.recalibrate(homography);

    let input: DetectionFile =
        load_json(detections).with_context(|| format!("reading {}", detections.display()))?;
    let (transformed, summary) = pipeline.reproject(&input)?;

    println!(
        "{} detections projected, {} left without field coordinates",
        summary.projected, summary.singular
    );
    save_json(output, &transformed)?;

    Ok(())
}

fn track(
    config: Config,
    detections: &Path,
    src: &HomographySource,
    output: &Path,
    transformed: Option<&Path>,
) -> Result<()> {
    require(&source_paths(detections, src))?;

    let mut pipeline = Pipeline::new(config)?;
    if let Some(h) = load_homography(&mut pipeline, src)? {
        pipeline.recalibrate(h);
    }

    let input: DetectionFile =
        load_json(detections).with_context(|| format!("reading {}", detections.display()))?;
    let out = pipeline.run(&input);

    let confirmed: std::collections::BTreeSet<_> = out
        .tracks
        .frames
        .iter()
        .flat_map(|f| f.tracks.iter().map(|t| t.track_id))
        .collect();
    println!(
        "{} frames, {} confirmed tracks",
        out.frames_processed,
        confirmed.len()
    );

    save_json(output, &out.tracks)?;
    if let Some(path) = transformed {
        if pipeline.homography().is_none() {
            log::warn!("no homography given, {} has no field coordinates", path.display());
        }
        save_json(path, &out.transformed)?;
    }

    Ok(())
}
