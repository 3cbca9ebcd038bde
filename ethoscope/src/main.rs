// Copyright 2024-2026 the ethoscope-rs authors.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, level_filters::LevelFilter};

use ethoscope_config::{ExperimentConfig, parse_config_file};
use ethoscope_hardware::{HardwareConnection, LYNX_MOTION_BAUD_RATE};
use ethoscope_monitor::{
    CsvResultWriter, Drawer, FrameSource, ImageDirectoryGrabber, Monitor, SnapshotDrawer,
    ThreadedFrameSource, TrackingUnit,
};
use ethoscope_types::RoiFeatures;
use target_grid::{Calibration, TargetGridCalibrator, TargetGridConfig};

/// Instructions waiting for the hardware before new ones are dropped.
const HARDWARE_QUEUE_LEN: usize = 64;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Calibrate from the first frame, then track until the frames run out
    /// or Ctrl-C is pressed
    Run {
        /// Experiment configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Also log to this file. Overrides `output.log_file`.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Find the ROIs in a still image and print them as JSON
    Calibrate {
        #[arg(short, long)]
        image: PathBuf,
        /// Take the calibration section of this experiment configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the default experiment configuration
    DefaultConfig,
    /// Print the parameters of every stimulator kind as JSON
    DescribeStimulators,
    /// Try to open every serial port
    ProbePorts {
        #[arg(long, default_value_t = LYNX_MOTION_BAUD_RATE)]
        baud: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, log_file } => run(&config, log_file),
        Commands::Calibrate { image, config } => {
            let _guard = env_tracing_logger::init();
            calibrate(&image, config.as_deref())
        }
        Commands::DefaultConfig => {
            print!("{}", ExperimentConfig::default().to_toml()?);
            Ok(())
        }
        Commands::DescribeStimulators => {
            let buf = serde_json::to_string_pretty(ethoscope_stimulators::describe_all())?;
            println!("{buf}");
            Ok(())
        }
        Commands::ProbePorts { baud } => {
            let _guard = env_tracing_logger::init();
            probe_ports(baud)
        }
    }
}

fn run(config: &Path, log_file: Option<PathBuf>) -> anyhow::Result<()> {
    let cfg = parse_config_file(config)
        .with_context(|| format!("while reading config {}", config.display()))?;
    let log_file = log_file.or_else(|| cfg.output.log_file.clone());
    let _guard = env_tracing_logger::initiate_logging(log_file.as_ref(), false, LevelFilter::INFO)?;

    let grabber = ImageDirectoryGrabber::new(&cfg.source.image_dir, cfg.source.fps)
        .with_context(|| format!("opening frames in {}", cfg.source.image_dir.display()))?
        .repeat(cfg.source.repeat)
        .max_frames(cfg.source.max_frames)
        .realtime(cfg.source.realtime);
    info!("{} images in {}", grabber.len(), cfg.source.image_dir.display());
    let mut source = ThreadedFrameSource::spawn(grabber, cfg.source.camera_timeout())?;

    let first = source
        .next_frame()?
        .context("no frame to calibrate from")?;
    let calibration = calibrate_frame(&cfg.calibration, &first.image, &cfg.output.results)?;

    let roi_map = std::fs::File::create(&cfg.output.roi_map)
        .with_context(|| format!("creating {}", cfg.output.roi_map.display()))?;
    ethoscope_monitor::write_roi_map(roi_map, &calibration.rois)?;

    let mut units = Vec::with_capacity(calibration.rois.len());
    for roi in calibration.rois {
        let stimulator = cfg.stimulator.build()?;
        units.push(TrackingUnit::new(
            roi,
            cfg.tracker.build(),
            cfg.tracker.history(),
            Some(stimulator),
        ));
    }

    let mut monitor = Monitor::new(Box::new(source), units)?;
    let connection = HardwareConnection::open(cfg.hardware.clone(), HARDWARE_QUEUE_LEN)
        .with_context(|| format!("opening {} hardware", cfg.hardware.name()))?;
    monitor.attach_hardware(connection);

    let stop = monitor.stop_handle();
    ctrlc::set_handler(move || {
        info!("got Ctrl-C, stopping");
        stop.stop();
    })?;

    let mut writer = CsvResultWriter::create(&cfg.output.results)
        .with_context(|| format!("creating {}", cfg.output.results.display()))?;
    let mut snapshot = cfg.output.snapshot.as_ref().map(|path| {
        SnapshotDrawer::new(path.clone(), (cfg.output.snapshot_period * 1000.0) as u64)
    });
    let drawer = snapshot.as_mut().map(|d| d as &mut dyn Drawer);

    monitor.run(&mut writer, drawer)?;
    info!("results in {}", cfg.output.results.display());
    Ok(())
}

/// Calibrate, saving the frame next to `results` when it fails.
fn calibrate_frame(
    cfg: &TargetGridConfig,
    frame: &image::GrayImage,
    results: &Path,
) -> anyhow::Result<Calibration> {
    match TargetGridCalibrator::new(cfg.clone()).calibrate(frame) {
        Ok(calibration) => Ok(calibration),
        Err(e) => {
            let path = results.with_file_name("calibration_failure.png");
            match e.frame.save(&path) {
                Ok(()) => error!("{e}, frame saved to {}", path.display()),
                Err(save_err) => error!("{e}, and the frame could not be saved: {save_err}"),
            }
            Err(e.into())
        }
    }
}

fn calibrate(image_path: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let cfg = match config {
        Some(path) => parse_config_file(path)
            .with_context(|| format!("while reading config {}", path.display()))?
            .calibration,
        None => TargetGridConfig::default(),
    };
    let frame = image::open(image_path)
        .with_context(|| format!("opening {}", image_path.display()))?
        .to_luma8();
    let calibration = TargetGridCalibrator::new(cfg).calibrate(&frame)?;
    let rois: Vec<RoiFeatures> = calibration
        .rois
        .iter()
        .map(|roi| roi.get_feature_dict())
        .collect();
    println!("{}", serde_json::to_string_pretty(&rois)?);
    Ok(())
}

fn probe_ports(baud: u32) -> anyhow::Result<()> {
    let results = ethoscope_hardware::probe_ports(baud)?;
    if results.is_empty() {
        println!("no serial ports found");
    }
    for (name, opened) in results {
        match opened {
            Ok(()) => println!("{name}: ok"),
            Err(e) => println!("{name}: {e}"),
        }
    }
    Ok(())
}
