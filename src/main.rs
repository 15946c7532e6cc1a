// Example runner: tracks two synthetic blobs crossing a foreground mask and logs
// what the tracker reports for every frame.
//
// Usage: blobtrack [config.json]
// The optional JSON file may contain `tracker` and `detector` sections; missing
// values fall back to their defaults.

use anyhow::{Context, Result};
use blobtrack::{DetectorConfig, TrackerConfig, TrackingPipeline};
use image::{GrayImage, Luma};
use log::info;
use serde::Deserialize;
use std::env;

const FRAME_WIDTH: u32 = 160;
const FRAME_HEIGHT: u32 = 120;
const FRAME_COUNT: u32 = 40;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunnerConfig {
    tracker: TrackerConfig,
    detector: DetectorConfig,
}

fn load_config() -> Result<RunnerConfig> {
    match env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            let config: RunnerConfig =
                serde_json::from_str(&json).with_context(|| format!("parsing config file {path}"))?;
            config.tracker.validate()?;
            config.detector.validate()?;
            Ok(config)
        }
        None => Ok(RunnerConfig::default()),
    }
}

/// A car driving right along the top lane for the whole clip, and a pedestrian
/// walking down the left side who leaves the scene halfway through.
fn render_frame(frame: u32) -> GrayImage {
    let car = (4 + frame * 3, 20, 24, 12);
    let pedestrian = (30, 40 + frame * 2, 8, 16);
    let pedestrian_visible = frame < FRAME_COUNT / 2;

    GrayImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        let inside = |(rx, ry, rw, rh): (u32, u32, u32, u32)| {
            x >= rx && x < rx + rw && y >= ry && y < ry + rh
        };
        let on = inside(car) || (pedestrian_visible && inside(pedestrian));
        Luma([if on { 255 } else { 0 }])
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    info!("Tracker config: {:?}", config.tracker);
    let mut pipeline = TrackingPipeline::new(config.tracker, config.detector)?;

    for frame in 0..FRAME_COUNT {
        let report = pipeline.process_mask(&render_frame(frame))?;
        let ids: Vec<String> = report.seen_now.iter().map(ToString::to_string).collect();
        info!(
            "Frame {:>3}: {} detections, seen now [{}], evicted {:?}",
            report.frame_index,
            report.detection_count,
            ids.join(", "),
            report.summary.evicted
        );
    }

    for object in pipeline.tracked_objects(false) {
        let position = object.latest_position();
        info!(
            "{} at ({:.1}, {:.1}), {} detections, {} frames since last seen",
            object.id,
            position.x,
            position.y,
            object.confirmed_detection_count,
            object.frames_since_detection
        );
    }

    Ok(())
}
