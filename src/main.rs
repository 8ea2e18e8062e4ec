use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use image::RgbImage;
use log::warn;
use rand::rngs::ThreadRng;

use object_proposals::sources::{open_video, StillImageSource};
use object_proposals::visualize::{draw_proposals, VisualizationSink};
use object_proposals::{
    Config, FrameProcessor, FrameResult, FrameSource, ProposalAggregator, ProposalConsumer,
};

/// Prints every rectangle of a still image, one per line.
struct StillReport {
    viz: Option<VisualizationSink>,
    rng: ThreadRng,
}

impl ProposalConsumer for StillReport {
    fn consume(&mut self, frame: &RgbImage, result: &FrameResult) -> object_proposals::Result<()> {
        for rect in result.rectangles() {
            println!("{rect}");
        }
        if let Some(sink) = self.viz.as_mut() {
            let mut canvas = frame.clone();
            draw_proposals(&mut canvas, &result.proposals, &mut self.rng);
            sink.write(result.index, &canvas)?;
        }
        Ok(())
    }
}

/// Prints a summary line per video frame and feeds the visualization, if any.
struct VideoReport {
    progress: ProgressBar,
    viz: Option<VisualizationSink>,
    rng: ThreadRng,
}

impl ProposalConsumer for VideoReport {
    fn consume(&mut self, frame: &RgbImage, result: &FrameResult) -> object_proposals::Result<()> {
        self.progress.suspend(|| {
            println!(
                "frame {}: {} proposals ({} sec)",
                result.index,
                result.proposals.len(),
                result.elapsed_secs()
            );
        });
        self.progress.inc(1);

        if let Some(sink) = self.viz.as_mut() {
            let mut canvas = frame.clone();
            draw_proposals(&mut canvas, &result.proposals, &mut self.rng);
            if let Err(e) = sink.write(result.index, &canvas) {
                warn!("Problem with visualization output, disabling visualization: {e}");
                self.viz = None;
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let config = Config::parse();

    config.validate()?;
    ensure!(
        config.input.exists(),
        "Input path does not exist: {}",
        config.input.display()
    );

    let aggregator = ProposalAggregator::new(config.aggregator_config()?)?;
    let bounds = config.frame_bounds()?;

    if config.video {
        let source = open_video(&config.input)
            .with_context(|| format!("Failed to open video: {}", config.input.display()))?;
        let viz = config
            .viz
            .as_deref()
            .map(|path| VisualizationSink::for_video(path, config.viz_fps))
            .transpose()?;

        let mut report = VideoReport {
            progress: progress_bar(source.frame_count_hint(), bounds.start, bounds.end)?,
            viz,
            rng: rand::rng(),
        };
        let summary = FrameProcessor::new(&aggregator, source, bounds).run(&mut report)?;
        report.progress.finish_and_clear();
        if summary.failed_frames > 0 {
            warn!("{} frames could not be decoded", summary.failed_frames);
        }
    } else {
        let source = StillImageSource::open(&config.input)
            .with_context(|| format!("Failed to open image: {}", config.input.display()))?;
        let mut report = StillReport {
            viz: config.viz.as_deref().map(VisualizationSink::still),
            rng: rand::rng(),
        };
        FrameProcessor::new(&aggregator, source, bounds).run(&mut report)?;
    }

    Ok(())
}

fn progress_bar(total: Option<u64>, start: u64, end: Option<u64>) -> Result<ProgressBar> {
    let Some(total) = total else {
        return Ok(ProgressBar::new_spinner());
    };
    let last = end.map_or(total, |end| end.saturating_add(1).min(total));
    let progress_bar = ProgressBar::new(last.saturating_sub(start));
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )?
        .progress_chars("#>-"),
    );
    Ok(progress_bar)
}
