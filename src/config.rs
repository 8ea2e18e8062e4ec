use clap::Parser;
use std::path::PathBuf;

use crate::aggregator::AggregatorConfig;
use crate::errors::{ProposalError, Result};
use crate::frame_processor::FrameBounds;
use crate::graph::Connectivity;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Input image, or with --video a directory of frames or an animated GIF
    pub input: PathBuf,

    /// Comma separated list of k values (default: 50,125,200)
    #[arg(short, value_delimiter = ',', allow_negative_numbers = true)]
    pub k: Vec<f64>,

    /// Minimum size of proposal; 0 or less disables the filter
    #[arg(short, long, default_value_t = 20, allow_negative_numbers = true)]
    pub min_size: i64,

    /// Visualization output path
    #[arg(long)]
    pub viz: Option<PathBuf>,

    /// Treat the input as a video
    #[arg(long)]
    pub video: bool,

    /// Start frame when processing a video
    #[arg(short, long, default_value_t = 0)]
    pub start: u64,

    /// End frame when processing a video, -1 for end of video
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub end: i64,

    /// Frame rate of an animated GIF visualization
    #[arg(short = 'f', long, default_value_t = 12.0)]
    pub viz_fps: f64,

    /// Pixel neighbourhood of the segmentation graph
    #[arg(long, value_enum, default_value_t = Connectivity::Eight)]
    pub connectivity: Connectivity,

    /// Gaussian smoothing applied before segmentation, 0 to disable
    #[arg(long, default_value_t = 0.0)]
    pub sigma: f32,

    /// Absorb initial regions smaller than this many pixels
    #[arg(long, default_value_t = 0)]
    pub min_region: u32,

    /// Maximum merge steps per k value
    #[arg(long)]
    pub max_merges: Option<usize>,

    /// Process k values one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,
}

impl Config {
    /// Validated engine parameters.
    pub fn aggregator_config(&self) -> Result<AggregatorConfig> {
        let config = AggregatorConfig::default()
            .with_granularities(self.k.clone())
            .with_min_size(self.min_size)
            .with_connectivity(self.connectivity)
            .with_sigma(self.sigma)
            .with_min_region_size(self.min_region)
            .with_max_merges(self.max_merges)
            .with_parallel(!self.sequential);
        config.validate()?;
        Ok(config)
    }

    /// Frame range to process; a still image always covers just its single frame.
    pub fn frame_bounds(&self) -> Result<FrameBounds> {
        if !self.video {
            return Ok(FrameBounds::single());
        }
        let end = match self.end {
            end if end < 0 => None,
            end => Some(end as u64),
        };
        FrameBounds::new(self.start, end)
    }

    pub fn validate(&self) -> Result<()> {
        self.aggregator_config()?;
        self.frame_bounds()?;
        if self.viz.is_some() && self.video && (!self.viz_fps.is_finite() || self.viz_fps <= 0.0)
        {
            return Err(ProposalError::validation(
                "viz-fps",
                format!("must be positive, got {}", self.viz_fps),
            ));
        }
        Ok(())
    }
}
