pub mod aggregator;
pub mod config;
pub mod errors;
pub mod frame_processor;
pub mod graph;
pub mod merger;
pub mod segmenter;
pub mod sources;
pub mod traits;
pub mod visualize;

pub mod mocks;

use image::RgbImage;

pub use aggregator::{AggregatorConfig, Proposal, ProposalAggregator};
pub use config::Config;
pub use errors::{ProposalError, Result};
pub use frame_processor::{FrameBounds, FrameProcessor, FrameResult, ProcessedFrame, RunSummary};
pub use graph::{Connectivity, PixelGraph};
pub use segmenter::BoundingBox;
pub use traits::*;

/// Candidate object locations in `image` for the given granularity values and size floor.
///
/// An empty `granularities` slice selects the built-in coarse-to-fine defaults.
pub fn find_candidate_object_locations(
    image: &RgbImage,
    granularities: &[f64],
    min_size: i64,
) -> Result<Vec<Proposal>> {
    let config = AggregatorConfig::default()
        .with_granularities(granularities.to_vec())
        .with_min_size(min_size);
    Ok(ProposalAggregator::new(config)?.generate(image))
}
