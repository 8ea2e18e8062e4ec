use image::RgbImage;
use imageproc::filter::gaussian_blur_f32;
use log::debug;
use rayon::prelude::*;

use crate::errors::{ProposalError, Result};
use crate::graph::{Connectivity, PixelGraph};
use crate::merger::RegionMerger;
use crate::segmenter::{BoundingBox, GraphSegmenter};

/// Coarse-to-fine spread used when no granularity values are configured.
pub const DEFAULT_GRANULARITIES: [f64; 3] = [50.0, 125.0, 200.0];

pub const DEFAULT_MIN_SIZE: u32 = 20;

/// A candidate object location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    pub bounds: BoundingBox,
    /// Granularity value of the run that produced the box.
    pub granularity: f64,
    /// `0` for initial regions, otherwise the 1-based merge step.
    pub level: usize,
}

impl Proposal {
    /// Whether the box spans at least `min_size` pixels from edge to edge on both axes.
    ///
    /// A single-pixel box spans zero, so it only survives `min_size == 0`.
    pub const fn meets_min_size(&self, min_size: u32) -> bool {
        self.bounds.col_max - self.bounds.col_min >= min_size
            && self.bounds.row_max - self.bounds.row_min >= min_size
    }
}

/// Parameters of one proposal-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    /// Granularity values, one segmentation run each. Empty means [`DEFAULT_GRANULARITIES`].
    pub granularities: Vec<f64>,
    /// Minimum box extent, `0` disables the filter.
    pub min_size: u32,
    pub connectivity: Connectivity,
    /// Gaussian pre-smoothing, `0` disables it.
    pub sigma: f32,
    /// Initial components smaller than this are absorbed into a neighbour.
    pub min_region_size: u32,
    /// Upper bound on merge steps per granularity run.
    pub max_merges: Option<usize>,
    /// Run granularity values on the rayon pool.
    pub parallel: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            granularities: DEFAULT_GRANULARITIES.to_vec(),
            min_size: DEFAULT_MIN_SIZE,
            connectivity: Connectivity::default(),
            sigma: 0.0,
            min_region_size: 0,
            max_merges: None,
            parallel: true,
        }
    }
}

impl AggregatorConfig {
    pub fn with_granularities(mut self, granularities: Vec<f64>) -> Self {
        self.granularities = granularities;
        self
    }

    /// Negative values disable the filter, like `0`.
    pub fn with_min_size(mut self, min_size: i64) -> Self {
        self.min_size = u32::try_from(min_size.max(0)).unwrap_or(u32::MAX);
        self
    }

    pub const fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub const fn with_sigma(mut self, sigma: f32) -> Self {
        self.sigma = sigma;
        self
    }

    pub const fn with_min_region_size(mut self, pixels: u32) -> Self {
        self.min_region_size = pixels;
        self
    }

    pub const fn with_max_merges(mut self, max_merges: Option<usize>) -> Self {
        self.max_merges = max_merges;
        self
    }

    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn effective_granularities(&self) -> &[f64] {
        if self.granularities.is_empty() {
            &DEFAULT_GRANULARITIES
        } else {
            &self.granularities
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(k) = self
            .granularities
            .iter()
            .find(|k| !k.is_finite() || **k < 0.0)
        {
            return Err(ProposalError::configuration(format!(
                "granularity values must be finite and non-negative, got {k}"
            )));
        }
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(ProposalError::validation(
                "sigma",
                format!("must be finite and non-negative, got {}", self.sigma),
            ));
        }
        Ok(())
    }
}

/// Runs segmentation and merging once per granularity value and collects every box.
#[derive(Debug, Clone)]
pub struct ProposalAggregator {
    config: AggregatorConfig,
}

impl ProposalAggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Proposals ordered by granularity index, then merge level. Duplicates are kept.
    pub fn generate(&self, image: &RgbImage) -> Vec<Proposal> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            debug!("skipping degenerate {width}x{height} image");
            return Vec::new();
        }

        let smoothed;
        let image = if self.config.sigma > 0.0 {
            smoothed = gaussian_blur_f32(image, self.config.sigma);
            &smoothed
        } else {
            image
        };

        let mut graph = PixelGraph::build(image, self.config.connectivity);
        graph.sort_by_weight();

        let granularities = self.config.effective_granularities();
        let runs: Vec<Vec<Proposal>> = if self.config.parallel {
            granularities
                .par_iter()
                .map(|&k| self.run_granularity(&graph, image, k))
                .collect()
        } else {
            granularities
                .iter()
                .map(|&k| self.run_granularity(&graph, image, k))
                .collect()
        };

        runs.into_iter().flatten().collect()
    }

    fn run_granularity(&self, graph: &PixelGraph, image: &RgbImage, k: f64) -> Vec<Proposal> {
        let segmentation = GraphSegmenter::new(k)
            .with_min_region_size(self.config.min_region_size)
            .segment(graph, image);

        let initial: Vec<Proposal> = segmentation
            .regions
            .iter()
            .map(|region| Proposal {
                bounds: region.bounds,
                granularity: k,
                level: 0,
            })
            .collect();

        let merged = RegionMerger::new(segmentation)
            .take(self.config.max_merges.unwrap_or(usize::MAX))
            .map(|step| Proposal {
                bounds: step.bounds,
                granularity: k,
                level: step.level,
            });

        let proposals: Vec<Proposal> = initial
            .into_iter()
            .chain(merged)
            .filter(|proposal| proposal.meets_min_size(self.config.min_size))
            .collect();
        debug!("k={k}: {} proposals after size filter", proposals.len());
        proposals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn full(width: u32, height: u32) -> BoundingBox {
        BoundingBox {
            row_min: 0,
            col_min: 0,
            row_max: height - 1,
            col_max: width - 1,
        }
    }

    fn aggregator(config: AggregatorConfig) -> ProposalAggregator {
        ProposalAggregator::new(config).expect("valid config")
    }

    #[test]
    fn test_rejects_negative_granularity() {
        let config = AggregatorConfig::default().with_granularities(vec![50.0, -1.0]);
        assert!(matches!(
            ProposalAggregator::new(config),
            Err(ProposalError::Configuration { .. })
        ));

        let config = AggregatorConfig::default().with_granularities(vec![f64::NAN]);
        assert!(ProposalAggregator::new(config).is_err());

        let config = AggregatorConfig::default().with_sigma(-0.5);
        assert!(matches!(
            ProposalAggregator::new(config),
            Err(ProposalError::Validation { .. })
        ));
    }

    #[test]
    fn test_empty_granularities_fall_back_to_defaults() {
        let config = AggregatorConfig::default().with_granularities(Vec::new());
        assert_eq!(config.effective_granularities(), &DEFAULT_GRANULARITIES);

        let image = RgbImage::from_pixel(30, 30, Rgb([9, 9, 9]));
        let proposals = aggregator(config).generate(&image);
        let ks: Vec<f64> = proposals.iter().map(|p| p.granularity).collect();
        assert_eq!(ks, DEFAULT_GRANULARITIES.to_vec());
    }

    #[test]
    fn test_negative_min_size_disables_filter() {
        let config = AggregatorConfig::default().with_min_size(-5);
        assert_eq!(config.min_size, 0);

        let image = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        let proposals = aggregator(config.with_granularities(vec![50.0])).generate(&image);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].bounds, full(1, 1));
    }

    #[test]
    fn test_single_pixel_cannot_meet_positive_floor() {
        let image = RgbImage::from_pixel(1, 1, Rgb([200, 10, 10]));
        for min_size in [1, 20] {
            let config = AggregatorConfig::default().with_min_size(min_size);
            assert!(aggregator(config).generate(&image).is_empty());
        }
    }

    #[test]
    fn test_zero_dimension_image_yields_nothing() {
        let proposals = aggregator(AggregatorConfig::default()).generate(&RgbImage::new(0, 12));
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_order_is_granularity_then_level() {
        let image = RgbImage::from_fn(60, 40, |x, _| {
            if x < 30 {
                Rgb([250, 0, 0])
            } else {
                Rgb([0, 0, 250])
            }
        });
        let config = AggregatorConfig::default()
            .with_granularities(vec![200.0, 10.0])
            .with_min_size(0);
        let proposals = aggregator(config).generate(&image);

        let keys: Vec<(f64, usize)> = proposals.iter().map(|p| (p.granularity, p.level)).collect();
        assert_eq!(
            keys,
            vec![(200.0, 0), (200.0, 0), (200.0, 1), (10.0, 0), (10.0, 0), (10.0, 1)]
        );
        assert_eq!(proposals[2].bounds, full(60, 40));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let image = RgbImage::from_fn(40, 30, |x, y| {
            Rgb([((x / 5) * 30) as u8, ((y / 6) * 45) as u8, ((x * y) % 200) as u8])
        });
        let config = AggregatorConfig::default().with_granularities(vec![20.0, 80.0, 300.0]);
        let parallel = aggregator(config.clone()).generate(&image);
        let sequential = aggregator(config.with_parallel(false)).generate(&image);
        assert!(!parallel.is_empty());
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_max_merges_caps_levels() {
        let image = RgbImage::from_fn(50, 10, |x, _| {
            let level = (x / 10 * 60) as u8;
            Rgb([level, level, level])
        });
        let config = AggregatorConfig::default()
            .with_granularities(vec![1.0])
            .with_min_size(0)
            .with_max_merges(Some(2));
        let proposals = aggregator(config).generate(&image);
        assert_eq!(proposals.iter().filter(|p| p.level == 0).count(), 5);
        assert_eq!(proposals.iter().map(|p| p.level).max(), Some(2));
    }

    #[test]
    fn test_smoothing_keeps_boxes_in_bounds() {
        let image = RgbImage::from_fn(32, 24, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let config = AggregatorConfig::default().with_sigma(0.8).with_min_size(0);
        for proposal in aggregator(config).generate(&image) {
            assert!(proposal.bounds.row_max < 24);
            assert!(proposal.bounds.col_max < 32);
            assert!(proposal.bounds.row_min <= proposal.bounds.row_max);
            assert!(proposal.bounds.col_min <= proposal.bounds.col_max);
        }
    }
}
