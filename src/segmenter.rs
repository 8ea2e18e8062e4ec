use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use image::{Rgb, RgbImage};
use log::debug;

use crate::graph::{Edge, PixelGraph};

/// Bins per color channel in a region histogram.
pub const HISTOGRAM_BINS: usize = 25;

/// Inclusive row/column extents of a set of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub row_min: u32,
    pub col_min: u32,
    pub row_max: u32,
    pub col_max: u32,
}

impl BoundingBox {
    pub const fn point(row: u32, col: u32) -> Self {
        Self {
            row_min: row,
            col_min: col,
            row_max: row,
            col_max: col,
        }
    }

    pub fn include(&mut self, row: u32, col: u32) {
        self.row_min = self.row_min.min(row);
        self.col_min = self.col_min.min(col);
        self.row_max = self.row_max.max(row);
        self.col_max = self.col_max.max(col);
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            row_min: self.row_min.min(other.row_min),
            col_min: self.col_min.min(other.col_min),
            row_max: self.row_max.max(other.row_max),
            col_max: self.col_max.max(other.col_max),
        }
    }

    pub const fn width(&self) -> u32 {
        self.col_max - self.col_min + 1
    }

    pub const fn height(&self) -> u32 {
        self.row_max - self.row_min + 1
    }

    pub const fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({}, {}) ({}, {})]",
            self.col_min, self.row_min, self.col_max, self.row_max
        )
    }
}

/// Per-channel color histogram with [`HISTOGRAM_BINS`] bins per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorHistogram {
    bins: [u32; 3 * HISTOGRAM_BINS],
}

impl Default for ColorHistogram {
    fn default() -> Self {
        Self {
            bins: [0; 3 * HISTOGRAM_BINS],
        }
    }
}

impl ColorHistogram {
    pub fn add_pixel(&mut self, pixel: &Rgb<u8>) {
        for (channel, &value) in pixel.0.iter().enumerate() {
            let bin = usize::from(value) * HISTOGRAM_BINS / 256;
            self.bins[channel * HISTOGRAM_BINS + bin] += 1;
        }
    }

    pub fn combined(&self, other: &Self) -> Self {
        let mut bins = self.bins;
        for (bin, &count) in bins.iter_mut().zip(other.bins.iter()) {
            *bin += count;
        }
        Self { bins }
    }

    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    /// Intersection of the two L1-normalized histograms, averaged over channels.
    ///
    /// Returns a value in `[0, 1]`; `1` means identical color distributions.
    pub fn intersection(&self, pixels: u32, other: &Self, other_pixels: u32) -> f64 {
        if pixels == 0 || other_pixels == 0 {
            return 0.0;
        }
        let (na, nb) = (f64::from(pixels), f64::from(other_pixels));
        let overlap: f64 = self
            .bins
            .iter()
            .zip(other.bins.iter())
            .map(|(&a, &b)| (f64::from(a) / na).min(f64::from(b) / nb))
            .sum();
        overlap / 3.0
    }
}

/// A disjoint set of pixels together with its summary statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: usize,
    pub size: u32,
    pub bounds: BoundingBox,
    /// Largest edge weight accepted inside the region.
    pub max_internal_weight: f32,
    pub histogram: ColorHistogram,
    /// Number of pixel-graph edges crossing the region boundary.
    pub exterior_edges: usize,
}

impl Region {
    /// Combine two regions that share `shared_edges` pixel-graph edges.
    pub fn merged(id: usize, a: &Self, b: &Self, shared_edges: usize) -> Self {
        debug_assert!(a.exterior_edges >= shared_edges && b.exterior_edges >= shared_edges);
        Self {
            id,
            size: a.size + b.size,
            bounds: a.bounds.union(&b.bounds),
            max_internal_weight: a.max_internal_weight.max(b.max_internal_weight),
            histogram: a.histogram.combined(&b.histogram),
            exterior_edges: a.exterior_edges + b.exterior_edges - 2 * shared_edges,
        }
    }
}

/// Union-find over pixel nodes with the per-set statistics the threshold test needs.
///
/// Parents are stored as indices; `find` uses path halving.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
    size: Vec<u32>,
    internal: Vec<f32>,
}

impl DisjointSet {
    pub fn new(nodes: usize) -> Self {
        Self {
            parent: (0..nodes as u32).collect(),
            rank: vec![0; nodes],
            size: vec![1; nodes],
            internal: vec![0.0; nodes],
        }
    }

    pub fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    /// Join two roots through an edge of `weight`; returns the new root.
    pub fn union(&mut self, a: u32, b: u32, weight: f32) -> u32 {
        debug_assert_eq!(self.parent[a as usize], a, "union called with non-root");
        debug_assert_eq!(self.parent[b as usize], b, "union called with non-root");
        let (root, child) = if self.rank[a as usize] >= self.rank[b as usize] {
            (a, b)
        } else {
            (b, a)
        };
        if self.rank[root as usize] == self.rank[child as usize] {
            self.rank[root as usize] += 1;
        }
        self.parent[child as usize] = root;
        self.size[root as usize] += self.size[child as usize];
        self.internal[root as usize] = self.internal[root as usize]
            .max(self.internal[child as usize])
            .max(weight);
        root
    }

    pub fn size(&self, root: u32) -> u32 {
        self.size[root as usize]
    }

    pub fn internal_difference(&self, root: u32) -> f32 {
        self.internal[root as usize]
    }
}

/// Initial over-segmentation of one image for one granularity value.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub width: u32,
    pub height: u32,
    pub granularity: f64,
    /// Region id for every pixel, row-major.
    pub labels: Vec<u32>,
    /// Regions indexed by id, ordered by their first pixel in row-major order.
    pub regions: Vec<Region>,
    /// Shared edge count for each adjacent region pair `(lower id, higher id)`.
    pub adjacency: BTreeMap<(usize, usize), usize>,
}

impl Segmentation {
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels[(y * self.width + x) as usize]
    }
}

/// Threshold-adaptive single-linkage clustering over a [`PixelGraph`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphSegmenter {
    granularity: f64,
    min_region_size: u32,
}

impl GraphSegmenter {
    pub const fn new(granularity: f64) -> Self {
        Self {
            granularity,
            min_region_size: 0,
        }
    }

    /// Absorb components smaller than `pixels` into a neighbour after the threshold pass.
    pub const fn with_min_region_size(mut self, pixels: u32) -> Self {
        self.min_region_size = pixels;
        self
    }

    pub const fn granularity(&self) -> f64 {
        self.granularity
    }

    /// `image` supplies the colors for the region histograms and must be the
    /// image `graph` was built from.
    pub fn segment(&self, graph: &PixelGraph, image: &RgbImage) -> Segmentation {
        debug_assert_eq!(image.dimensions(), (graph.width(), graph.height()));

        let edges: Cow<'_, [Edge]> = if graph.is_sorted() {
            Cow::Borrowed(graph.edges())
        } else {
            let mut sorted = graph.edges().to_vec();
            sorted.sort_by(|a, b| a.weight.total_cmp(&b.weight));
            Cow::Owned(sorted)
        };

        let mut sets = DisjointSet::new(graph.node_count());
        for edge in edges.iter() {
            let a = sets.find(edge.source);
            let b = sets.find(edge.destination);
            if a == b {
                continue;
            }
            if self.accepts(&sets, a, edge.weight) && self.accepts(&sets, b, edge.weight) {
                sets.union(a, b, edge.weight);
            }
        }

        if self.min_region_size > 1 {
            for edge in edges.iter() {
                let a = sets.find(edge.source);
                let b = sets.find(edge.destination);
                if a != b
                    && (sets.size(a) < self.min_region_size || sets.size(b) < self.min_region_size)
                {
                    sets.union(a, b, edge.weight);
                }
            }
        }

        let segmentation = self.collect_regions(graph, image, &mut sets, &edges);
        debug!(
            "k={}: {} initial regions from {} pixels",
            self.granularity,
            segmentation.region_count(),
            graph.node_count()
        );
        segmentation
    }

    fn accepts(&self, sets: &DisjointSet, root: u32, weight: f32) -> bool {
        let threshold = f64::from(sets.internal_difference(root))
            + self.granularity / f64::from(sets.size(root));
        f64::from(weight) <= threshold
    }

    fn collect_regions(
        &self,
        graph: &PixelGraph,
        image: &RgbImage,
        sets: &mut DisjointSet,
        edges: &[Edge],
    ) -> Segmentation {
        let width = graph.width();
        let mut root_to_label = vec![u32::MAX; graph.node_count()];
        let mut labels = Vec::with_capacity(graph.node_count());
        let mut regions: Vec<Region> = Vec::new();

        for (index, pixel) in image.pixels().enumerate() {
            let root = sets.find(index as u32);
            let (row, col) = (index as u32 / width, index as u32 % width);
            let label = match root_to_label[root as usize] {
                u32::MAX => {
                    let label = regions.len() as u32;
                    root_to_label[root as usize] = label;
                    regions.push(Region {
                        id: label as usize,
                        size: 0,
                        bounds: BoundingBox::point(row, col),
                        max_internal_weight: sets.internal_difference(root),
                        histogram: ColorHistogram::default(),
                        exterior_edges: 0,
                    });
                    label
                }
                label => label,
            };
            let region = &mut regions[label as usize];
            region.size += 1;
            region.bounds.include(row, col);
            region.histogram.add_pixel(pixel);
            labels.push(label);
        }

        let mut adjacency = BTreeMap::new();
        for edge in edges {
            let a = labels[edge.source as usize] as usize;
            let b = labels[edge.destination as usize] as usize;
            if a != b {
                regions[a].exterior_edges += 1;
                regions[b].exterior_edges += 1;
                *adjacency.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }

        Segmentation {
            width,
            height: graph.height(),
            granularity: self.granularity,
            labels,
            regions,
            adjacency,
        }
    }
}
