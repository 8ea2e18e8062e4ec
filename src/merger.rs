//! Greedy hierarchical merging of an initial segmentation.
//!
//! Adjacent regions are merged most-similar-first until no adjacent pair is
//! left. Every merge creates a region with a fresh id, so a queued candidate
//! is stale exactly when one of its regions is no longer alive.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use log::debug;
use ordered_float::OrderedFloat;

use crate::segmenter::{BoundingBox, Region, Segmentation};

/// Adjacent region pair queued for merging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeCandidate {
    /// Lower region id.
    pub region_a: usize,
    /// Higher region id.
    pub region_b: usize,
    pub score: OrderedFloat<f64>,
    pub combined_size: u64,
}

impl MergeCandidate {
    fn new(a: &Region, b: &Region, image_pixels: f64) -> Self {
        let (low, high) = if a.id < b.id { (a, b) } else { (b, a) };
        Self {
            region_a: low.id,
            region_b: high.id,
            score: OrderedFloat(similarity(low, high, image_pixels)),
            combined_size: u64::from(low.size) + u64::from(high.size),
        }
    }
}

impl Ord for MergeCandidate {
    // Max-heap order: highest score, then smallest combined size, then lowest id pair.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| Reverse(self.combined_size).cmp(&Reverse(other.combined_size)))
            .then_with(|| {
                Reverse((self.region_a, self.region_b))
                    .cmp(&Reverse((other.region_a, other.region_b)))
            })
    }
}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Similarity of two adjacent regions, in `[0, 3]`.
///
/// Sum of the color histogram intersection, a size term favouring small
/// regions and a fill term favouring pairs whose joint bounding box is
/// mostly covered by their pixels.
pub fn similarity(a: &Region, b: &Region, image_pixels: f64) -> f64 {
    let color = a.histogram.intersection(a.size, &b.histogram, b.size);
    let joint = f64::from(a.size) + f64::from(b.size);
    let size = 1.0 - joint / image_pixels;
    let hull = a.bounds.union(&b.bounds).area() as f64;
    let fill = 1.0 - (hull - joint) / image_pixels;
    color + size + fill
}

/// One merge of the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStep {
    /// 1-based index of the merge within its run.
    pub level: usize,
    /// Id of the newly created region.
    pub region: usize,
    pub children: (usize, usize),
    pub bounds: BoundingBox,
}

/// Iterator over the merges of one segmentation, in merge order.
#[derive(Debug)]
pub struct RegionMerger {
    image_pixels: f64,
    regions: Vec<Region>,
    alive: Vec<bool>,
    neighbors: Vec<BTreeMap<usize, usize>>,
    heap: BinaryHeap<MergeCandidate>,
    merges: usize,
}

impl RegionMerger {
    pub fn new(segmentation: Segmentation) -> Self {
        let image_pixels = (segmentation.width as f64 * segmentation.height as f64).max(1.0);
        let initial = segmentation.regions.len();

        let mut neighbors = vec![BTreeMap::new(); initial];
        for (&(a, b), &shared) in &segmentation.adjacency {
            neighbors[a].insert(b, shared);
            neighbors[b].insert(a, shared);
        }

        let heap = segmentation
            .adjacency
            .keys()
            .map(|&(a, b)| {
                MergeCandidate::new(
                    &segmentation.regions[a],
                    &segmentation.regions[b],
                    image_pixels,
                )
            })
            .collect();

        debug!(
            "k={}: merging {} regions over {} adjacent pairs",
            segmentation.granularity,
            initial,
            segmentation.adjacency.len()
        );

        Self {
            image_pixels,
            regions: segmentation.regions,
            alive: vec![true; initial],
            neighbors,
            heap,
            merges: 0,
        }
    }

    /// All regions created so far, initial ones first.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&alive| alive).count()
    }

    fn merge(&mut self, a: usize, b: usize) -> MergeStep {
        let Some(&shared) = self.neighbors[a].get(&b) else {
            unreachable!("regions {a} and {b} merged without being adjacent");
        };
        let id = self.regions.len();
        let region = Region::merged(id, &self.regions[a], &self.regions[b], shared);
        self.alive[a] = false;
        self.alive[b] = false;

        let mut joined = std::mem::take(&mut self.neighbors[a]);
        for (neighbor, count) in std::mem::take(&mut self.neighbors[b]) {
            *joined.entry(neighbor).or_insert(0) += count;
        }
        joined.remove(&a);
        joined.remove(&b);

        for (&neighbor, &count) in &joined {
            let entry = &mut self.neighbors[neighbor];
            entry.remove(&a);
            entry.remove(&b);
            entry.insert(id, count);
        }

        for &neighbor in joined.keys() {
            self.heap.push(MergeCandidate::new(
                &self.regions[neighbor],
                &region,
                self.image_pixels,
            ));
        }

        self.merges += 1;
        let step = MergeStep {
            level: self.merges,
            region: id,
            children: (a, b),
            bounds: region.bounds,
        };
        self.regions.push(region);
        self.alive.push(true);
        self.neighbors.push(joined);
        step
    }
}

impl Iterator for RegionMerger {
    type Item = MergeStep;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(candidate) = self.heap.pop() {
            if self.alive[candidate.region_a] && self.alive[candidate.region_b] {
                return Some(self.merge(candidate.region_a, candidate.region_b));
            }
        }
        None
    }
}
