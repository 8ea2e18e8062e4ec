use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use log::{info, warn};

use crate::aggregator::{Proposal, ProposalAggregator};
use crate::errors::{ProposalError, Result};
use crate::segmenter::BoundingBox;
use crate::traits::{FrameSource, ProposalConsumer};

/// Inclusive frame index range. `end == None` runs until the source is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameBounds {
    pub start: u64,
    pub end: Option<u64>,
}

impl FrameBounds {
    pub fn new(start: u64, end: Option<u64>) -> Result<Self> {
        if let Some(end) = end {
            if end < start {
                return Err(ProposalError::configuration(format!(
                    "end frame {end} is before start frame {start}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Exactly the first frame, as used for still images.
    pub const fn single() -> Self {
        Self {
            start: 0,
            end: Some(0),
        }
    }

    pub const fn contains(&self, index: u64) -> bool {
        index >= self.start
            && match self.end {
                Some(end) => index <= end,
                None => true,
            }
    }
}

/// Proposals found in one frame and the time it took to find them.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub index: u64,
    pub proposals: Vec<Proposal>,
    pub elapsed: Duration,
}

impl FrameResult {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn rectangles(&self) -> impl Iterator<Item = BoundingBox> + '_ {
        self.proposals.iter().map(|proposal| proposal.bounds)
    }
}

/// A frame handed back together with its result, for consumers that draw on it.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub image: RgbImage,
    pub result: FrameResult,
}

/// Totals of a completed frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub failed_frames: u64,
    pub proposals: u64,
}

/// Time one proposal-generation call on `image`.
pub fn process_frame(aggregator: &ProposalAggregator, index: u64, image: &RgbImage) -> FrameResult {
    let started = Instant::now();
    let proposals = aggregator.generate(image);
    let elapsed = started.elapsed();
    info!(
        "frame {index}: {} proposals in {:.3}s",
        proposals.len(),
        elapsed.as_secs_f64()
    );
    FrameResult {
        index,
        proposals,
        elapsed,
    }
}

/// Forward-only sequence of processed frames within [`FrameBounds`].
///
/// Each item is one frame: either its result, or the error that frame produced.
/// After an unrecoverable source error, exhaustion, the end bound, or
/// cancellation, the iterator yields nothing more.
pub struct FrameProcessor<'a, S: FrameSource> {
    aggregator: &'a ProposalAggregator,
    source: S,
    bounds: FrameBounds,
    next_index: u64,
    positioned: bool,
    finished: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, S: FrameSource> FrameProcessor<'a, S> {
    pub fn new(aggregator: &'a ProposalAggregator, source: S, bounds: FrameBounds) -> Self {
        Self {
            aggregator,
            source,
            bounds,
            next_index: 0,
            positioned: false,
            finished: false,
            cancel: None,
        }
    }

    /// Stop before the next frame once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Drive the loop to completion, handing every frame to `consumer`.
    ///
    /// Recoverable frame failures are logged and counted; source faults and
    /// consumer errors end the run with that error.
    pub fn run<C: ProposalConsumer + ?Sized>(self, consumer: &mut C) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for outcome in self {
            match outcome {
                Ok(frame) => {
                    summary.frames += 1;
                    summary.proposals += frame.result.proposals.len() as u64;
                    consumer.consume(&frame.image, &frame.result)?;
                }
                Err(e) if e.is_recoverable() => {
                    warn!("{e}");
                    summary.failed_frames += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn position(&mut self) -> Result<()> {
        self.positioned = true;
        if self.bounds.start == 0 {
            return Ok(());
        }
        let skipped = self.source.skip_frames(self.bounds.start)?;
        self.next_index = skipped;
        if skipped < self.bounds.start {
            self.finished = true;
        }
        Ok(())
    }
}

impl<S: FrameSource> Iterator for FrameProcessor<'_, S> {
    type Item = Result<ProcessedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.is_cancelled() {
            info!("frame loop cancelled before frame {}", self.next_index);
            self.finished = true;
            return None;
        }
        if !self.positioned {
            if let Err(e) = self.position() {
                self.finished = true;
                return Some(Err(e));
            }
            if self.finished {
                return None;
            }
        }
        if !self.bounds.contains(self.next_index) {
            self.finished = true;
            return None;
        }

        let index = self.next_index;
        match self.source.next_frame() {
            Ok(Some(image)) => {
                self.next_index += 1;
                let result = process_frame(self.aggregator, index, &image);
                Some(Ok(ProcessedFrame { image, result }))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(ProposalError::FrameDecode { source, .. }) => {
                self.next_index += 1;
                Some(Err(ProposalError::FrameDecode { index, source }))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
