use crate::errors::{ProposalError, Result};
use crate::frame_processor::FrameResult;
use crate::traits::{FrameSource, ProposalConsumer};
use image::{Rgb, RgbImage};

/// Test frame source producing `total` two-tone frames.
///
/// The seam between the two colors moves one column right per frame, so
/// consecutive frames differ. Skipping is free and does not count as decoding.
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    total: u64,
    position: u64,
    width: u32,
    height: u32,
    corrupt: Vec<u64>,
    fault_at: Option<u64>,
    decoded: u64,
}

impl SyntheticVideo {
    pub const fn new(total: u64, width: u32, height: u32) -> Self {
        Self {
            total,
            position: 0,
            width,
            height,
            corrupt: Vec::new(),
            fault_at: None,
            decoded: 0,
        }
    }

    /// Frames at these indices fail with a recoverable decode error.
    pub fn with_corrupt_frames(mut self, indices: Vec<u64>) -> Self {
        self.corrupt = indices;
        self
    }

    /// Reading the frame at `index` fails as an unrecoverable source fault.
    pub const fn with_fault_at(mut self, index: u64) -> Self {
        self.fault_at = Some(index);
        self
    }

    pub const fn decoded_frames(&self) -> u64 {
        self.decoded
    }

    pub fn frame(&self, index: u64) -> RgbImage {
        two_tone_frame(self.width, self.height, index)
    }
}

impl FrameSource for SyntheticVideo {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.position >= self.total {
            return Ok(None);
        }
        let index = self.position;
        self.position += 1;

        if self.fault_at == Some(index) {
            return Err(ProposalError::FrameSource {
                operation: format!("reading frame {index}"),
                source: "synthetic device failure".into(),
            });
        }
        if self.corrupt.contains(&index) {
            return Err(ProposalError::FrameDecode {
                index,
                source: "synthetic corrupt frame".into(),
            });
        }
        self.decoded += 1;
        Ok(Some(self.frame(index)))
    }

    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        let skipped = count.min(self.total - self.position);
        self.position += skipped;
        Ok(skipped)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// Frame split vertically into a dark and a light part; the seam sits at `index + 1`.
pub fn two_tone_frame(width: u32, height: u32, index: u64) -> RgbImage {
    let seam = (index + 1).min(u64::from(width.saturating_sub(1))) as u32;
    RgbImage::from_fn(width, height, |x, _| {
        if x < seam {
            Rgb([20, 30, 40])
        } else {
            Rgb([230, 220, 210])
        }
    })
}

/// Consumer that keeps every result it receives.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    pub results: Vec<FrameResult>,
}

impl ProposalConsumer for RecordingConsumer {
    fn consume(&mut self, _frame: &RgbImage, result: &FrameResult) -> Result<()> {
        self.results.push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_video_exhausts() -> Result<()> {
        let mut video = SyntheticVideo::new(2, 4, 4);
        assert!(video.next_frame()?.is_some());
        assert!(video.next_frame()?.is_some());
        assert!(video.next_frame()?.is_none());
        assert_eq!(video.decoded_frames(), 2);
        Ok(())
    }

    #[test]
    fn test_skip_is_bounded_by_length() -> Result<()> {
        let mut video = SyntheticVideo::new(3, 4, 4);
        assert_eq!(video.skip_frames(10)?, 3);
        assert!(video.next_frame()?.is_none());
        assert_eq!(video.decoded_frames(), 0);
        Ok(())
    }

    #[test]
    fn test_two_tone_seam_moves() {
        let first = two_tone_frame(10, 2, 0);
        let second = two_tone_frame(10, 2, 1);
        assert_eq!(first.get_pixel(1, 0), &Rgb([230, 220, 210]));
        assert_eq!(second.get_pixel(1, 0), &Rgb([20, 30, 40]));
    }
}
