use crate::errors::Result;
use crate::frame_processor::FrameResult;
use image::RgbImage;

/// Supplier of decoded frames.
///
/// `Ok(None)` means the source is exhausted. A `FrameDecode` error means a
/// single frame was unreadable and the next call may succeed; any other
/// error means the source is unusable.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Advance past `count` frames and return how many were actually skipped.
    ///
    /// The default decodes and drops frames; sources that can seek should override it.
    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        let mut skipped = 0;
        while skipped < count {
            match self.next_frame() {
                Ok(Some(_)) => skipped += 1,
                Ok(None) => break,
                Err(e) if e.is_recoverable() => skipped += 1,
                Err(e) => return Err(e),
            }
        }
        Ok(skipped)
    }

    /// Total number of frames, if known up front.
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }

    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        (**self).skip_frames(count)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        (**self).next_frame()
    }

    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        (**self).skip_frames(count)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        (**self).frame_count_hint()
    }
}

/// Receiver of per-frame proposal results.
///
/// Zero proposals is a normal result. An error returned here stops the frame loop.
pub trait ProposalConsumer {
    fn consume(&mut self, frame: &RgbImage, result: &FrameResult) -> Result<()>;
}
