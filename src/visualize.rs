//! Drawing proposals for human inspection.
//!
//! Colors are random and carry no meaning. Nothing in here feeds back into
//! proposal generation.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use rand::Rng;

use crate::aggregator::Proposal;
use crate::errors::{ProposalError, Result};

/// Outline every proposal on `image` in a random color.
pub fn draw_proposals<R: Rng + ?Sized>(image: &mut RgbImage, proposals: &[Proposal], rng: &mut R) {
    for proposal in proposals {
        let bounds = proposal.bounds;
        let color = Rgb([rng.random(), rng.random(), rng.random()]);
        let rect = Rect::at(bounds.col_min as i32, bounds.row_min as i32)
            .of_size(bounds.width(), bounds.height());
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Where visualized frames are written.
pub enum VisualizationSink {
    /// One image file, overwritten by each frame.
    Still(PathBuf),
    /// Animated GIF with a fixed frame delay.
    Animation {
        encoder: GifEncoder<BufWriter<File>>,
        delay: Delay,
    },
    /// Directory receiving `frame_NNNNNN.png` per frame.
    FrameDirectory(PathBuf),
}

impl VisualizationSink {
    pub fn still(path: &Path) -> Self {
        Self::Still(path.to_path_buf())
    }

    /// A `.gif` path becomes an animation at `fps`; anything else a frame directory.
    pub fn for_video(path: &Path, fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ProposalError::validation(
                "viz-fps",
                format!("must be positive, got {fps}"),
            ));
        }

        if matches!(ImageFormat::from_path(path), Ok(ImageFormat::Gif)) {
            let file = File::create(path).map_err(|e| ProposalError::FileSystem {
                path: path.to_path_buf(),
                operation: "create visualization".to_string(),
                source: e,
            })?;
            let mut encoder = GifEncoder::new(BufWriter::new(file));
            encoder.set_repeat(Repeat::Infinite)?;
            let millis = (1000.0 / fps).round().max(1.0) as u32;
            return Ok(Self::Animation {
                encoder,
                delay: Delay::from_numer_denom_ms(millis, 1),
            });
        }

        fs::create_dir_all(path).map_err(|e| ProposalError::FileSystem {
            path: path.to_path_buf(),
            operation: "create visualization directory".to_string(),
            source: e,
        })?;
        Ok(Self::FrameDirectory(path.to_path_buf()))
    }

    pub fn write(&mut self, index: u64, image: &RgbImage) -> Result<()> {
        match self {
            Self::Still(path) => save(image, path),
            Self::Animation { encoder, delay } => {
                let buffer = DynamicImage::ImageRgb8(image.clone()).into_rgba8();
                encoder.encode_frame(Frame::from_parts(buffer, 0, 0, *delay))?;
                Ok(())
            }
            Self::FrameDirectory(dir) => save(image, &dir.join(format!("frame_{index:06}.png"))),
        }
    }
}

fn save(image: &RgbImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|e| ProposalError::ImageProcessing {
        path: path.display().to_string(),
        operation: "visualization save".to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::BoundingBox;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn proposal(row_min: u32, col_min: u32, row_max: u32, col_max: u32) -> Proposal {
        Proposal {
            bounds: BoundingBox {
                row_min,
                col_min,
                row_max,
                col_max,
            },
            granularity: 50.0,
            level: 0,
        }
    }

    #[test]
    fn test_rectangle_outline_is_drawn() {
        let mut image = RgbImage::new(20, 20);
        let mut rng = StdRng::seed_from_u64(7);
        draw_proposals(&mut image, &[proposal(2, 3, 10, 12)], &mut rng);

        let color = *image.get_pixel(3, 2);
        for (x, y) in [(12, 2), (3, 10), (12, 10), (7, 2), (3, 6)] {
            assert_eq!(image.get_pixel(x, y), &color);
        }
        // Interior and outside stay untouched.
        assert_eq!(image.get_pixel(7, 6), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(15, 15), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_frame_directory_sink() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let dir = temp_dir.path().join("viz");
        let mut sink = VisualizationSink::for_video(&dir, 12.0)?;
        sink.write(4, &RgbImage::new(5, 5))?;
        assert!(dir.join("frame_000004.png").exists());
        Ok(())
    }

    #[test]
    fn test_animation_sink_writes_gif() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("viz.gif");
        {
            let mut sink = VisualizationSink::for_video(&path, 24.0)?;
            sink.write(0, &RgbImage::new(5, 5))?;
            sink.write(1, &RgbImage::new(5, 5))?;
        }
        assert!(std::fs::metadata(&path)?.len() > 0);
        Ok(())
    }

    #[test]
    fn test_rejects_non_positive_fps() {
        let temp_dir = TempDir::new().expect("temp dir");
        let result = VisualizationSink::for_video(&temp_dir.path().join("out.gif"), 0.0);
        assert!(matches!(result, Err(ProposalError::Validation { .. })));
    }
}
