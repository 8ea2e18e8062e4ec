//! Frame sources backed by still images, image sequences and animated GIFs.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, ImageFormat, RgbImage};
use log::debug;
use walkdir::WalkDir;

use crate::errors::{ProposalError, Result};
use crate::traits::FrameSource;

/// Decode an image file into RGB.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    image::open(path)
        .map(DynamicImage::into_rgb8)
        .map_err(|e| ProposalError::ImageProcessing {
            path: path.display().to_string(),
            operation: "image decode".to_string(),
            source: e,
        })
}

/// A single still image.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    image: Option<RgbImage>,
}

impl StillImageSource {
    pub const fn new(image: RgbImage) -> Self {
        Self { image: Some(image) }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(load_image(path)?))
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.image.take())
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(u64::from(self.image.is_some()))
    }
}

/// Frames already decoded into memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }

    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        let skipped = usize::try_from(count).map_or(self.frames.len(), |n| n.min(self.frames.len()));
        self.frames.drain(..skipped);
        Ok(skipped as u64)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }
}

/// Directory of still images treated as consecutive frames, in file name order.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceSource {
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ProposalError::FileSystem {
                path: dir.to_path_buf(),
                operation: "frame directory lookup".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "frame directory does not exist",
                ),
            });
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| ProposalError::FrameSource {
                operation: format!("listing {}", dir.display()),
                source: Box::new(e),
            })?;
            if entry.file_type().is_file() && ImageFormat::from_path(entry.path()).is_ok() {
                paths.push(entry.into_path());
            }
        }
        debug!("{} frames found in {}", paths.len(), dir.display());
        Ok(Self::from_paths(paths))
    }

    pub const fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { paths, position: 0 }
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.paths.get(self.position) else {
            return Ok(None);
        };
        let index = self.position as u64;
        self.position += 1;
        image::open(path)
            .map(|image| Some(image.into_rgb8()))
            .map_err(|e| ProposalError::FrameDecode {
                index,
                source: Box::new(e),
            })
    }

    fn skip_frames(&mut self, count: u64) -> Result<u64> {
        let remaining = self.paths.len() - self.position;
        let skipped = usize::try_from(count).map_or(remaining, |n| n.min(remaining));
        self.position += skipped;
        Ok(skipped as u64)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.paths.len() as u64)
    }
}

/// Frames of an animated GIF, composited to the full canvas.
pub struct GifSource {
    frames: Frames<'static>,
}

impl GifSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ProposalError::FileSystem {
            path: path.to_path_buf(),
            operation: "open animation".to_string(),
            source: e,
        })?;
        let decoder =
            GifDecoder::new(BufReader::new(file)).map_err(|e| ProposalError::ImageProcessing {
                path: path.display().to_string(),
                operation: "GIF header decode".to_string(),
                source: e,
            })?;
        Ok(Self {
            frames: decoder.into_frames(),
        })
    }
}

impl FrameSource for GifSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match self.frames.next() {
            None => Ok(None),
            Some(Ok(frame)) => Ok(Some(DynamicImage::ImageRgba8(frame.into_buffer()).into_rgb8())),
            Some(Err(e)) => Err(ProposalError::FrameSource {
                operation: "GIF frame decode".to_string(),
                source: Box::new(e),
            }),
        }
    }
}

/// Open `path` as a video-like frame source: a directory of frames or an animated GIF.
pub fn open_video(path: &Path) -> Result<Box<dyn FrameSource>> {
    if path.is_dir() {
        return Ok(Box::new(ImageSequenceSource::from_dir(path)?));
    }
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Gif) => Ok(Box::new(GifSource::open(path)?)),
        _ => Err(ProposalError::configuration(format!(
            "{} is not a frame directory or animated GIF",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgb, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn test_still_image_yields_once() -> Result<()> {
        let mut source = StillImageSource::new(RgbImage::new(3, 3));
        assert_eq!(source.frame_count_hint(), Some(1));
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.frame_count_hint(), Some(0));
        Ok(())
    }

    #[test]
    fn test_memory_source_skips_without_decoding() -> Result<()> {
        let frames = (0..4u8)
            .map(|i| RgbImage::from_pixel(2, 2, Rgb([i, i, i])))
            .collect();
        let mut source = MemorySource::new(frames);
        assert_eq!(source.skip_frames(3)?, 3);
        let frame = source.next_frame()?.expect("one frame left");
        assert_eq!(frame.get_pixel(0, 0), &Rgb([3, 3, 3]));
        assert_eq!(source.skip_frames(5)?, 0);
        Ok(())
    }

    #[test]
    fn test_image_sequence_orders_by_name_and_skips_non_images() -> Result<()> {
        let temp_dir = TempDir::new()?;
        for (name, level) in [("frame_002.png", 2u8), ("frame_000.png", 0), ("frame_001.png", 1)] {
            RgbImage::from_pixel(4, 4, Rgb([level, 0, 0])).save(temp_dir.path().join(name))?;
        }
        std::fs::write(temp_dir.path().join("notes.txt"), b"not a frame")?;

        let mut source = ImageSequenceSource::from_dir(temp_dir.path())?;
        assert_eq!(source.frame_count_hint(), Some(3));
        assert_eq!(source.skip_frames(1)?, 1);
        let frame = source.next_frame()?.expect("second frame");
        assert_eq!(frame.get_pixel(0, 0), &Rgb([1, 0, 0]));
        Ok(())
    }

    #[test]
    fn test_unreadable_sequence_frame_is_recoverable() -> Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::write(temp_dir.path().join("a.png"), b"garbage")?;
        RgbImage::new(2, 2).save(temp_dir.path().join("b.png"))?;

        let mut source = ImageSequenceSource::from_dir(temp_dir.path())?;
        let first = source.next_frame();
        assert!(first.as_ref().is_err_and(ProposalError::is_recoverable));
        assert!(source.next_frame()?.is_some());
        Ok(())
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let result = ImageSequenceSource::from_dir(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(ProposalError::FileSystem { .. })));
    }

    #[test]
    fn test_gif_frames_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("clip.gif");
        {
            let mut encoder = GifEncoder::new(File::create(&path)?);
            for level in [0u8, 255] {
                let buffer = RgbaImage::from_pixel(6, 4, Rgba([level, level, level, 255]));
                encoder.encode_frame(Frame::from_parts(
                    buffer,
                    0,
                    0,
                    Delay::from_numer_denom_ms(100, 1),
                ))?;
            }
        }

        let mut source = open_video(&path)?;
        let first = source.next_frame()?.expect("first frame");
        assert_eq!(first.dimensions(), (6, 4));
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn test_open_video_rejects_still_formats() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("still.png");
        RgbImage::new(2, 2).save(&path)?;
        assert!(matches!(
            open_video(&path),
            Err(ProposalError::Configuration { .. })
        ));
        Ok(())
    }
}
