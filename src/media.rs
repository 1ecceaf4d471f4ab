// Media loading module
// Decodes still images and animated GIFs into BGRA frames ready for display

use anyhow::{Context, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbaImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Delay used for animation frames that declare none
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// One decoded frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Raw BGRA pixel data (4 bytes per pixel, straight alpha)
    pub bgra: Vec<u8>,
    /// How long the frame stays on screen
    pub delay: Duration,
}

/// Decoded image or animation
#[derive(Debug, Clone)]
pub struct Media {
    frames: Vec<Frame>,
}

impl Media {
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self> {
        if frames.is_empty() {
            anyhow::bail!("media contains no frames");
        }
        Ok(Self { frames })
    }

    /// Native size of the first frame
    pub fn size(&self) -> (u32, u32) {
        let first = &self.frames[0];
        (first.width, first.height)
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Frame at `index`, wrapping around the animation
    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index % self.frames.len()]
    }
}

/// Load and decode a media file, auto-detecting the format from its content
pub fn load_media(path: &Path) -> Result<Media> {
    let data =
        fs::read(path).with_context(|| format!("Failed to read image file: {}", path.display()))?;
    load_from_bytes(&data).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Decode media from raw bytes
pub fn load_from_bytes(data: &[u8]) -> Result<Media> {
    let format = image::guess_format(data).context("Failed to detect image format")?;

    if format == ImageFormat::Gif {
        return load_gif(data);
    }

    let img = image::load(Cursor::new(data), format).context("Failed to decode image")?;
    Media::from_frames(vec![still_frame(img)])
}

fn load_gif(data: &[u8]) -> Result<Media> {
    let decoder = GifDecoder::new(Cursor::new(data)).context("Failed to open GIF")?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .context("Failed to decode GIF frames")?;

    let frames = frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let millis = if denom == 0 { 0 } else { numer / denom };
            let delay = if millis == 0 {
                DEFAULT_FRAME_DELAY
            } else {
                Duration::from_millis(millis as u64)
            };
            to_bgra_frame(frame.into_buffer(), delay)
        })
        .collect();

    Media::from_frames(frames)
}

fn still_frame(img: DynamicImage) -> Frame {
    to_bgra_frame(img.to_rgba8(), Duration::ZERO)
}

fn to_bgra_frame(rgba: RgbaImage, delay: Duration) -> Frame {
    let (width, height) = rgba.dimensions();

    // Wayland expects ARGB/BGRA in little-endian
    let mut bgra = rgba.into_raw();
    for pixel in bgra.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    Frame {
        width,
        height,
        bgra,
        delay,
    }
}
