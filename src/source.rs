//! Image file I/O at the edges of a conversion
//!
//! All sources are decoded into memory before rendering starts, and the
//! native image only appears at its destination once fully encoded.

use image::ImageFormat;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::pixels::PixelBuffer;
use crate::quilt::SourceLocation;
use crate::view::Channel;

/// Decoded source images, indexed by `SourceLocation::image`
#[derive(Debug, Clone)]
pub struct QuiltSource {
    images: Vec<PixelBuffer>,
}

impl QuiltSource {
    pub fn from_buffers(images: Vec<PixelBuffer>) -> Result<Self> {
        if images.is_empty() {
            return Err(ConvertError::LayoutMismatch("no source images".to_string()));
        }
        if let Some(idx) = images.iter().position(PixelBuffer::is_empty) {
            return Err(ConvertError::unavailable(
                format!("<source {}>", idx),
                "zero-sized image",
            ));
        }
        Ok(Self { images })
    }

    /// Single quilt image (tiled or linear)
    pub fn load_quilt(path: &Path) -> Result<Self> {
        let quilt = load_rgb(path)?;
        info!("Quilt {:?}: {}x{}", path, quilt.width(), quilt.height());
        Self::from_buffers(vec![quilt])
    }

    /// Numbered frames `first..=last` expanded from a printf-style pattern
    pub fn load_frames(pattern: &str, first: u32, last: u32) -> Result<Self> {
        let paths = frame_paths(pattern, first, last)?;
        let images = paths
            .par_iter()
            .map(|path| load_rgb(path))
            .collect::<Result<Vec<_>>>()?;
        let (w, h) = (images[0].width(), images[0].height());
        info!("Loaded {} frames, frame size {}x{}", images.len(), w, h);
        Self::from_buffers(images)
    }

    pub fn images(&self) -> &[PixelBuffer] {
        &self.images
    }

    pub fn dimensions(&self) -> Vec<(u32, u32)> {
        self.images.iter().map(|b| (b.width(), b.height())).collect()
    }

    #[inline]
    pub fn fetch(&self, loc: SourceLocation, channel: Channel) -> Option<u8> {
        self.images
            .get(loc.image)
            .and_then(|img| img.get_channel(loc.x, loc.y, channel))
    }
}

/// Decode any supported image file to 8-bit RGB
pub fn load_rgb(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path).map_err(|e| ConvertError::unavailable(path, e))?;
    let buffer = PixelBuffer::from(img.into_rgb8());
    if buffer.is_empty() {
        return Err(ConvertError::unavailable(path, "zero-sized image"));
    }
    debug!("Decoded {:?} ({}x{})", path, buffer.width(), buffer.height());
    Ok(buffer)
}

/// Expand a pattern such as `frame_%03d.png` for one index
///
/// Supports `%d`, `%Nd` and `%0Nd`; `%%` is a literal percent sign.
pub fn frame_path(pattern: &str, index: u32) -> Result<PathBuf> {
    let bad = |reason: &str| ConvertError::config("frame_pattern", format!("{:?}: {}", pattern, reason));

    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut placeholders = 0;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let zero_pad = chars.peek() == Some(&'0');
        if zero_pad {
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }
        if chars.next() != Some('d') {
            return Err(bad("only %d style placeholders are supported"));
        }

        placeholders += 1;
        if zero_pad {
            out.push_str(&format!("{:0width$}", index, width = width));
        } else {
            out.push_str(&format!("{:width$}", index, width = width));
        }
    }

    if placeholders != 1 {
        return Err(bad("expected exactly one %d placeholder"));
    }
    Ok(PathBuf::from(out))
}

pub fn frame_paths(pattern: &str, first: u32, last: u32) -> Result<Vec<PathBuf>> {
    if first > last {
        return Err(ConvertError::config(
            "frame_range",
            format!("first frame {} is after last frame {}", first, last),
        ));
    }
    (first..=last).map(|i| frame_path(pattern, i)).collect()
}

/// Encode `buffer` to `path`, replacing it only once encoding succeeded
pub fn save_atomic(buffer: PixelBuffer, path: &Path) -> Result<()> {
    let fail = |reason: String| ConvertError::Output {
        path: path.to_path_buf(),
        reason,
    };

    let format = ImageFormat::from_path(path).map_err(|e| fail(e.to_string()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| fail("not a file path".to_string()))?
        .to_string_lossy();
    let tmp = path.with_file_name(format!(".{}.partial", file_name));

    let img = buffer
        .into_rgb_image()
        .ok_or_else(|| fail("pixel buffer size mismatch".to_string()))?;

    if let Err(e) = img.save_with_format(&tmp, format) {
        let _ = std::fs::remove_file(&tmp);
        return Err(fail(e.to_string()));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        fail(e.to_string())
    })?;

    info!("Wrote {:?}", path);
    Ok(())
}
