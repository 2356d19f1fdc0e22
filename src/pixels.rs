//! Owned RGB pixel storage used by the reprojection core
//!
//! Sources are decoded once into `PixelBuffer`s before any pixel is
//! rendered. The core never touches the image codec types directly.

use image::RgbImage;

use crate::view::Channel;

/// Packed 8-bit RGB raster, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub const CHANNELS: usize = 3;

    /// Black buffer of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * Self::CHANNELS],
        }
    }

    /// Buffer filled with one color
    #[cfg(test)]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * Self::CHANNELS)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[cfg(test)]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * Self::CHANNELS
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * Self::CHANNELS)
    }

    /// Bounds-checked read of one channel
    #[inline]
    pub fn get_channel(&self, x: u32, y: u32, channel: Channel) -> Option<u8> {
        self.offset(x, y).map(|o| self.data[o + channel.index()])
    }

    #[cfg(test)]
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        self.offset(x, y)
            .map(|o| [self.data[o], self.data[o + 1], self.data[o + 2]])
    }

    /// Copy `src` into this buffer with its top-left corner at `(left, top)`
    ///
    /// Parts of `src` falling outside this buffer are dropped.
    pub fn paste(&mut self, src: &PixelBuffer, left: u32, top: u32) {
        if left >= self.width || top >= self.height {
            return;
        }
        let copy_w = src.width.min(self.width - left) as usize;
        let copy_h = src.height.min(self.height - top);
        let dst_stride = self.width as usize * Self::CHANNELS;
        let src_stride = src.width as usize * Self::CHANNELS;

        for row in 0..copy_h {
            let dst_start = (top + row) as usize * dst_stride + left as usize * Self::CHANNELS;
            let src_start = row as usize * src_stride;
            let len = copy_w * Self::CHANNELS;
            self.data[dst_start..dst_start + len]
                .copy_from_slice(&src.data[src_start..src_start + len]);
        }
    }

    pub fn into_rgb_image(self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data)
    }
}

impl From<RgbImage> for PixelBuffer {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_access() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, image::Rgb([10, 20, 30]));
        img.put_pixel(0, 1, image::Rgb([40, 50, 60]));
        let buf = PixelBuffer::from(img);

        assert_eq!(buf.get_channel(1, 0, Channel::Red), Some(10));
        assert_eq!(buf.get_channel(1, 0, Channel::Green), Some(20));
        assert_eq!(buf.get_channel(1, 0, Channel::Blue), Some(30));
        assert_eq!(buf.get_pixel(0, 1), Some([40, 50, 60]));
    }

    #[test]
    fn test_out_of_bounds() {
        let buf = PixelBuffer::filled(3, 2, [1, 2, 3]);
        assert_eq!(buf.get_channel(3, 0, Channel::Red), None);
        assert_eq!(buf.get_channel(0, 2, Channel::Red), None);
        assert_eq!(buf.get_channel(2, 1, Channel::Blue), Some(3));
    }

    #[test]
    fn test_paste_clips() {
        let mut dst = PixelBuffer::new(4, 3);
        let src = PixelBuffer::filled(3, 3, [9, 9, 9]);
        dst.paste(&src, 2, 1);

        assert_eq!(dst.get_pixel(1, 1), Some([0, 0, 0]));
        assert_eq!(dst.get_pixel(2, 1), Some([9, 9, 9]));
        assert_eq!(dst.get_pixel(3, 2), Some([9, 9, 9]));
        assert_eq!(dst.get_pixel(3, 0), Some([0, 0, 0]));
    }
}
