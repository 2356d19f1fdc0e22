//! Quilt layouts and view addressing
//!
//! Views are numbered from the bottom-left of a tiled quilt, left to right
//! and then upward. For a 4x8 quilt:
//!
//! ```text
//! 28  29  30  31
//! 24  25  26  27
//! ..
//!  4   5   6   7
//!  0   1   2   3
//! ```
//!
//! A linear quilt puts every view side by side in one row, and a frame set
//! keeps each view in its own image.

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

pub const DEFAULT_TILES_HORIZONTAL: u32 = 5;
pub const DEFAULT_TILES_VERTICAL: u32 = 9;
pub const DEFAULT_LINEAR_TILES: u32 = 45;

/// How a frame set picks the column inside the selected frame
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FrameAddressing {
    /// Column derived from the view index and `u` together, per channel
    #[default]
    ChannelColumn,
    /// Same column `u * frame_width` for every channel
    SharedColumn,
}

/// How the views are packed into the source images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiltLayout {
    Tiled {
        tiles_horizontal: u32,
        tiles_vertical: u32,
    },
    Linear {
        tile_count: u32,
    },
    FrameSet {
        frame_width: u32,
        frame_height: u32,
        frame_count: u32,
        addressing: FrameAddressing,
    },
}

impl QuiltLayout {
    pub fn tiled(tiles_horizontal: u32, tiles_vertical: u32) -> Result<Self> {
        if tiles_horizontal == 0 {
            return Err(ConvertError::config("tiles_horizontal", "must be positive, got 0"));
        }
        if tiles_vertical == 0 {
            return Err(ConvertError::config("tiles_vertical", "must be positive, got 0"));
        }
        Ok(Self::Tiled {
            tiles_horizontal,
            tiles_vertical,
        })
    }

    pub fn linear(tile_count: u32) -> Result<Self> {
        if tile_count == 0 {
            return Err(ConvertError::config("tile_count", "must be positive, got 0"));
        }
        Ok(Self::Linear { tile_count })
    }

    pub fn frame_set(
        frame_width: u32,
        frame_height: u32,
        frame_count: u32,
        addressing: FrameAddressing,
    ) -> Result<Self> {
        if frame_count == 0 {
            return Err(ConvertError::config("frame_count", "must be positive, got 0"));
        }
        if frame_width == 0 || frame_height == 0 {
            return Err(ConvertError::config(
                "frame_size",
                format!("must be positive, got {}x{}", frame_width, frame_height),
            ));
        }
        Ok(Self::FrameSet {
            frame_width,
            frame_height,
            frame_count,
            addressing,
        })
    }

    /// Number of distinct views the layout holds
    pub fn view_count(&self) -> usize {
        match *self {
            Self::Tiled {
                tiles_horizontal,
                tiles_vertical,
            } => tiles_horizontal as usize * tiles_vertical as usize,
            Self::Linear { tile_count } => tile_count as usize,
            Self::FrameSet { frame_count, .. } => frame_count as usize,
        }
    }

    /// Number of source images the layout reads from
    pub fn source_count(&self) -> usize {
        match *self {
            Self::Tiled { .. } | Self::Linear { .. } => 1,
            Self::FrameSet { frame_count, .. } => frame_count as usize,
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Self::Tiled {
                tiles_horizontal,
                tiles_vertical,
            } => format!("tiled {}x{}", tiles_horizontal, tiles_vertical),
            Self::Linear { tile_count } => format!("linear {}", tile_count),
            Self::FrameSet {
                frame_width,
                frame_height,
                frame_count,
                addressing,
            } => format!(
                "{} frames of {}x{} ({:?})",
                frame_count, frame_width, frame_height, addressing
            ),
        }
    }
}

/// Pixel inside one of the source images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub image: usize,
    pub x: u32,
    pub y: u32,
}

/// Layout bound to the pixel size of its sources
#[derive(Debug, Clone, Copy)]
pub struct QuiltAddresser {
    layout: QuiltLayout,
    width: f64,
    height: f64,
    view_count: usize,
}

impl QuiltAddresser {
    /// Check the layout against the source sizes (one entry per image)
    ///
    /// With `allow_uneven` a quilt whose size is not a multiple of the tile
    /// grid is accepted with a warning instead of failing.
    pub fn new(layout: QuiltLayout, sources: &[(u32, u32)], allow_uneven: bool) -> Result<Self> {
        if sources.len() != layout.source_count() {
            return Err(ConvertError::LayoutMismatch(format!(
                "{} expects {} source image(s), got {}",
                layout.describe(),
                layout.source_count(),
                sources.len()
            )));
        }

        let (width, height) = match layout {
            QuiltLayout::Tiled {
                tiles_horizontal,
                tiles_vertical,
            } => {
                let (w, h) = sources[0];
                check_divisible(w, tiles_horizontal, "width", &layout, allow_uneven)?;
                check_divisible(h, tiles_vertical, "height", &layout, allow_uneven)?;
                (w, h)
            }
            QuiltLayout::Linear { tile_count } => {
                let (w, h) = sources[0];
                check_divisible(w, tile_count, "width", &layout, allow_uneven)?;
                (w, h)
            }
            QuiltLayout::FrameSet {
                frame_width,
                frame_height,
                ..
            } => {
                if let Some((idx, &(w, h))) = sources
                    .iter()
                    .enumerate()
                    .find(|(_, size)| **size != (frame_width, frame_height))
                {
                    return Err(ConvertError::LayoutMismatch(format!(
                        "frame {} is {}x{}, expected {}x{}",
                        idx, w, h, frame_width, frame_height
                    )));
                }
                (frame_width, frame_height)
            }
        };

        Ok(Self {
            layout,
            width: width as f64,
            height: height as f64,
            view_count: layout.view_count(),
        })
    }

    pub fn view_count(&self) -> usize {
        self.view_count
    }

    /// Source pixel showing `view` at normalized position `(u, v)`
    ///
    /// Coordinates are truncated (nearest-neighbour sampling).
    #[inline]
    pub fn locate(&self, view: usize, u: f64, v: f64) -> Result<SourceLocation> {
        if view >= self.view_count {
            return Err(ConvertError::LayoutMismatch(format!(
                "view index {} outside [0, {}) for {}",
                view,
                self.view_count,
                self.layout.describe()
            )));
        }

        let location = match self.layout {
            QuiltLayout::Tiled {
                tiles_horizontal,
                tiles_vertical,
            } => {
                let th = tiles_horizontal as usize;
                let col = (view % th) as f64;
                // Rows are counted from the top of the image
                let row = (tiles_vertical as usize - 1 - view / th) as f64;
                SourceLocation {
                    image: 0,
                    x: ((u + col) / tiles_horizontal as f64 * self.width) as u32,
                    y: ((v + row) / tiles_vertical as f64 * self.height) as u32,
                }
            }
            QuiltLayout::Linear { tile_count } => SourceLocation {
                image: 0,
                x: ((u + view as f64) / tile_count as f64 * self.width) as u32,
                y: (v * self.height) as u32,
            },
            QuiltLayout::FrameSet {
                frame_width,
                frame_count,
                addressing,
                ..
            } => {
                let x = match addressing {
                    FrameAddressing::SharedColumn => (u * self.width) as u32,
                    FrameAddressing::ChannelColumn => {
                        let n = frame_count as f64;
                        let pos = (u + view as f64) * (1.0 / n);
                        let i = (pos * self.width * n) as u64;
                        (i % frame_width as u64) as u32
                    }
                };
                SourceLocation {
                    image: view,
                    x,
                    y: (v * self.height) as u32,
                }
            }
        };
        Ok(location)
    }
}

fn check_divisible(
    size: u32,
    tiles: u32,
    axis: &str,
    layout: &QuiltLayout,
    allow_uneven: bool,
) -> Result<()> {
    if size == 0 {
        return Err(ConvertError::LayoutMismatch(format!("quilt {} is 0", axis)));
    }
    if size % tiles == 0 {
        return Ok(());
    }
    let msg = format!(
        "quilt {} {} is not divisible by {} tiles ({})",
        axis,
        size,
        tiles,
        layout.describe()
    );
    if allow_uneven {
        tracing::warn!("{}", msg);
        Ok(())
    } else {
        Err(ConvertError::LayoutMismatch(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_of(addr: &QuiltAddresser, view: usize, tile_w: u32, tile_h: u32) -> (u32, u32) {
        let loc = addr.locate(view, 0.5, 0.5).unwrap();
        (loc.x / tile_w, loc.y / tile_h)
    }

    #[test]
    fn test_tiled_corners() {
        let layout = QuiltLayout::tiled(4, 8).unwrap();
        let addr = QuiltAddresser::new(layout, &[(400, 800)], false).unwrap();
        assert_eq!(addr.view_count(), 32);

        // Bottom-left
        assert_eq!(tile_of(&addr, 0, 100, 100), (0, 7));
        // Top-right
        assert_eq!(tile_of(&addr, 31, 100, 100), (3, 0));
        // Rows continue upward
        assert_eq!(tile_of(&addr, 3, 100, 100), (3, 7));
        assert_eq!(tile_of(&addr, 4, 100, 100), (0, 6));
        assert_eq!(tile_of(&addr, 28, 100, 100), (0, 0));
    }

    #[test]
    fn test_tiled_local_offset() {
        let layout = QuiltLayout::tiled(4, 8).unwrap();
        let addr = QuiltAddresser::new(layout, &[(400, 800)], false).unwrap();
        let loc = addr.locate(5, 0.25, 0.75).unwrap();
        // view 5: column 1, row 6 from the top
        assert_eq!(loc, SourceLocation { image: 0, x: 125, y: 675 });
    }

    #[test]
    fn test_linear() {
        let layout = QuiltLayout::linear(4).unwrap();
        let addr = QuiltAddresser::new(layout, &[(400, 200)], false).unwrap();

        let loc = addr.locate(0, 0.5, 0.5).unwrap();
        assert_eq!(loc, SourceLocation { image: 0, x: 50, y: 100 });

        let loc = addr.locate(3, 0.5, 0.25).unwrap();
        assert_eq!(loc, SourceLocation { image: 0, x: 350, y: 50 });

        let err = QuiltAddresser::new(layout, &[(401, 200)], false).unwrap_err();
        assert!(matches!(err, ConvertError::LayoutMismatch(_)));
    }

    #[test]
    fn test_frame_set_addressing() {
        for addressing in [FrameAddressing::SharedColumn, FrameAddressing::ChannelColumn] {
            let layout = QuiltLayout::frame_set(10, 20, 4, addressing).unwrap();
            let addr = QuiltAddresser::new(layout, &[(10, 20); 4], false).unwrap();
            let loc = addr.locate(2, 0.5, 0.25).unwrap();
            assert_eq!(loc, SourceLocation { image: 2, x: 5, y: 5 }, "{:?}", addressing);
        }
    }

    #[test]
    fn test_channel_column_stays_in_frame() {
        let layout = QuiltLayout::frame_set(7, 3, 5, FrameAddressing::ChannelColumn).unwrap();
        let addr = QuiltAddresser::new(layout, &[(7, 3); 5], false).unwrap();
        for view in 0..5 {
            for i in 0..70 {
                let u = (i as f64 + 0.5) / 70.0;
                let loc = addr.locate(view, u, 0.5).unwrap();
                assert_eq!(loc.image, view);
                assert!(loc.x < 7);
            }
        }
    }

    #[test]
    fn test_view_out_of_range() {
        let layout = QuiltLayout::tiled(5, 9).unwrap();
        let addr = QuiltAddresser::new(layout, &[(500, 900)], false).unwrap();
        let err = addr.locate(45, 0.5, 0.5).unwrap_err();
        assert!(matches!(err, ConvertError::LayoutMismatch(_)));
        assert!(err.to_string().contains("45"));
    }

    #[test]
    fn test_uneven_quilt() {
        let layout = QuiltLayout::tiled(5, 9).unwrap();
        let err = QuiltAddresser::new(layout, &[(2048, 2048)], false).unwrap_err();
        assert!(matches!(err, ConvertError::LayoutMismatch(_)));
        assert!(err.to_string().contains("2048"));

        assert!(QuiltAddresser::new(layout, &[(2048, 2048)], true).is_ok());
    }

    #[test]
    fn test_frame_size_mismatch() {
        let layout = QuiltLayout::frame_set(10, 10, 3, FrameAddressing::SharedColumn).unwrap();
        let err = QuiltAddresser::new(layout, &[(10, 10), (10, 11), (10, 10)], false).unwrap_err();
        assert!(err.to_string().contains("frame 1"));

        let err = QuiltAddresser::new(layout, &[(10, 10); 2], false).unwrap_err();
        assert!(matches!(err, ConvertError::LayoutMismatch(_)));
    }

    #[test]
    fn test_zero_sized_layouts_rejected() {
        assert!(QuiltLayout::tiled(0, 9).is_err());
        assert!(QuiltLayout::tiled(5, 0).is_err());
        assert!(QuiltLayout::linear(0).is_err());
        assert!(QuiltLayout::frame_set(10, 10, 0, FrameAddressing::default()).is_err());
    }
}
