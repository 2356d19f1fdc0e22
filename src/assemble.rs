//! Packing separate view images into a single quilt
//!
//! Frames are placed in view order: the first frame lands in the
//! bottom-left tile, filling each row left to right and then moving up.

use tracing::info;

use crate::error::{ConvertError, Result};
use crate::pixels::PixelBuffer;
use crate::quilt::QuiltLayout;

/// Paste `frames` into a quilt of the given layout
pub fn assemble_quilt(layout: QuiltLayout, frames: &[PixelBuffer]) -> Result<PixelBuffer> {
    let (columns, rows) = match layout {
        QuiltLayout::Tiled {
            tiles_horizontal,
            tiles_vertical,
        } => (tiles_horizontal, tiles_vertical),
        QuiltLayout::Linear { tile_count } => (tile_count, 1),
        QuiltLayout::FrameSet { .. } => {
            return Err(ConvertError::config(
                "layout",
                "a frame set cannot be assembled, pick tiled or linear",
            ))
        }
    };

    if frames.len() != layout.view_count() {
        return Err(ConvertError::LayoutMismatch(format!(
            "{} needs {} frames, got {}",
            layout.describe(),
            layout.view_count(),
            frames.len()
        )));
    }

    let first = frames
        .first()
        .ok_or_else(|| ConvertError::LayoutMismatch("no frames to assemble".to_string()))?;
    let (tile_w, tile_h) = (first.width(), first.height());
    if let Some((idx, frame)) = frames
        .iter()
        .enumerate()
        .find(|(_, f)| (f.width(), f.height()) != (tile_w, tile_h))
    {
        return Err(ConvertError::LayoutMismatch(format!(
            "frame {} is {}x{}, expected {}x{}",
            idx,
            frame.width(),
            frame.height(),
            tile_w,
            tile_h
        )));
    }

    let mut quilt = PixelBuffer::new(tile_w * columns, tile_h * rows);
    for (view, frame) in frames.iter().enumerate() {
        let col = view as u32 % columns;
        let row_from_top = rows - 1 - view as u32 / columns;
        quilt.paste(frame, col * tile_w, row_from_top * tile_h);
    }

    info!(
        "Assembled {} quilt of {}x{}",
        layout.describe(),
        quilt.width(),
        quilt.height()
    );
    Ok(quilt)
}
