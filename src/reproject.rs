//! Quilt to native reprojection
//!
//! For every output pixel the red, green and blue sub-pixels each resolve
//! their own view and read one channel from that view. Pixels never depend
//! on each other, so rows are rendered in parallel on disjoint slices of the
//! output buffer.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::calibration::CalibrationParameters;
use crate::error::{ConvertError, Result};
use crate::pixels::PixelBuffer;
use crate::quilt::{QuiltAddresser, QuiltLayout};
use crate::source::QuiltSource;
use crate::view::{resolve_view, Channel};

/// Where inside an output pixel the screen position is sampled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingOrigin {
    /// `(i + 0.5) / width`
    #[default]
    PixelCenter,
    /// `i / width`
    PixelEdge,
}

impl SamplingOrigin {
    /// Normalized coordinate of pixel `index` along an axis of `extent` pixels
    #[inline]
    pub fn coordinate(self, index: u32, extent: u32) -> f64 {
        match self {
            SamplingOrigin::PixelCenter => (index as f64 + 0.5) / extent as f64,
            SamplingOrigin::PixelEdge => index as f64 / extent as f64,
        }
    }
}

/// Knobs that do not belong to the calibration or the layout
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub sampling_origin: SamplingOrigin,
    pub allow_uneven_tiles: bool,
}

pub struct Reprojector<'a> {
    calib: &'a CalibrationParameters,
    addresser: QuiltAddresser,
    source: &'a QuiltSource,
    origin: SamplingOrigin,
}

impl<'a> Reprojector<'a> {
    pub fn new(
        calib: &'a CalibrationParameters,
        addresser: QuiltAddresser,
        source: &'a QuiltSource,
        origin: SamplingOrigin,
    ) -> Self {
        Self {
            calib,
            addresser,
            source,
            origin,
        }
    }

    /// Color of the output pixel at normalized position `(u, v)`
    #[inline]
    pub fn pixel(&self, u: f64, v: f64) -> Result<[u8; 3]> {
        let view_count = self.addresser.view_count();

        let mut rgb = [0u8; 3];
        for channel in Channel::ALL {
            let offset = channel.phase_offset(self.calib);
            let view = resolve_view(u, v, offset, self.calib, view_count);
            let loc = self.addresser.locate(view, u, v)?;
            rgb[channel.index()] = self.source.fetch(loc, channel).ok_or_else(|| {
                ConvertError::LayoutMismatch(format!(
                    "view {} at ({:.6}, {:.6}) addresses {:?}, outside the source",
                    view, u, v, loc
                ))
            })?;
        }
        Ok(rgb)
    }

    fn render_row(&self, j: u32, row: &mut [u8], width: u32, height: u32) -> Result<()> {
        let v = self.origin.coordinate(j, height);
        for (i, px) in row.chunks_exact_mut(PixelBuffer::CHANNELS).enumerate() {
            let u = self.origin.coordinate(i as u32, width);
            px.copy_from_slice(&self.pixel(u, v)?);
        }
        Ok(())
    }

    /// Render a `width` x `height` native image
    pub fn render(&self, width: u32, height: u32) -> Result<PixelBuffer> {
        if width == 0 || height == 0 {
            return Err(ConvertError::config(
                "output_size",
                format!("must be positive, got {}x{}", width, height),
            ));
        }

        let mut out = PixelBuffer::new(width, height);
        let stride = out.stride();
        out.as_raw_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .try_for_each(|(j, row)| self.render_row(j as u32, row, width, height))?;
        Ok(out)
    }
}

/// Reproject `source`, packed as `layout`, into a native image
pub fn render(
    calib: &CalibrationParameters,
    layout: QuiltLayout,
    source: &QuiltSource,
    options: RenderOptions,
    width: u32,
    height: u32,
) -> Result<PixelBuffer> {
    let addresser = QuiltAddresser::new(layout, &source.dimensions(), options.allow_uneven_tiles)?;
    debug!(
        "Rendering {} views ({}) with {:?} sampling",
        addresser.view_count(),
        layout.describe(),
        options.sampling_origin
    );

    let started = Instant::now();
    let out = Reprojector::new(calib, addresser, source, options.sampling_origin)
        .render(width, height)?;
    info!(
        "Rendered {}x{} native image in {:.2?}",
        width,
        height,
        started.elapsed()
    );
    Ok(out)
}
