//! Lenticular view resolution
//!
//! Every screen sub-pixel sits under a lenticule at some phase `a`. The
//! fractional part of `a`, scaled by the number of views, tells which view
//! is visible through the lens at that sub-pixel. Red, green and blue are
//! physically displaced along the row, so each channel gets its own phase.

use crate::calibration::CalibrationParameters;

/// Color sub-channel of an RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Byte index of the channel inside an RGB triple
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    /// Phase offset of this channel's color filter
    #[inline]
    pub fn phase_offset(self, calib: &CalibrationParameters) -> f64 {
        self.index() as f64 * calib.subpixel_offset()
    }
}

/// Lenticular phase at normalized screen position `(u, v)`
///
/// `v` grows downward, so `1 - v` is the height above the bottom edge.
#[inline]
pub fn lenticular_phase(u: f64, v: f64, channel_offset: f64, calib: &CalibrationParameters) -> f64 {
    (u + (1.0 - v) * calib.tilt()) * calib.pitch() - calib.center() + channel_offset
}

/// Map a phase to a view index in `[0, view_count)`
///
/// Phase 0 shows the highest view. Boundaries are half-open: a phase landing
/// exactly on a step belongs to the lower view index.
#[inline]
pub fn view_for_phase(a: f64, view_count: usize) -> usize {
    debug_assert!(view_count > 0);
    let scaled = a.rem_euclid(1.0) * view_count as f64;
    // rem_euclid rounds to exactly 1.0 for tiny negative phases
    let step = (scaled.floor() as usize).min(view_count - 1);
    (view_count - 1) - step
}

/// Resolve the view visible at `(u, v)` for one channel offset
#[inline]
pub fn resolve_view(
    u: f64,
    v: f64,
    channel_offset: f64,
    calib: &CalibrationParameters,
    view_count: usize,
) -> usize {
    view_for_phase(lenticular_phase(u, v, channel_offset, calib), view_count)
}
