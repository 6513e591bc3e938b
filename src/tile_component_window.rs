//! Coordinate manager for one tile-component (SPEC_FULL §4.11).
//!
//! Ground truth for the coordinate math is Annex B.12 equation (B-15); the
//! `ceil_div_pow2` helper matches the teacher's `opj_int_ceildivpow2`
//! (`openjp2.rs`'s integer-math helpers), including its handling of a
//! negative numerator via an arithmetic right shift rather than a branch.

use crate::inverse_dwt::WaveletTransform;
use crate::runtime::WindowRect;

/// The four sub-band orientations a resolution level above 0 is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BandOrientation {
    Ll,
    Hl,
    Lh,
    Hh,
}

impl BandOrientation {
    fn xob(self) -> i64 {
        matches!(self, BandOrientation::Hl | BandOrientation::Hh) as i64
    }

    fn yob(self) -> i64 {
        matches!(self, BandOrientation::Lh | BandOrientation::Hh) as i64
    }
}

/// `ceil(a / 2^b)`, matching the teacher's `opj_int_ceildivpow2`: an
/// arithmetic right shift correctly floors even when `a` is negative, so
/// adding `2^b - 1` first yields the ceiling in both cases.
fn ceil_div_pow2(a: i64, b: u32) -> i64 {
    (a + (1i64 << b) - 1) >> b
}

/// Tracks the canvas, tile-component, band, and buffer coordinate systems
/// for one tile-component across all of its resolution levels (SPEC_FULL
/// §4.11). Coordinates are tile-component-relative (i.e. already divided by
/// the component's subsampling factors), matching the inputs `CodingParams`
/// hands to `TileProcessor`.
#[derive(Debug, Clone)]
pub(crate) struct TileComponentWindow {
    tcx0: i64,
    tcy0: i64,
    tcx1: i64,
    tcy1: i64,
    num_decomps: u32,
    /// Canvas-coordinate decode window, if decoding is restricted to a
    /// region (SPEC_FULL §8.D); `None` means the full tile-component.
    decode_window: Option<WindowRect>,
}

impl TileComponentWindow {
    pub(crate) fn new(
        tcx0: u32,
        tcy0: u32,
        tcx1: u32,
        tcy1: u32,
        num_decomps: u32,
        decode_window: Option<WindowRect>,
    ) -> Self {
        TileComponentWindow {
            tcx0: tcx0 as i64,
            tcy0: tcy0 as i64,
            tcx1: tcx1 as i64,
            tcy1: tcy1 as i64,
            num_decomps,
            decode_window,
        }
    }

    /// The full tile-component window (equation for resolution level 0's
    /// ancestor, i.e. the un-decomposed extent).
    fn full_window(&self) -> WindowRect {
        WindowRect {
            x0: self.tcx0.max(0) as u32,
            y0: self.tcy0.max(0) as u32,
            x1: self.tcx1.max(0) as u32,
            y1: self.tcy1.max(0) as u32,
        }
    }

    /// The sample window of resolution `resno` (0 = the coarsest, LL-only
    /// level; `num_decomps` = full resolution), in tile-component
    /// coordinates.
    pub(crate) fn resolution_window(&self, resno: u32) -> WindowRect {
        let remaining = self.num_decomps.saturating_sub(resno);
        WindowRect {
            x0: ceil_div_pow2(self.tcx0, remaining).max(0) as u32,
            y0: ceil_div_pow2(self.tcy0, remaining).max(0) as u32,
            x1: ceil_div_pow2(self.tcx1, remaining).max(0) as u32,
            y1: ceil_div_pow2(self.tcy1, remaining).max(0) as u32,
        }
    }

    /// Equation (B-15): the coordinates of sub-band `orientation` at
    /// decomposition level `level` (1-indexed: level 1 is the band that, with
    /// the level-0 LL, makes up resolution 1). `getBandWindow(numDecomps=0,
    /// ..)` (i.e. `level == 0`, always `Ll`) is the invariant from
    /// SPEC_FULL §4.11: it returns the full tile-component window.
    pub(crate) fn band_window(&self, level: u32, orientation: BandOrientation) -> WindowRect {
        if level == 0 {
            debug_assert_eq!(orientation, BandOrientation::Ll);
            // The LL band at the coarsest level *is* resolution 0 (not the
            // un-decomposed tile-component extent, which only coincides with
            // it when num_decomps == 0).
            return self.resolution_window(0);
        }
        let nb = self.num_decomps - level;
        let shift = nb;
        let x0 = ceil_div_pow2(self.tcx0 - (orientation.xob() << shift), shift + 1);
        let x1 = ceil_div_pow2(self.tcx1 - (orientation.xob() << shift), shift + 1);
        let y0 = ceil_div_pow2(self.tcy0 - (orientation.yob() << shift), shift + 1);
        let y1 = ceil_div_pow2(self.tcy1 - (orientation.yob() << shift), shift + 1);
        WindowRect {
            x0: x0.max(0) as u32,
            y0: y0.max(0) as u32,
            x1: x1.max(0) as u32,
            y1: y1.max(0) as u32,
        }
    }

    /// The band window actually worth reconstructing when decoding is
    /// restricted to a region: `band_window` clipped to the caller's decode
    /// window (translated down through `level` decompositions) and padded by
    /// `2 * filter_pad` samples on every side, then re-clipped to the
    /// unpadded tile-component band extent (SPEC_FULL §4.11).
    pub(crate) fn padded_band_window(
        &self,
        level: u32,
        orientation: BandOrientation,
        transform: WaveletTransform,
    ) -> WindowRect {
        let natural = self.band_window(level, orientation);
        let Some(canvas_window) = self.decode_window else {
            return natural;
        };

        let remaining = self.num_decomps.saturating_sub(level);
        let pad = (2 * transform.filter_pad()) as i64;
        let wx0 = ceil_div_pow2(canvas_window.x0 as i64, remaining) - pad;
        let wy0 = ceil_div_pow2(canvas_window.y0 as i64, remaining) - pad;
        let wx1 = ceil_div_pow2(canvas_window.x1 as i64, remaining) + pad;
        let wy1 = ceil_div_pow2(canvas_window.y1 as i64, remaining) + pad;

        WindowRect {
            x0: wx0.max(natural.x0 as i64) as u32,
            y0: wy0.max(natural.y0 as i64) as u32,
            x1: wx1.min(natural.x1 as i64).max(natural.x0 as i64) as u32,
            y1: wy1.min(natural.y1 as i64).max(natural.y0 as i64) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(num_decomps: u32) -> TileComponentWindow {
        TileComponentWindow::new(0, 0, 64, 64, num_decomps, None)
    }

    #[test]
    fn zero_decomps_band_window_is_full_tilecomp_window() {
        let w = window(0);
        let band = w.band_window(0, BandOrientation::Ll);
        assert_eq!(band, w.full_window());
    }

    #[test]
    fn resolution_levels_halve_each_step() {
        let w = window(2);
        assert_eq!(w.resolution_window(0), WindowRect { x0: 0, y0: 0, x1: 16, y1: 16 });
        assert_eq!(w.resolution_window(1), WindowRect { x0: 0, y0: 0, x1: 32, y1: 32 });
        assert_eq!(w.resolution_window(2), WindowRect { x0: 0, y0: 0, x1: 64, y1: 64 });
    }

    #[test]
    fn level_one_bands_tile_the_resolution_one_window() {
        let w = window(1);
        let ll = w.band_window(0, BandOrientation::Ll);
        let hl = w.band_window(1, BandOrientation::Hl);
        let lh = w.band_window(1, BandOrientation::Lh);
        let hh = w.band_window(1, BandOrientation::Hh);
        assert_eq!(ll, WindowRect { x0: 0, y0: 0, x1: 32, y1: 32 });
        assert_eq!(hl, WindowRect { x0: 0, y0: 0, x1: 32, y1: 32 });
        assert_eq!(lh, WindowRect { x0: 0, y0: 0, x1: 32, y1: 32 });
        assert_eq!(hh, WindowRect { x0: 0, y0: 0, x1: 32, y1: 32 });
    }

    #[test]
    fn ceil_div_pow2_handles_negative_numerator() {
        assert_eq!(ceil_div_pow2(-3, 1), -1);
        assert_eq!(ceil_div_pow2(3, 1), 2);
        assert_eq!(ceil_div_pow2(0, 3), 0);
    }

    #[test]
    fn no_decode_window_means_padded_equals_natural() {
        let w = window(2);
        let natural = w.band_window(1, BandOrientation::Hl);
        let padded = w.padded_band_window(1, BandOrientation::Hl, WaveletTransform::Reversible53);
        assert_eq!(natural, padded);
    }
}
