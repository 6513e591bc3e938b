//! Inverse discrete wavelet transform (SPEC_FULL §4.9, Annex F of the
//! standard).
//!
//! Ground truth for the lifting-step shape and constants is Annex F
//! (equations F-5/F-6 for the reversible filter, Table F.4 for the
//! irreversible one). The pass structure operates directly on the
//! interleaved coefficient array, one parity at a time, rather than
//! deinterleaving into separate low/high vectors, following the same
//! direct-array lifting shape as `hayro-jpeg2000`'s `idwt.rs`. Boundary
//! samples are replicated from the nearest same-parity real sample, which is
//! the standard's periodic symmetric extension (equation F-4) specialised to
//! the single step of "out of range" that a ±1-neighbour lifting step can
//! ever need.

/// Which of the two standard filter pairs a tile-component uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaveletTransform {
    Reversible53,
    Irreversible97,
}

impl WaveletTransform {
    /// Windowed-reconstruction padding width (SPEC_FULL §4.11): 1 for the
    /// reversible filter, 2 for the irreversible one.
    pub(crate) fn filter_pad(self) -> usize {
        match self {
            WaveletTransform::Reversible53 => 1,
            WaveletTransform::Irreversible97 => 2,
        }
    }
}

/// A 2D grid of coefficients in double precision: integer-valued whenever
/// the owning tile-component is reversible, fractional otherwise. Kept as
/// `f64` end-to-end inside the transform for simplicity; callers round to
/// `i32` for reversible components and leave 9/7 output in floating point
/// until the final sample-clamping step.
pub(crate) struct Grid {
    pub(crate) samples: Vec<f64>,
    pub(crate) width: usize,
    pub(crate) height: usize,
}

/// Applies the inverse 5/3 or 9/7 filter to one grid in place, horizontal
/// pass first then vertical (SPEC_FULL §4.9 "horizontal pass first (threads
/// over rows), then vertical (threads over columns)").
pub(crate) fn filter_2d(grid: &mut Grid, transform: WaveletTransform) {
    if grid.width == 0 || grid.height == 0 {
        return;
    }
    filter_horizontal(grid, transform);
    filter_vertical(grid, transform);
}

/// The HOR_SR procedure (Annex F.3.4): every row is an independent 1D
/// problem.
fn filter_horizontal(grid: &mut Grid, transform: WaveletTransform) {
    let width = grid.width;
    let mut row = vec![0f64; width];
    for y in 0..grid.height {
        let base = y * width;
        row.copy_from_slice(&grid.samples[base..base + width]);
        filter_1d(&mut row, transform);
        grid.samples[base..base + width].copy_from_slice(&row);
    }
}

/// The VER_SR procedure (Annex F.3.5): every column is an independent 1D
/// problem.
fn filter_vertical(grid: &mut Grid, transform: WaveletTransform) {
    let (width, height) = (grid.width, grid.height);
    let mut col = vec![0f64; height];
    for x in 0..width {
        for y in 0..height {
            col[y] = grid.samples[y * width + x];
        }
        filter_1d(&mut col, transform);
        for y in 0..height {
            grid.samples[y * width + x] = col[y];
        }
    }
}

/// Reads `x[idx]`, replicating the nearest same-parity real sample when
/// `idx` is exactly one step out of range (the only case a ±1-neighbour
/// lifting step can ever produce). `idx` is relative to `x`, so `-1` and
/// `x.len()` are the only legal out-of-range values.
fn get(x: &[f64], idx: isize) -> f64 {
    if idx < 0 {
        x[(-idx) as usize]
    } else if idx as usize >= x.len() {
        x[2 * x.len() - 2 - idx as usize]
    } else {
        x[idx as usize]
    }
}

/// The 1D_SR procedure (Annex F.3.6), specialised to operate directly on the
/// interleaved array: low-pass coefficients at even indices, high-pass at
/// odd indices (SPEC_FULL §3.1 "coefficients interleaved LL-first").
fn filter_1d(x: &mut [f64], transform: WaveletTransform) {
    if x.len() < 2 {
        return;
    }
    match transform {
        WaveletTransform::Reversible53 => reversible_filter_53r(x),
        WaveletTransform::Irreversible97 => irreversible_filter_97i(x),
    }
}

/// Equations (F-5)/(F-6): undo the encoder's update step on even positions
/// first (it only ever read untouched odd neighbours), then undo the
/// predict step on odd positions (which now reads the just-reconstructed
/// even neighbours).
fn reversible_filter_53r(x: &mut [f64]) {
    let n = x.len() as isize;
    let mut i = 0;
    while i < n {
        x[i as usize] -= ((get(x, i - 1) + get(x, i + 1) + 2.0) / 4.0).floor();
        i += 2;
    }
    let mut i = 1;
    while i < n {
        x[i as usize] += ((get(x, i - 1) + get(x, i + 1)) / 2.0).floor();
        i += 2;
    }
}

/// Table F.4 constants, applied as the inverse of the forward (scale,
/// predict, update, predict, update) cascade: two lifting-constant pairs
/// undone in reverse order, then the two scaling passes.
fn irreversible_filter_97i(x: &mut [f64]) {
    const ALPHA: f64 = -1.586_134_3;
    const BETA: f64 = -0.052_980_117_6;
    const GAMMA: f64 = 0.882_911_075_5;
    const DELTA: f64 = 0.443_506_852;
    const KAPPA: f64 = 1.230_174_105;

    let n = x.len() as isize;

    // Undo the last forward update (on odd positions, ALPHA).
    let mut i = 1;
    while i < n {
        x[i as usize] -= ALPHA * (get(x, i - 1) + get(x, i + 1));
        i += 2;
    }
    // Undo the preceding predict (on even positions, BETA).
    let mut i = 0;
    while i < n {
        x[i as usize] -= BETA * (get(x, i - 1) + get(x, i + 1));
        i += 2;
    }
    // Undo the first update (on odd positions, GAMMA).
    let mut i = 1;
    while i < n {
        x[i as usize] -= GAMMA * (get(x, i - 1) + get(x, i + 1));
        i += 2;
    }
    // Undo the first predict (on even positions, DELTA).
    let mut i = 0;
    while i < n {
        x[i as usize] -= DELTA * (get(x, i - 1) + get(x, i + 1));
        i += 2;
    }
    // Undo the analysis scaling.
    let mut i = 0;
    while i < n {
        x[i as usize] *= 1.0 / KAPPA;
        i += 2;
    }
    let mut i = 1;
    while i < n {
        x[i as usize] *= KAPPA;
        i += 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_replication_mirrors_nearest_same_parity_sample() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(get(&x, -1), 2.0);
        assert_eq!(get(&x, 4), 3.0);
        assert_eq!(get(&x, 1), 2.0);
    }

    #[test]
    fn reversible_inverse_matches_hand_derived_forward() {
        // Forward 5/3 of a constant-4 signal of length 4 interleaves to
        // [s0, d0, s1, d1] = [4, 0, 4, 0] (see DESIGN.md for the derivation).
        let mut x = [4.0, 0.0, 4.0, 0.0];
        filter_1d(&mut x, WaveletTransform::Reversible53);
        for v in &x {
            assert!((v - 4.0).abs() < 1e-9, "expected 4.0, got {v}");
        }
    }

    #[test]
    fn reversible_handles_odd_length_rows() {
        // A single low-pass sample with no high-pass pair at all: must be a
        // no-op (nothing to undo).
        let mut x = [7.0];
        filter_1d(&mut x, WaveletTransform::Reversible53);
        assert_eq!(x, [7.0]);
    }

    #[test]
    fn irreversible_all_zero_input_stays_all_zero() {
        let mut x = [0.0; 6];
        filter_1d(&mut x, WaveletTransform::Irreversible97);
        assert_eq!(x, [0.0; 6]);
    }

    #[test]
    fn zero_sized_grid_is_a_no_op() {
        let mut grid = Grid {
            samples: vec![],
            width: 0,
            height: 0,
        };
        filter_2d(&mut grid, WaveletTransform::Reversible53);
        assert!(grid.samples.is_empty());
    }
}
