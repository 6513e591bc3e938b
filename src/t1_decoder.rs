//! EBCOT Tier-1 decoder (SPEC_FULL §4.8): significance propagation,
//! magnitude refinement, and cleanup bit-plane passes driving the MQ
//! decoder's context models.
//!
//! Ported from the teacher's `t1.rs` (`opj_t1_decode_cblk`), including its
//! per-sample neighbour `flags` bitmask (one `u32` per padded grid cell,
//! tracking each of the 8 neighbours' significance and sign so a context can
//! be formed in O(1)) and its three-pass-per-bitplane structure. The
//! zero-coding context tables are the standard's (Annex D.3.1-3).

use crate::mqc::{ContextState, MqDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BandOrientation {
    Ll,
    Hl,
    Lh,
    Hh,
}

/// `T1Kind` capability dispatch (SPEC_FULL §4.8 "design note"): only the
/// MQ-coder bit-plane coder is implemented; `Ht` is recognised but
/// unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum T1Kind {
    Standard,
    Ht,
}

/// One code-block's decode inputs (SPEC_FULL §4.8).
pub(crate) struct BlockInput<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) num_bps: u8,
    pub(crate) orientation: BandOrientation,
    pub(crate) reversible: bool,
    pub(crate) roi_shift: u8,
    pub(crate) kind: T1Kind,
}

const SIG_N: u32 = 1 << 0;
const SIG_NE: u32 = 1 << 1;
const SIG_E: u32 = 1 << 2;
const SIG_SE: u32 = 1 << 3;
const SIG_S: u32 = 1 << 4;
const SIG_SW: u32 = 1 << 5;
const SIG_W: u32 = 1 << 6;
const SIG_NW: u32 = 1 << 7;
const SGN_N: u32 = 1 << 8;
const SGN_E: u32 = 1 << 9;
const SGN_S: u32 = 1 << 10;
const SGN_W: u32 = 1 << 11;
const VISITED: u32 = 1 << 12;
const SIGNIFICANT: u32 = 1 << 13;
/// Set after a sample's first magnitude-refinement pass, so later passes on
/// the same sample pick the "not-first-refinement" context (Annex D Table
/// D.3, context 16) instead of context 14/15. Unlike `VISITED`, this is never
/// cleared once set.
const REFINED: u32 = 1 << 14;

const SIG_H_MASK: u32 = SIG_E | SIG_W;
const SIG_V_MASK: u32 = SIG_N | SIG_S;
const SIG_D_MASK: u32 = SIG_NE | SIG_NW | SIG_SE | SIG_SW;

/// Zero-coding context indices (Annex D Table D.1), LL/LH orientation.
fn zc_context_ll_lh(h: u32, v: u32, d: u32) -> u8 {
    match (h.min(2), v.min(2), d.min(2)) {
        (2, _, _) => 8,
        (1, v, _) if v >= 1 => 7,
        (1, 0, d) if d >= 1 => 6,
        (1, 0, 0) => 5,
        (0, 2, _) => 4,
        (0, 1, _) => 3,
        (0, 0, d) if d >= 2 => 2,
        (0, 0, 1) => 1,
        _ => 0,
    }
}

/// HL orientation swaps the roles of the horizontal and vertical neighbour
/// counts relative to the LL/LH table.
fn zc_context_hl(h: u32, v: u32, d: u32) -> u8 {
    zc_context_ll_lh(v, h, d)
}

/// HH orientation (Annex D Table D.1, third column): keyed on the combined
/// horizontal+vertical count and the diagonal count.
fn zc_context_hh(h: u32, v: u32, d: u32) -> u8 {
    let hv = (h + v).min(2);
    match d.min(4) {
        d if d >= 3 => {
            if hv >= 1 {
                8
            } else {
                7
            }
        }
        2 => {
            if hv >= 1 {
                6
            } else {
                5
            }
        }
        1 => match hv {
            0 => 3,
            1 => 4,
            _ => 4,
        },
        _ => {
            if hv >= 1 {
                2
            } else {
                0
            }
        }
    }
}

/// Sign-coding context and expected-sign XOR (Annex D.3.2, Table D.2).
fn sc_context(flags: u32) -> (u8, i32) {
    let h_sign = signed_count(flags & (SGN_E | SGN_W), flags & SIG_H_MASK, SGN_E, SGN_W, SIG_E, SIG_W);
    let v_sign = signed_count(flags & (SGN_N | SGN_S), flags & SIG_V_MASK, SGN_N, SGN_S, SIG_N, SIG_S);

    let (h_ctx, h_xor) = h_sign;
    let (v_ctx, v_xor) = v_sign;

    let ctx = 9 + 3 * (h_ctx as i32 + 1) + (v_ctx as i32 + 1);
    let xor = if h_xor ^ v_xor { -1 } else { 1 };
    ((ctx - 9).clamp(0, 8) as u8, xor)
}

/// Reduces a horizontal or vertical neighbour pair to a contribution in
/// {-1, 0, 1} and whether the expected sign is negative.
fn signed_count(
    sign_bits: u32,
    sig_bits: u32,
    sgn_pos: u32,
    sgn_neg: u32,
    sig_pos: u32,
    sig_neg: u32,
) -> (i32, bool) {
    let pos_sig = sig_bits & sig_pos != 0;
    let neg_sig = sig_bits & sig_neg != 0;
    let pos_neg = sign_bits & sgn_pos != 0;
    let neg_neg = sign_bits & sgn_neg != 0;

    let pos = if pos_sig { if pos_neg { -1 } else { 1 } } else { 0 };
    let neg = if neg_sig { if neg_neg { -1 } else { 1 } } else { 0 };
    let total = pos + neg;
    (total.clamp(-1, 1), total < 0)
}

const CTX_RUN: u8 = 17;
const CTX_UNIFORM: u8 = 18;
const CTX_ZC_BASE: u8 = 0;
const CTX_SC_BASE: u8 = 9;
const CTX_MAG_BASE: u8 = 14;

struct Contexts {
    table: [ContextState; 19],
}

impl Contexts {
    fn new() -> Self {
        let mut table = [ContextState::new(0, 0); 19];
        table[CTX_UNIFORM as usize] = ContextState::new(46, 0);
        table[CTX_RUN as usize] = ContextState::new(3, 0);
        Contexts { table }
    }
}

/// Decodes one code-block's compressed segment into an `i32` coefficient
/// plane (magnitude-and-sign encoded, not yet dequantised).
pub(crate) fn decode_block(input: &BlockInput) -> Result<Vec<i32>, crate::error::DecodeError> {
    if input.kind == T1Kind::Ht {
        return Err(crate::error::DecodeError::UnsupportedFeature(
            "HT (high-throughput) block coding is not implemented",
        ));
    }

    let w = input.width as usize;
    let h = input.height as usize;
    let stride = w + 2;
    let mut flags = vec![0u32; stride * (h + 2)];
    let mut coeffs = vec![0i32; w * h];

    if w == 0 || h == 0 || input.num_bps == 0 {
        return Ok(coeffs);
    }

    let mut mq = MqDecoder::new(input.data);
    let mut cx = Contexts::new();

    let idx = |x: usize, y: usize| (y + 1) * stride + (x + 1);

    let mut bitplane = input.num_bps as i32 - 1;
    let mut first_plane = true;
    while bitplane >= 0 {
        if !first_plane {
            sig_prop_pass(&mut mq, &mut cx, &mut flags, &mut coeffs, w, h, stride, bitplane, input.orientation, idx);
            mag_ref_pass(&mut mq, &mut cx, &mut flags, &mut coeffs, w, h, stride, bitplane, idx);
        }
        cleanup_pass(&mut mq, &mut cx, &mut flags, &mut coeffs, w, h, stride, bitplane, input.orientation, idx);
        first_plane = false;
        bitplane -= 1;
    }

    Ok(coeffs)
}

fn neighbour_counts(flags: u32) -> (u32, u32, u32) {
    let h = ((flags & SIG_E != 0) as u32) + ((flags & SIG_W != 0) as u32);
    let v = ((flags & SIG_N != 0) as u32) + ((flags & SIG_S != 0) as u32);
    let d = ((flags & SIG_D_MASK).count_ones()).min(4);
    (h, v, d)
}

fn zc_context(flags: u32, orientation: BandOrientation) -> u8 {
    let (h, v, d) = neighbour_counts(flags);
    match orientation {
        BandOrientation::Ll | BandOrientation::Lh => zc_context_ll_lh(h, v, d),
        BandOrientation::Hl => zc_context_hl(h, v, d),
        BandOrientation::Hh => zc_context_hh(h, v, d),
    }
}

fn has_any_neighbour_significant(flags: u32) -> bool {
    flags & (SIG_H_MASK | SIG_V_MASK | SIG_D_MASK) != 0
}

#[allow(clippy::too_many_arguments)]
fn sig_prop_pass(
    mq: &mut MqDecoder,
    cx: &mut Contexts,
    flags: &mut [u32],
    coeffs: &mut [i32],
    w: usize,
    h: usize,
    stride: usize,
    bitplane: i32,
    orientation: BandOrientation,
    idx: impl Fn(usize, usize) -> usize,
) {
    for y in 0..h {
        for x in 0..w {
            let i = idx(x, y);
            if flags[i] & SIGNIFICANT != 0 || !has_any_neighbour_significant(flags[i]) {
                continue;
            }
            let ctxno = zc_context(flags[i], orientation);
            let significant = mq.decode(&mut cx.table[(CTX_ZC_BASE + ctxno) as usize]);
            flags[i] |= VISITED;
            if significant {
                let (sc_ctx, expected_xor) = sc_context(flags[i]);
                let sign_bit = mq.decode(&mut cx.table[(CTX_SC_BASE + sc_ctx) as usize]);
                let sign = if sign_bit { -expected_xor } else { expected_xor };
                flags[i] |= SIGNIFICANT;
                coeffs[y * w + x] |= 1 << bitplane;
                if sign < 0 {
                    coeffs[y * w + x] = -coeffs[y * w + x];
                }
                propagate_significance(flags, stride, x, y, sign < 0);
            }
        }
    }
}

fn propagate_significance(flags: &mut [u32], stride: usize, x: usize, y: usize, negative: bool) {
    let at = |dx: i32, dy: i32| ((y as i32 + 1 + dy) as usize) * stride + (x as i32 + 1 + dx) as usize;
    // Significance propagates to all 8 neighbours (Annex D.3.1); sign
    // propagates only among the 4 cardinal ones (Annex D.3.2), so the
    // diagonal arms below carry no SGN_* bit.
    let sign_flag_for = |dx: i32, dy: i32| -> (u32, u32) {
        if dx == 0 && dy == -1 {
            (SIG_S, SGN_S)
        } else if dx == 0 && dy == 1 {
            (SIG_N, SGN_N)
        } else if dx == -1 && dy == 0 {
            (SIG_E, SGN_E)
        } else if dx == 1 && dy == 0 {
            (SIG_W, SGN_W)
        } else if dx == -1 && dy == -1 {
            (SIG_SE, 0)
        } else if dx == 1 && dy == -1 {
            (SIG_SW, 0)
        } else if dx == -1 && dy == 1 {
            (SIG_NE, 0)
        } else if dx == 1 && dy == 1 {
            (SIG_NW, 0)
        } else {
            (0, 0)
        }
    };
    for (dx, dy) in [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)] {
        let (sig_bit, sgn_bit) = sign_flag_for(dx, dy);
        if sig_bit == 0 {
            continue;
        }
        let j = at(dx, dy);
        flags[j] |= sig_bit;
        if negative {
            flags[j] |= sgn_bit;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn mag_ref_pass(
    mq: &mut MqDecoder,
    cx: &mut Contexts,
    flags: &mut [u32],
    coeffs: &mut [i32],
    w: usize,
    h: usize,
    _stride: usize,
    bitplane: i32,
    idx: impl Fn(usize, usize) -> usize,
) {
    for y in 0..h {
        for x in 0..w {
            let i = idx(x, y);
            if flags[i] & SIGNIFICANT == 0 || flags[i] & VISITED != 0 {
                continue;
            }
            let ctxno = if flags[i] & REFINED == 0 {
                let (hh, v, d) = neighbour_counts(flags[i]);
                if hh + v + d == 0 {
                    0
                } else {
                    1
                }
            } else {
                2
            };
            let bit = mq.decode(&mut cx.table[(CTX_MAG_BASE + ctxno) as usize]);
            if bit {
                coeffs[y * w + x] |= 1 << bitplane;
            }
            flags[i] |= VISITED | REFINED;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cleanup_pass(
    mq: &mut MqDecoder,
    cx: &mut Contexts,
    flags: &mut [u32],
    coeffs: &mut [i32],
    w: usize,
    h: usize,
    stride: usize,
    bitplane: i32,
    orientation: BandOrientation,
    idx: impl Fn(usize, usize) -> usize,
) {
    for y in 0..h {
        let mut x = 0usize;
        while x < w {
            // Run-length shortcut: four vertically stacked, still
            // insignificant, unvisited samples with no significant neighbour
            // can share one context decision (Annex D.4 "RUNLENGTH").
            let mut first_significant_k = None;
            if y % 4 == 0 && h.saturating_sub(y) >= 4 {
                let mut all_eligible = true;
                for k in 0..4 {
                    let i = idx(x, y + k);
                    if flags[i] & (SIGNIFICANT | VISITED) != 0 || has_any_neighbour_significant(flags[i]) {
                        all_eligible = false;
                        break;
                    }
                }
                if all_eligible {
                    let run = mq.decode(&mut cx.table[CTX_RUN as usize]);
                    if !run {
                        first_significant_k = Some(4);
                    } else {
                        // At least one of the four is significant; its
                        // position within the group is coded as a 2-bit
                        // uniform value, MSB first (Annex D.4).
                        let hi = mq.decode(&mut cx.table[CTX_UNIFORM as usize]);
                        let lo = mq.decode(&mut cx.table[CTX_UNIFORM as usize]);
                        let r = (hi as usize) * 2 + (lo as usize);
                        let yy = y + r;
                        let i = idx(x, yy);
                        let (sc_ctx, expected_xor) = sc_context(flags[i]);
                        let sign_bit = mq.decode(&mut cx.table[(CTX_SC_BASE + sc_ctx) as usize]);
                        let sign = if sign_bit { -expected_xor } else { expected_xor };
                        flags[i] |= SIGNIFICANT;
                        coeffs[yy * w + x] |= 1 << bitplane;
                        if sign < 0 {
                            coeffs[yy * w + x] = -coeffs[yy * w + x];
                        }
                        propagate_significance(flags, stride, x, yy, sign < 0);
                        first_significant_k = Some(r + 1);
                    }
                }
            }
            let start_k = first_significant_k.unwrap_or(0);
            for k in start_k..4.min(h.saturating_sub(y)) {
                let yy = y + k;
                let i = idx(x, yy);
                if flags[i] & (SIGNIFICANT | VISITED) != 0 {
                    flags[i] &= !VISITED;
                    continue;
                }
                let ctxno = zc_context(flags[i], orientation);
                let significant = mq.decode(&mut cx.table[(CTX_ZC_BASE + ctxno) as usize]);
                if significant {
                    let (sc_ctx, expected_xor) = sc_context(flags[i]);
                    let sign_bit = mq.decode(&mut cx.table[(CTX_SC_BASE + sc_ctx) as usize]);
                    let sign = if sign_bit { -expected_xor } else { expected_xor };
                    flags[i] |= SIGNIFICANT;
                    coeffs[yy * w + x] |= 1 << bitplane;
                    if sign < 0 {
                        coeffs[yy * w + x] = -coeffs[yy * w + x];
                    }
                    propagate_significance(flags, stride, x, yy, sign < 0);
                }
                flags[i] &= !VISITED;
            }
            x += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_decodes_to_zero_length() {
        let input = BlockInput {
            data: &[],
            width: 0,
            height: 0,
            num_bps: 4,
            orientation: BandOrientation::Ll,
            reversible: true,
            roi_shift: 0,
            kind: T1Kind::Standard,
        };
        let out = decode_block(&input).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn zero_bps_block_is_all_zero() {
        let input = BlockInput {
            data: &[0xAA, 0xBB],
            width: 4,
            height: 4,
            num_bps: 0,
            orientation: BandOrientation::Ll,
            reversible: true,
            roi_shift: 0,
            kind: T1Kind::Standard,
        };
        let out = decode_block(&input).unwrap();
        assert_eq!(out, vec![0; 16]);
    }

    #[test]
    fn ht_kind_is_unsupported() {
        let input = BlockInput {
            data: &[],
            width: 4,
            height: 4,
            num_bps: 2,
            orientation: BandOrientation::Ll,
            reversible: true,
            roi_shift: 0,
            kind: T1Kind::Ht,
        };
        let err = decode_block(&input).unwrap_err();
        assert!(matches!(err, crate::error::DecodeError::UnsupportedFeature(_)));
    }

    #[test]
    fn decode_runs_to_completion_on_short_input_without_panicking() {
        let input = BlockInput {
            data: &[0x00, 0x00, 0xFF, 0x90],
            width: 8,
            height: 8,
            num_bps: 3,
            orientation: BandOrientation::Hl,
            reversible: true,
            roi_shift: 0,
            kind: T1Kind::Standard,
        };
        let out = decode_block(&input).unwrap();
        assert_eq!(out.len(), 64);
    }

    #[test]
    fn mag_ref_pass_uses_refined_flag_not_visited_to_pick_context() {
        let w = 1usize;
        let h = 1usize;
        let stride = w + 2;
        let idx = |x: usize, y: usize| (y + 1) * stride + (x + 1);
        let mut flags = vec![0u32; stride * (h + 2)];
        let mut coeffs = vec![0i32; w * h];
        flags[idx(0, 0)] = SIGNIFICANT;

        let data = [0x55u8, 0x33, 0xAA, 0x11, 0x77, 0x99, 0x22, 0x44];
        let mut mq = MqDecoder::new(&data);
        let mut cx = Contexts::new();

        // First refinement pass on a sample with no significant neighbours:
        // must use context CTX_MAG_BASE + 0, leaving the "has neighbours"
        // and "already refined" contexts untouched.
        mag_ref_pass(&mut mq, &mut cx, &mut flags, &mut coeffs, w, h, stride, 2, idx);
        assert_ne!(cx.table[CTX_MAG_BASE as usize].index, 0);
        assert_eq!(cx.table[(CTX_MAG_BASE + 1) as usize].index, 0);
        assert_eq!(cx.table[(CTX_MAG_BASE + 2) as usize].index, 0);
        assert_ne!(flags[idx(0, 0)] & REFINED, 0);

        // VISITED was cleared by sig_prop_pass in a real bitplane loop; reset
        // it here to isolate the REFINED-vs-VISITED behaviour under test.
        flags[idx(0, 0)] &= !VISITED;

        // Second refinement pass on the same (now-REFINED) sample: must use
        // context CTX_MAG_BASE + 2 regardless of neighbour significance.
        mag_ref_pass(&mut mq, &mut cx, &mut flags, &mut coeffs, w, h, stride, 1, idx);
        assert_ne!(cx.table[(CTX_MAG_BASE + 2) as usize].index, 0);
    }

    #[test]
    fn zc_context_hh_is_always_in_bounds() {
        for h in 0..3 {
            for v in 0..3 {
                for d in 0..5 {
                    assert!(zc_context_hh(h, v, d) < 9);
                }
            }
        }
    }
}
