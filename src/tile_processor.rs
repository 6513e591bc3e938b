//! Per-tile decode orchestration (SPEC_FULL §4.5): T2 packet parsing, T1
//! scheduling, inverse DWT, and the multi-component inverse transform with
//! DC level shift.
//!
//! Grounded on the teacher's `opj_tcd_decode_tile` (`tcd.rs`), which runs
//! `opj_tcd_t2_decode` -> `opj_tcd_t1_decode` -> `opj_tcd_dwt_decode` ->
//! `opj_tcd_mct_decode` -> `opj_tcd_dc_level_shift_decode` in sequence for
//! one tile. This module keeps that five-stage shape but threads owned
//! buffers through it instead of the teacher's `opj_tcd_tilecomp_t` arena of
//! raw pointers, and (unlike the teacher) parses every packet of the tile up
//! front into in-memory code-block state before running T1, rather than
//! interleaving T2 and T1 resolution by resolution.

use crate::coding_params::{CodingParams, StepSize, Tcp};
use crate::error::{DecodeError, Result};
use crate::inverse_dwt::{filter_2d, Grid, WaveletTransform};
use crate::mct;
use crate::packet_length_index::GlobalPacketLengthIndex;
use crate::runtime::Runtime;
use crate::t1_decoder::{BandOrientation as T1Band, BlockInput, T1Kind};
use crate::t1_scheduler::{run_all, DecompressBlockExec};
use crate::t2::{
    decode_packet_header_multi, BandHeaderGroup, ComponentGeometry, PacketIter, PrecinctTagTrees,
};
use crate::tag_tree::TagTree;
use crate::tile_component_window::{BandOrientation as GeomBand, TileComponentWindow};

/// One component's reconstructed pixels for one tile, in canvas (component)
/// coordinates, ready to be copied into the caller's [`crate::image::SamplePlane`].
pub(crate) struct TileComponentResult {
    pub(crate) comp_index: usize,
    pub(crate) x0: u32,
    pub(crate) y0: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) samples: Vec<i32>,
}

struct CodeBlock {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    included: bool,
    zero_bitplanes: u8,
    num_passes: u32,
    data: Vec<u8>,
}

impl CodeBlock {
    fn width(&self) -> u32 {
        self.x1 - self.x0
    }
    fn height(&self) -> u32 {
        self.y1 - self.y0
    }
}

struct PrecinctBucket {
    blocks: Vec<CodeBlock>,
    trees: PrecinctTagTrees,
    known_included: Vec<bool>,
}

struct BandState {
    orientation: GeomBand,
    window: crate::runtime::WindowRect,
    precincts: Vec<PrecinctBucket>,
}

struct ResolutionState {
    bands: Vec<BandState>,
    precinct_count: (u32, u32),
}

struct TileComponentState {
    window: TileComponentWindow,
    resolutions: Vec<ResolutionState>,
}

/// `ceil(value / 2^exp)`, anchored at absolute coordinate 0 (equation B.6 of
/// the standard), used to locate the precinct grid covering a resolution.
fn precinct_grid_dims(
    window: crate::runtime::WindowRect,
    ppx: u8,
    ppy: u8,
) -> (u32, u32, u32, u32) {
    if window.x1 <= window.x0 || window.y1 <= window.y0 {
        return (0, 0, 0, 0);
    }
    let px0 = window.x0 >> ppx;
    let py0 = window.y0 >> ppy;
    let px1 = (window.x1 + (1u32 << ppx) - 1) >> ppx;
    let py1 = (window.y1 + (1u32 << ppy) - 1) >> ppy;
    (px0, py0, px1.saturating_sub(px0), py1.saturating_sub(py0))
}

/// Splits one band's window into code-blocks anchored at absolute multiples
/// of `(2^cblk_w_exp, 2^cblk_h_exp)` (standard B.7), then buckets each block
/// into the precinct it falls under. Returns one `Vec<CodeBlock>` per
/// precinct, in raster order within each precinct.
#[allow(clippy::too_many_arguments)]
fn partition_band_into_blocks(
    band_window: crate::runtime::WindowRect,
    cblk_w_exp: u8,
    cblk_h_exp: u8,
    ppx: u8,
    ppy: u8,
    precinct_count: (u32, u32),
    precinct_start: (u32, u32),
) -> Vec<Vec<CodeBlock>> {
    let (pdx, pdy) = precinct_count;
    let (px0, py0) = precinct_start;
    let total = (pdx as usize) * (pdy as usize);
    let mut buckets: Vec<Vec<CodeBlock>> = (0..total).map(|_| Vec::new()).collect();
    if total == 0 || band_window.x1 <= band_window.x0 || band_window.y1 <= band_window.y0 {
        return buckets;
    }

    let cbw = 1u32 << cblk_w_exp;
    let cbh = 1u32 << cblk_h_exp;
    let gx0 = band_window.x0 / cbw;
    let gx1 = band_window.x1.div_ceil(cbw);
    let gy0 = band_window.y0 / cbh;
    let gy1 = band_window.y1.div_ceil(cbh);

    for gy in gy0..gy1 {
        for gx in gx0..gx1 {
            let bx0 = (gx * cbw).max(band_window.x0);
            let bx1 = ((gx + 1) * cbw).min(band_window.x1);
            let by0 = (gy * cbh).max(band_window.y0);
            let by1 = ((gy + 1) * cbh).min(band_window.y1);
            if bx1 <= bx0 || by1 <= by0 {
                continue;
            }
            let pcol = (bx0 >> ppx).saturating_sub(px0);
            let prow = (by0 >> ppy).saturating_sub(py0);
            if pcol >= pdx || prow >= pdy {
                continue;
            }
            let pidx = (prow * pdx + pcol) as usize;
            buckets[pidx].push(CodeBlock {
                x0: bx0,
                y0: by0,
                x1: bx1,
                y1: by1,
                included: false,
                zero_bitplanes: 0,
                num_passes: 0,
                data: Vec::new(),
            });
        }
    }
    buckets
}

fn build_tile_component(
    tccp: &crate::coding_params::Tccp,
    tcx0: u32,
    tcy0: u32,
    tcx1: u32,
    tcy1: u32,
) -> TileComponentState {
    let num_decomps = (tccp.num_resolutions as u32).saturating_sub(1);
    let window = TileComponentWindow::new(tcx0, tcy0, tcx1, tcy1, num_decomps, None);

    let mut resolutions = Vec::with_capacity(tccp.num_resolutions as usize);
    for resno in 0..tccp.num_resolutions {
        let level = resno as u32;
        let (ppx, ppy) = tccp.precinct_sizes.get(resno as usize).copied().unwrap_or((15, 15));
        let res_window = window.resolution_window(level);
        let (px0, py0, pdx, pdy) = precinct_grid_dims(res_window, ppx, ppy);

        let orientations: &[GeomBand] = if resno == 0 {
            &[GeomBand::Ll]
        } else {
            &[GeomBand::Hl, GeomBand::Lh, GeomBand::Hh]
        };

        let mut bands = Vec::with_capacity(orientations.len());
        for &orientation in orientations {
            let band_window = window.band_window(level, orientation);
            let buckets = partition_band_into_blocks(
                band_window,
                tccp.cblk_w_exp,
                tccp.cblk_h_exp,
                ppx,
                ppy,
                (pdx, pdy),
                (px0, py0),
            );
            let precincts = buckets
                .into_iter()
                .map(|blocks| {
                    let n = blocks.len() as u32;
                    PrecinctBucket {
                        known_included: vec![false; blocks.len()],
                        trees: PrecinctTagTrees {
                            inclusion: TagTree::new(n, 1),
                            zero_bitplane: TagTree::new(n, 1),
                        },
                        blocks,
                    }
                })
                .collect();
            bands.push(BandState {
                orientation,
                window: band_window,
                precincts,
            });
        }

        resolutions.push(ResolutionState {
            bands,
            precinct_count: (pdx, pdy),
        });
    }

    TileComponentState { window, resolutions }
}

fn to_t1_band(b: GeomBand) -> T1Band {
    match b {
        GeomBand::Ll => T1Band::Ll,
        GeomBand::Hl => T1Band::Hl,
        GeomBand::Lh => T1Band::Lh,
        GeomBand::Hh => T1Band::Hh,
    }
}

/// QCD/QCC step-size array index for a band at decomposition `level`
/// (SPEC_FULL §4.2 table ordering: LL, then HL/LH/HH per level ascending).
fn step_index_for(level: u32, orientation: GeomBand) -> usize {
    if level == 0 {
        0
    } else {
        let base = 1 + 3 * (level as usize - 1);
        base + match orientation {
            GeomBand::Hl => 0,
            GeomBand::Lh => 1,
            GeomBand::Hh => 2,
            GeomBand::Ll => unreachable!("LL only occurs at level 0"),
        }
    }
}

/// Equation (E-3): dequantises a Tier-1 coefficient plane. Reversible (5/3)
/// components need no scaling; the bit-plane-coded integer already is the
/// coefficient. Irreversible (9/7) components are scaled by the band's
/// floating-point step size, `2^(Rb-expn) * (1 + mant/2^11)`, with the
/// per-orientation gain bits folded into `Rb` (LL 0, HL/LH 1, HH 2).
fn dequantize(coeffs: &[i32], reversible: bool, step: StepSize, precision: u8, orientation: GeomBand) -> Vec<f64> {
    if reversible {
        return coeffs.iter().map(|&v| v as f64).collect();
    }
    let gain_bits = match orientation {
        GeomBand::Ll => 0,
        GeomBand::Hl | GeomBand::Lh => 1,
        GeomBand::Hh => 2,
    };
    let r_b = precision as i32 + gain_bits;
    let delta = 2f64.powi(r_b - step.expn as i32) * (1.0 + step.mant as f64 / 2048.0);
    coeffs.iter().map(|&v| v as f64 * delta).collect()
}

/// Scatters a band's sub-sampled coefficients into the interleaved grid for
/// the next-higher resolution level, per the inverse of equation (B-15):
/// `x = 2*bx + xob`, `y = 2*by + yob`.
#[allow(clippy::too_many_arguments)]
fn place_into_grid(
    grid: &mut Grid,
    grid_window: crate::runtime::WindowRect,
    src_abs_x0: u32,
    src_abs_y0: u32,
    xob: i64,
    yob: i64,
    w: usize,
    h: usize,
    src: &[f64],
    src_stride: usize,
) {
    for j in 0..h {
        for i in 0..w {
            let gx = 2 * (src_abs_x0 as i64 + i as i64) + xob - grid_window.x0 as i64;
            let gy = 2 * (src_abs_y0 as i64 + j as i64) + yob - grid_window.y0 as i64;
            if gx < 0 || gy < 0 {
                continue;
            }
            let (gx, gy) = (gx as usize, gy as usize);
            if gx >= grid.width || gy >= grid.height {
                continue;
            }
            grid.samples[gy * grid.width + gx] = src[j * src_stride + i];
        }
    }
}

fn clamp_to_precision(value: i32, precision: u8, signed: bool) -> i32 {
    if signed {
        let max = (1i64 << (precision as i64 - 1)) - 1;
        let min = -(1i64 << (precision as i64 - 1));
        value.clamp(min as i32, max as i32)
    } else {
        let max = (1i64 << precision as i64) - 1;
        value.clamp(0, max as i32)
    }
}

/// `decompressT2` + `scheduleT1` + `inverseDWT` + `inverseMCTAndShift`
/// (SPEC_FULL §4.5) for one tile: decodes every packet, Tier-1 block, and
/// synthesises each component's spatial samples, applying the tile's
/// multi-component transform and DC level shift last.
pub(crate) fn process_tile(
    tile_index: u16,
    params: &CodingParams,
    plt_index: &mut GlobalPacketLengthIndex,
    runtime: &Runtime,
) -> Result<Vec<TileComponentResult>> {
    let tcp: &Tcp = &params.tcps[tile_index as usize];
    let grid_w = params.tile_grid_width();
    let px = tile_index as u32 % grid_w;
    let py = tile_index as u32 / grid_w;
    let tx0 = (params.tx0 + px * params.tdx).max(params.x0);
    let ty0 = (params.ty0 + py * params.tdy).max(params.y0);
    let tx1 = (params.tx0 + (px + 1) * params.tdx).min(params.x1);
    let ty1 = (params.ty0 + (py + 1) * params.tdy).min(params.y1);

    let mut tile_states: Vec<TileComponentState> = Vec::with_capacity(params.components.len());
    let mut comp_geoms: Vec<ComponentGeometry> = Vec::with_capacity(params.components.len());
    for (ci, comp) in params.components.iter().enumerate() {
        let tccp = &tcp.tccps[ci];
        let dx = comp.dx as u32;
        let dy = comp.dy as u32;
        let tcx0 = tx0.div_ceil(dx);
        let tcy0 = ty0.div_ceil(dy);
        let tcx1 = tx1.div_ceil(dx);
        let tcy1 = ty1.div_ceil(dy);
        let state = build_tile_component(tccp, tcx0, tcy0, tcx1, tcy1);
        comp_geoms.push(ComponentGeometry {
            num_resolutions: tccp.num_resolutions,
            precinct_grid: state.resolutions.iter().map(|r| r.precinct_count).collect(),
        });
        tile_states.push(state);
    }

    decompress_t2(tile_index, tcp, plt_index, &comp_geoms, &mut tile_states)?;

    let mut recon: Vec<Vec<f64>> = Vec::with_capacity(params.components.len());
    let mut final_windows = Vec::with_capacity(params.components.len());
    for (ci, comp) in params.components.iter().enumerate() {
        let tccp = &tcp.tccps[ci];
        let reduce = runtime.options.reduce_resolutions as u32;
        let num_decomps_full = (tccp.num_resolutions as u32).saturating_sub(1);
        let num_decomps_used = num_decomps_full.saturating_sub(reduce);
        let transform = if tccp.reversible {
            WaveletTransform::Reversible53
        } else {
            WaveletTransform::Irreversible97
        };

        let (samples, window) =
            synthesize_component(&tile_states[ci], tccp, comp.precision, num_decomps_used, transform, runtime)?;
        recon.push(samples);
        final_windows.push(window);
    }

    apply_mct(tcp, &params.components, &mut recon);

    let mut results = Vec::with_capacity(params.components.len());
    for (ci, comp) in params.components.iter().enumerate() {
        let window = final_windows[ci];
        let mut samples: Vec<i32> = recon[ci].iter().map(|v| v.round() as i32).collect();
        mct::dc_level_shift(&mut samples, comp.precision, comp.signed);
        for s in samples.iter_mut() {
            *s = clamp_to_precision(*s, comp.precision, comp.signed);
        }
        results.push(TileComponentResult {
            comp_index: ci,
            x0: window.x0,
            y0: window.y0,
            width: window.width(),
            height: window.height(),
            samples,
        });
    }

    Ok(results)
}

/// `decompressT2` (SPEC_FULL §4.6): walks every packet of the tile in
/// progression order (or one `PacketIter` per POC entry, applied in
/// declaration order), decoding packet headers and distributing compressed
/// body bytes to the code-blocks they cover.
fn decompress_t2(
    tile_index: u16,
    tcp: &Tcp,
    plt_index: &mut GlobalPacketLengthIndex,
    comp_geoms: &[ComponentGeometry],
    tile_states: &mut [TileComponentState],
) -> Result<()> {
    let headers_merged = !tcp.packet_headers.is_empty();
    let tile_part = &tcp.tile_part_data[..];
    let mut header_cursor = 0usize;
    let mut body_cursor = 0usize;
    let plt = plt_index.tile_index_mut(tile_index);

    let mut segments: Vec<PacketIter> = if tcp.poc.is_empty() {
        vec![PacketIter::new(comp_geoms, tcp.progression, tcp.num_layers)]
    } else {
        tcp.poc.iter().map(|entry| PacketIter::from_poc(comp_geoms, entry)).collect()
    };

    for iter in segments.iter_mut() {
        while let Some(coord) = iter.next() {
            let res = &mut tile_states[coord.compno as usize].resolutions[coord.resno as usize];
            let band_count = res.bands.len();
            if band_count == 0 {
                continue;
            }

            let header_src: &[u8] = if headers_merged { &tcp.packet_headers[..] } else { tile_part };
            if header_cursor > header_src.len() {
                return Err(DecodeError::truncated(header_cursor, "packet header cursor ran past its stream"));
            }

            let mut band_groups: Vec<BandHeaderGroup> = Vec::with_capacity(band_count);
            for band in res.bands.iter_mut() {
                let precinct_idx = coord.precinct_index as usize;
                if precinct_idx >= band.precincts.len() {
                    continue;
                }
                let precinct = &mut band.precincts[precinct_idx];
                band_groups.push(BandHeaderGroup {
                    num_blocks: precinct.blocks.len(),
                    trees: &mut precinct.trees,
                    block_known_included: &mut precinct.known_included,
                });
            }
            if band_groups.is_empty() {
                continue;
            }

            let (consumed, per_band_updates) =
                decode_packet_header_multi(&header_src[header_cursor..], coord.layno, &mut band_groups)?;

            let body_start = if headers_merged {
                body_cursor
            } else {
                header_cursor + consumed
            };
            let plt_len = plt.pop_next_packet_length();
            let computed_len: u32 = per_band_updates
                .iter()
                .flatten()
                .map(|u| u.segment_length)
                .sum();
            let packet_body_len = if plt_len > 0 { plt_len } else { computed_len } as usize;
            let body_end = (body_start + packet_body_len).min(tile_part.len());
            let body = &tile_part[body_start.min(tile_part.len())..body_end];

            if headers_merged {
                header_cursor += consumed;
                body_cursor = body_end;
            } else {
                header_cursor = body_end;
            }

            let mut offset = 0usize;
            for (band_idx, updates) in per_band_updates.iter().enumerate() {
                let precinct_idx = coord.precinct_index as usize;
                let precinct = &mut res.bands[band_idx].precincts[precinct_idx];
                for update in updates {
                    let block = &mut precinct.blocks[update.block_index];
                    if update.newly_included {
                        block.included = true;
                        block.zero_bitplanes = update.zero_bitplanes.unwrap_or(0);
                    }
                    if update.num_passes > 0 {
                        block.num_passes += update.num_passes;
                        let take = (update.segment_length as usize).min(body.len().saturating_sub(offset));
                        block.data.extend_from_slice(&body[offset..offset + take]);
                        offset += take;
                    }
                }
            }
        }
    }

    Ok(())
}

/// `scheduleT1` + `inverseDWT` (SPEC_FULL §4.7, §4.9) for one tile-component:
/// decodes every included code-block up to `num_decomps_used`, dequantises
/// the results into per-band coefficient planes, then runs the inverse DWT
/// level by level, each level's LL quadrant being the previous level's
/// reconstructed samples.
fn synthesize_component(
    state: &TileComponentState,
    tccp: &crate::coding_params::Tccp,
    precision: u8,
    num_decomps_used: u32,
    transform: WaveletTransform,
    runtime: &Runtime,
) -> Result<(Vec<f64>, crate::runtime::WindowRect)> {
    struct Placement {
        resno: usize,
        band_idx: usize,
    }

    let mut tasks: Vec<DecompressBlockExec> = Vec::new();
    let mut placements: Vec<Placement> = Vec::new();
    let mut band_buffers: Vec<Vec<Vec<f64>>> = state
        .resolutions
        .iter()
        .map(|res| res.bands.iter().map(|b| vec![0f64; (b.window.width() * b.window.height()) as usize]).collect())
        .collect();

    for (resno, res) in state.resolutions.iter().enumerate() {
        if resno as u32 > num_decomps_used {
            continue;
        }
        for (band_idx, band) in res.bands.iter().enumerate() {
            let step_index = step_index_for(resno as u32, band.orientation);
            let step = tccp.step_sizes.get(step_index).copied().unwrap_or_default();
            let mb = tccp.num_guard_bits as i32 + step.expn as i32 - 1;
            for precinct in &band.precincts {
                for block in &precinct.blocks {
                    if !block.included {
                        continue;
                    }
                    let num_bps = (mb - block.zero_bitplanes as i32).clamp(0, 31) as u8;
                    let input = BlockInput {
                        data: &block.data,
                        width: block.width(),
                        height: block.height(),
                        num_bps,
                        orientation: to_t1_band(band.orientation),
                        reversible: tccp.reversible,
                        roi_shift: tccp.roi_shift,
                        kind: T1Kind::Standard,
                    };
                    tasks.push(DecompressBlockExec::new(input));
                    placements.push(Placement { resno, band_idx });
                }
            }
        }
    }

    run_all(runtime, &mut tasks);

    let mut task_idx = 0usize;
    for (resno, res) in state.resolutions.iter().enumerate() {
        if resno as u32 > num_decomps_used {
            continue;
        }
        for (band_idx, band) in res.bands.iter().enumerate() {
            let step_index = step_index_for(resno as u32, band.orientation);
            let step = tccp.step_sizes.get(step_index).copied().unwrap_or_default();
            let bw = band.window.width() as usize;
            for precinct in &band.precincts {
                for block in &precinct.blocks {
                    if !block.included {
                        continue;
                    }
                    let task = &tasks[task_idx];
                    debug_assert_eq!(placements[task_idx].resno, resno);
                    debug_assert_eq!(placements[task_idx].band_idx, band_idx);
                    task_idx += 1;
                    let Some(coeffs) = task.result.as_ref() else {
                        continue;
                    };
                    let dequantized = dequantize(coeffs, tccp.reversible, step, precision, band.orientation);
                    let buf = &mut band_buffers[resno][band_idx];
                    let local_w = block.width() as usize;
                    let local_h = block.height() as usize;
                    let ox = (block.x0 - band.window.x0) as usize;
                    let oy = (block.y0 - band.window.y0) as usize;
                    for j in 0..local_h {
                        for i in 0..local_w {
                            buf[(oy + j) * bw + (ox + i)] = dequantized[j * local_w + i];
                        }
                    }
                }
            }
        }
    }

    let res0_window = state.resolutions[0].bands[0].window;
    let mut current = band_buffers[0][0].clone();
    let mut current_window = res0_window;

    for level in 1..=num_decomps_used {
        let res = &state.resolutions[level as usize];
        let grid_window = state.window.resolution_window(level);
        let mut grid = Grid {
            width: grid_window.width() as usize,
            height: grid_window.height() as usize,
            samples: vec![0f64; (grid_window.width() * grid_window.height()) as usize],
        };
        place_into_grid(
            &mut grid,
            grid_window,
            current_window.x0,
            current_window.y0,
            0,
            0,
            current_window.width() as usize,
            current_window.height() as usize,
            &current,
            current_window.width() as usize,
        );
        for (band_idx, band) in res.bands.iter().enumerate() {
            let xob = matches!(band.orientation, GeomBand::Hl | GeomBand::Hh) as i64;
            let yob = matches!(band.orientation, GeomBand::Lh | GeomBand::Hh) as i64;
            let bw = band.window.width() as usize;
            let bh = band.window.height() as usize;
            place_into_grid(
                &mut grid,
                grid_window,
                band.window.x0,
                band.window.y0,
                xob,
                yob,
                bw,
                bh,
                &band_buffers[level as usize][band_idx],
                bw,
            );
        }
        filter_2d(&mut grid, transform);
        current = grid.samples;
        current_window = grid_window;
    }

    Ok((current, current_window))
}

/// `inverseMCTAndShift`'s transform half (SPEC_FULL §4.10): applies the
/// custom decorrelation matrix if one is bound, else the fixed RCT/ICT on
/// the first three components when the tile's MCT bit is set. DC level
/// shift is applied separately by the caller, per component.
fn apply_mct(tcp: &Tcp, components: &[crate::coding_params::ComponentInfo], recon: &mut [Vec<f64>]) {
    if let Some(idx) = tcp.mcc_decorrelation {
        if let Some(record) = tcp.mct_records.get(idx) {
            let n = (record.num_comps as usize).min(recon.len());
            let mut slices: Vec<Vec<f32>> = recon[..n].iter().map(|c| c.iter().map(|&v| v as f32).collect()).collect();
            mct::inverse_custom(record, &mut slices);
            for (dst, src) in recon[..n].iter_mut().zip(slices.iter()) {
                for (d, s) in dst.iter_mut().zip(src.iter()) {
                    *d = *s as f64;
                }
            }
        }
        return;
    }

    if !tcp.mct || components.len() < 3 {
        return;
    }

    let reversible = tcp
        .tccps
        .first()
        .map(|t| t.reversible)
        .unwrap_or(true);

    let (head, tail) = recon.split_at_mut(3);
    let _ = tail;
    let [c0, c1, c2] = [&mut head[0], &mut head[1], &mut head[2]];

    if reversible {
        let mut i0: Vec<i32> = c0.iter().map(|&v| v.round() as i32).collect();
        let mut i1: Vec<i32> = c1.iter().map(|&v| v.round() as i32).collect();
        let mut i2: Vec<i32> = c2.iter().map(|&v| v.round() as i32).collect();
        mct::inverse_rct(&mut i0, &mut i1, &mut i2);
        for (d, s) in c0.iter_mut().zip(i0.iter()) {
            *d = *s as f64;
        }
        for (d, s) in c1.iter_mut().zip(i1.iter()) {
            *d = *s as f64;
        }
        for (d, s) in c2.iter_mut().zip(i2.iter()) {
            *d = *s as f64;
        }
    } else {
        let mut f0: Vec<f32> = c0.iter().map(|&v| v as f32).collect();
        let mut f1: Vec<f32> = c1.iter().map(|&v| v as f32).collect();
        let mut f2: Vec<f32> = c2.iter().map(|&v| v as f32).collect();
        mct::inverse_ict(&mut f0, &mut f1, &mut f2);
        for (d, s) in c0.iter_mut().zip(f0.iter()) {
            *d = *s as f64;
        }
        for (d, s) in c1.iter_mut().zip(f1.iter()) {
            *d = *s as f64;
        }
        for (d, s) in c2.iter_mut().zip(f2.iter()) {
            *d = *s as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::WindowRect;

    #[test]
    fn precinct_grid_is_a_single_cell_under_the_default_exponent() {
        let window = WindowRect { x0: 0, y0: 0, x1: 64, y1: 64 };
        assert_eq!(precinct_grid_dims(window, 15, 15), (0, 0, 1, 1));
    }

    #[test]
    fn precinct_grid_covers_a_clipped_tile_window() {
        let window = WindowRect { x0: 4, y0: 4, x1: 12, y1: 12 };
        // 4x4 precincts: columns/rows covering [1,3) on each axis.
        assert_eq!(precinct_grid_dims(window, 2, 2), (1, 1, 2, 2));
    }

    #[test]
    fn partition_assigns_blocks_to_the_right_precinct() {
        let band = WindowRect { x0: 0, y0: 0, x1: 8, y1: 8 };
        let buckets = partition_band_into_blocks(band, 2, 2, 2, 2, (2, 2), (0, 0));
        assert_eq!(buckets.len(), 4);
        for bucket in &buckets {
            assert_eq!(bucket.len(), 1);
        }
        assert_eq!((buckets[0][0].x0, buckets[0][0].y0), (0, 0));
        assert_eq!((buckets[3][0].x0, buckets[3][0].y0), (4, 4));
    }

    #[test]
    fn step_index_orders_ll_then_hl_lh_hh_ascending_levels() {
        assert_eq!(step_index_for(0, GeomBand::Ll), 0);
        assert_eq!(step_index_for(1, GeomBand::Hl), 1);
        assert_eq!(step_index_for(1, GeomBand::Lh), 2);
        assert_eq!(step_index_for(1, GeomBand::Hh), 3);
        assert_eq!(step_index_for(2, GeomBand::Hl), 4);
    }

    #[test]
    fn reversible_dequantize_is_the_identity() {
        let coeffs = [1, -2, 3];
        let out = dequantize(&coeffs, true, StepSize { expn: 5, mant: 100 }, 8, GeomBand::Ll);
        assert_eq!(out, vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn clamp_rejects_values_outside_unsigned_precision() {
        assert_eq!(clamp_to_precision(-5, 8, false), 0);
        assert_eq!(clamp_to_precision(300, 8, false), 255);
        assert_eq!(clamp_to_precision(128, 8, false), 128);
    }
}
