//! A JPEG 2000 (ISO/IEC 15444-1) codestream decoder (SPEC_FULL §1).
//!
//! The sole public entry points are [`decode`] and [`decode_region`]. Both
//! take the caller's own [`Runtime`], carrying the worker pool and decode
//! options (SPEC_FULL §9 "no global mutable state" design note), grounded on
//! the teacher's split between `opj_codec_t` (here, nothing persistent: a
//! `Runtime` is constructed once and reused) and `opj_dparameters_t` (here,
//! [`DecodeOptions`]).

mod byte_stream;
mod codestream_reader;
mod coding_params;
mod error;
mod image;
mod inverse_dwt;
mod marker;
mod mct;
mod mqc;
mod packet_length_index;
mod runtime;
mod t1_decoder;
mod t1_scheduler;
mod t2;
mod tag_tree;
mod tile_component_window;
mod tile_processor;

pub use coding_params::CommentRecord;
pub use error::{DecodeError, Result};
pub use image::{DecodedImage, SamplePlane};
pub use runtime::{DecodeOptions, Runtime, WindowRect};

/// Decodes an entire codestream (SPEC_FULL §6 `decode`).
pub fn decode(bytes: &[u8], runtime: &Runtime) -> Result<DecodedImage> {
    decode_internal(bytes, runtime, None)
}

/// Decodes only the tiles intersecting `window`, cropping each decoded tile
/// to it (SPEC_FULL §10 "decode_region", §8 scenario D). Every tile
/// intersecting the window is still fully reconstructed; this does not skip
/// DWT or T1 work outside the window (that simplification, and its
/// trade-offs, is recorded in DESIGN.md).
pub fn decode_region(bytes: &[u8], window: WindowRect, runtime: &Runtime) -> Result<DecodedImage> {
    decode_internal(bytes, runtime, Some(window))
}

fn decode_internal(bytes: &[u8], runtime: &Runtime, window: Option<WindowRect>) -> Result<DecodedImage> {
    let stream = codestream_reader::read(bytes, runtime)?;
    let params = &stream.params;

    let requested = window.or(runtime.options.decode_window).unwrap_or(WindowRect {
        x0: params.x0,
        y0: params.y0,
        x1: params.x1,
        y1: params.y1,
    });
    let canvas_window = WindowRect {
        x0: requested.x0.max(params.x0),
        y0: requested.y0.max(params.y0),
        x1: requested.x1.min(params.x1),
        y1: requested.y1.min(params.y1),
    };
    if canvas_window.x1 <= canvas_window.x0 || canvas_window.y1 <= canvas_window.y0 {
        return Err(DecodeError::out_of_range(0, "decode window does not intersect the image"));
    }

    let mut planes = Vec::with_capacity(params.components.len());
    for comp in &params.components {
        let dx = comp.dx as u32;
        let dy = comp.dy as u32;
        let x0 = canvas_window.x0.div_ceil(dx);
        let y0 = canvas_window.y0.div_ceil(dy);
        let x1 = canvas_window.x1.div_ceil(dx);
        let y1 = canvas_window.y1.div_ceil(dy);
        let width = x1.saturating_sub(x0);
        let height = y1.saturating_sub(y0);
        let baseline = if comp.signed { 0 } else { 1i32 << comp.precision.saturating_sub(1) };
        planes.push(SamplePlane {
            x0,
            y0,
            width,
            height,
            dx: comp.dx,
            dy: comp.dy,
            precision: comp.precision,
            signed: comp.signed,
            samples: vec![baseline; (width * height) as usize],
        });
    }

    let mut plt_index = stream.plt_index;
    let grid_w = params.tile_grid_width();
    let max_tiles = runtime.options.max_tiles.unwrap_or(params.tcps.len());
    let mut decoded_tiles = 0usize;

    for tile_index in 0..params.tcps.len() {
        if decoded_tiles >= max_tiles {
            break;
        }
        let tcp = &params.tcps[tile_index];
        if tcp.tile_part_data.is_empty() && tcp.packet_headers.is_empty() {
            continue;
        }

        let px = tile_index as u32 % grid_w;
        let py = tile_index as u32 / grid_w;
        let tx0 = (params.tx0 + px * params.tdx).max(params.x0);
        let ty0 = (params.ty0 + py * params.tdy).max(params.y0);
        let tx1 = (params.tx0 + (px + 1) * params.tdx).min(params.x1);
        let ty1 = (params.ty0 + (py + 1) * params.tdy).min(params.y1);
        if tx1 <= canvas_window.x0 || tx0 >= canvas_window.x1 || ty1 <= canvas_window.y0 || ty0 >= canvas_window.y1 {
            continue;
        }

        match tile_processor::process_tile(tile_index as u16, params, &mut plt_index, runtime) {
            Ok(results) => {
                for r in results {
                    copy_into_plane(&mut planes[r.comp_index], &r);
                }
                decoded_tiles += 1;
            }
            Err(err) => {
                log::error!("tile {tile_index} failed to decode: {err}");
                if runtime.options.strict {
                    return Err(err);
                }
            }
        }
    }

    Ok(DecodedImage {
        x0: canvas_window.x0,
        y0: canvas_window.y0,
        x1: canvas_window.x1,
        y1: canvas_window.y1,
        components: planes,
        component_registration: params.component_registration.clone(),
        comments: params.comments.clone(),
    })
}

fn copy_into_plane(plane: &mut SamplePlane, result: &tile_processor::TileComponentResult) {
    let ix0 = result.x0.max(plane.x0);
    let iy0 = result.y0.max(plane.y0);
    let ix1 = (result.x0 + result.width).min(plane.x0 + plane.width);
    let iy1 = (result.y0 + result.height).min(plane.y0 + plane.height);
    if ix1 <= ix0 || iy1 <= iy0 {
        return;
    }
    let w = (ix1 - ix0) as usize;
    for y in iy0..iy1 {
        let src_row = ((y - result.y0) * result.width + (ix0 - result.x0)) as usize;
        let dst_row = ((y - plane.y0) * plane.width + (ix0 - plane.x0)) as usize;
        plane.samples[dst_row..dst_row + w].copy_from_slice(&result.samples[src_row..src_row + w]);
    }
}
