//! Black-box scenario tests built from literal synthesized codestreams
//! (SPEC_FULL.md §8.A-F), driven entirely through the public `jay2k::decode`
//! / `jay2k::decode_region` entry points.

use jay2k::{decode, decode_region, DecodeOptions, Runtime, WindowRect};

const SOC: u16 = 0xFF4F;
const SIZ: u16 = 0xFF51;
const COD: u16 = 0xFF52;
const QCD: u16 = 0xFF5C;
const SOT: u16 = 0xFF90;
const SOD: u16 = 0xFF93;
const EOC: u16 = 0xFFD9;
const PLT: u16 = 0xFF58;

fn segment(code: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + body.len());
    out.extend_from_slice(&code.to_be_bytes());
    out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

struct Comp {
    precision: u8,
    signed: bool,
    dx: u8,
    dy: u8,
}

fn siz_body(x1: u32, y1: u32, tx0: u32, ty0: u32, tdx: u32, tdy: u32, comps: &[Comp]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&0u16.to_be_bytes()); // Rsiz
    b.extend_from_slice(&x1.to_be_bytes());
    b.extend_from_slice(&y1.to_be_bytes());
    b.extend_from_slice(&0u32.to_be_bytes()); // X0
    b.extend_from_slice(&0u32.to_be_bytes()); // Y0
    b.extend_from_slice(&tdx.to_be_bytes());
    b.extend_from_slice(&tdy.to_be_bytes());
    b.extend_from_slice(&tx0.to_be_bytes());
    b.extend_from_slice(&ty0.to_be_bytes());
    b.extend_from_slice(&(comps.len() as u16).to_be_bytes());
    for c in comps {
        let ssiz = ((c.signed as u8) << 7) | (c.precision - 1);
        b.push(ssiz);
        b.push(c.dx);
        b.push(c.dy);
    }
    b
}

/// SPcod/SPcoc-less COD body: `Scod=0` (no precincts, no SOP/EPH), the
/// given progression order, layer count, MCT flag, and a single-entry
/// SPcod (`numres`, `cblkw_exp`, `cblkh_exp`, `cblk_sty=0`, `qmfbid`).
fn cod_body(prog: u8, layers: u16, mct: bool, numres: u8, cblkw_exp: u8, cblkh_exp: u8, qmfbid: u8) -> Vec<u8> {
    let mut b = Vec::new();
    b.push(0); // Scod
    b.push(prog);
    b.extend_from_slice(&layers.to_be_bytes());
    b.push(mct as u8);
    b.push(numres - 1);
    b.push(cblkw_exp - 2);
    b.push(cblkh_exp - 2);
    b.push(0); // cblk_sty
    b.push(qmfbid);
    b
}

fn qcd_noquant_body(guard_bits: u8, band_expn: u8) -> Vec<u8> {
    vec![guard_bits << 5, band_expn << 3]
}

fn qcd_expounded_body(guard_bits: u8, band_expn: u8, band_mant: u16) -> Vec<u8> {
    let sqcd = (guard_bits << 5) | 2;
    let v: u16 = (band_expn as u16) << 11 | band_mant;
    vec![sqcd, (v >> 8) as u8, (v & 0xFF) as u8]
}

/// One complete tile-part: SOT (with an exactly computed Psot) + SOD +
/// `tile_data`. A tile-part with no coding-parameter overrides carries
/// exactly SOT(12 bytes) + SOD(2 bytes) = 14 bytes of header before the
/// data, so `Psot = 14 + tile_data.len()`.
fn tile_part(tile_index: u16, tile_data: &[u8]) -> Vec<u8> {
    let psot = 14 + tile_data.len() as u32;
    let mut sot_body = Vec::new();
    sot_body.extend_from_slice(&tile_index.to_be_bytes());
    sot_body.extend_from_slice(&psot.to_be_bytes());
    sot_body.push(0); // TPsot
    sot_body.push(1); // TNsot
    let mut out = segment(SOT, &sot_body);
    out.extend_from_slice(&SOD.to_be_bytes());
    out.extend_from_slice(tile_data);
    out
}

const ONE_COMP_8U: Comp = Comp { precision: 8, signed: false, dx: 1, dy: 1 };

#[test]
fn scenario_a_minimal_1x1_single_component() {
    // SOC, SIZ(1x1,1 comp,8-bit unsigned), COD(LRCP,1 layer,1 res,4x4 cblk,
    // reversible), QCD(noqnt,[0x08]), SOT/SOD with one empty packet (0x00),
    // EOC -> decoded sample = 128 (DC shift of a zero coefficient).
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(1, 1, 0, 0, 1, 1, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));
    cs.extend_from_slice(&tile_part(0, &[0x00]));
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    let image = decode(&cs, &runtime).expect("scenario A should decode");
    assert_eq!(image.components.len(), 1);
    let plane = &image.components[0];
    assert_eq!((plane.width, plane.height), (1, 1));
    assert_eq!(plane.samples, vec![128]);
}

#[test]
fn scenario_b_two_tile_grayscale_reversible() {
    // 4x4 image split into two 2x4 tiles; each tile-part decodes
    // independently and both contribute all-128 output.
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(4, 4, 0, 0, 2, 4, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));
    cs.extend_from_slice(&tile_part(0, &[0x00]));
    cs.extend_from_slice(&tile_part(1, &[0x00]));
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    let image = decode(&cs, &runtime).expect("scenario B should decode");
    let plane = &image.components[0];
    assert_eq!((plane.width, plane.height), (4, 4));
    assert!(plane.samples.iter().all(|&s| s == 128));
}

#[test]
fn scenario_c_rgb_mct_on_zero_coefficients() {
    // RGB, MCT on, irreversible (9/7). With all code-blocks empty the
    // coefficient planes are all-zero, so the inverse RCT/ICT leaves them
    // zero regardless of rounding, and every component lands on the
    // unsigned DC-shift baseline.
    let comps = [ONE_COMP_8U, ONE_COMP_8U, ONE_COMP_8U];
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(1, 1, 0, 0, 1, 1, &comps)));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, true, 1, 4, 4, 0)));
    cs.extend_from_slice(&segment(QCD, &qcd_expounded_body(2, 8, 0)));
    // LRCP with 1 layer, 1 resolution, 3 components: one empty packet per
    // component, in component order.
    cs.extend_from_slice(&tile_part(0, &[0x00, 0x00, 0x00]));
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    let image = decode(&cs, &runtime).expect("scenario C should decode");
    assert_eq!(image.components.len(), 3);
    for plane in &image.components {
        assert_eq!(plane.samples, vec![128]);
    }
}

#[test]
fn scenario_d_windowed_decode_clips_to_the_requested_rectangle() {
    // Same geometry as scenario B (4x4, two 2x4 tiles) but decoded through
    // `decode_region` with a window covering only the left tile; the
    // returned image is cropped to that window.
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(4, 4, 0, 0, 2, 4, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));
    cs.extend_from_slice(&tile_part(0, &[0x00]));
    cs.extend_from_slice(&tile_part(1, &[0x00]));
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    let window = WindowRect { x0: 0, y0: 0, x1: 2, y1: 4 };
    let image = decode_region(&cs, window, &runtime).expect("windowed decode should succeed");
    assert_eq!((image.x0, image.y0, image.x1, image.y1), (0, 0, 2, 4));
    let plane = &image.components[0];
    assert_eq!((plane.width, plane.height), (2, 4));
    assert!(plane.samples.iter().all(|&s| s == 128));
}

#[test]
fn scenario_e_plt_driven_packet_length_parse_leaves_no_residual() {
    // A tile-part carrying a PLT marker with two packet lengths (3, 2) for
    // its two layers; T2 must consume exactly those byte counts out of the
    // tile-part payload and land precisely on the next marker (here EOC)
    // with nothing left over, matching SPEC_FULL.md scenario E.
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(1, 1, 0, 0, 1, 1, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 2, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));

    // Two packets (one per layer), each a one-byte "not included" header
    // (0x00) followed by filler body bytes whose count is dictated purely
    // by the PLT lengths below, not by any real code-block payload.
    let tile_data: &[u8] = &[0x00, 0xAA, 0xBB, 0xCC, 0x00, 0xDD, 0xEE];
    let plt_segment = segment(PLT, &[0x00, 0x03, 0x02]); // Zplt=0, lengths 3 then 2.
    let sod = SOD.to_be_bytes();

    let sot_segment_len = 12u32; // marker(2) + length(2) + body(8)
    let psot = sot_segment_len + plt_segment.len() as u32 + sod.len() as u32 + tile_data.len() as u32;
    let mut sot_body = Vec::new();
    sot_body.extend_from_slice(&0u16.to_be_bytes()); // Isot
    sot_body.extend_from_slice(&psot.to_be_bytes());
    sot_body.push(0); // TPsot
    sot_body.push(1); // TNsot
    cs.extend_from_slice(&segment(SOT, &sot_body));
    cs.extend_from_slice(&plt_segment);
    cs.extend_from_slice(&sod);
    cs.extend_from_slice(tile_data);
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    let image = decode(&cs, &runtime).expect("PLT-driven packet parse should not misalign");
    assert_eq!(image.components[0].samples, vec![128]);
}

#[test]
fn scenario_f_unknown_marker_between_known_markers_is_skipped() {
    // Inject a 0xFF99 marker followed by 4 zero bytes between COD and QCD;
    // the decoder must log and continue rather than fail.
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(1, 1, 0, 0, 1, 1, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&[0xFF, 0x99, 0x00, 0x00, 0x00, 0x00]);
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));
    cs.extend_from_slice(&tile_part(0, &[0x00]));
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    let image = decode(&cs, &runtime).expect("unknown marker recovery should not fail decoding");
    assert_eq!(image.components[0].samples, vec![128]);
}

#[test]
fn truncated_codestream_without_siz_is_an_error() {
    let cs = SOC.to_be_bytes().to_vec();
    let runtime = Runtime::default();
    assert!(decode(&cs, &runtime).is_err());
}

#[test]
fn malformed_psot_longer_than_the_stream_is_rejected() {
    // A tile-part whose Psot claims more bytes than actually follow the
    // header cannot be satisfied by `ByteStream::read` and must surface as
    // an error rather than silently producing a partial image.
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(1, 1, 0, 0, 1, 1, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));
    let mut sot_body = Vec::new();
    sot_body.extend_from_slice(&0u16.to_be_bytes());
    sot_body.extend_from_slice(&9999u32.to_be_bytes());
    sot_body.push(0);
    sot_body.push(1);
    cs.extend_from_slice(&segment(SOT, &sot_body));
    cs.extend_from_slice(&SOD.to_be_bytes());
    cs.extend_from_slice(&[0x00]);
    cs.extend_from_slice(&EOC.to_be_bytes());

    let runtime = Runtime::default();
    assert!(decode(&cs, &runtime).is_err());
}

#[test]
fn decode_options_default_runtime_matches_explicit_default() {
    let a = Runtime::default();
    let b = Runtime::new(DecodeOptions::default());
    // Both should decode scenario A identically; this just exercises the
    // `Runtime::new` constructor path alongside `Runtime::default`.
    let mut cs = Vec::new();
    cs.extend_from_slice(&SOC.to_be_bytes());
    cs.extend_from_slice(&segment(SIZ, &siz_body(1, 1, 0, 0, 1, 1, &[ONE_COMP_8U])));
    cs.extend_from_slice(&segment(COD, &cod_body(0, 1, false, 1, 4, 4, 1)));
    cs.extend_from_slice(&segment(QCD, &qcd_noquant_body(2, 8)));
    cs.extend_from_slice(&tile_part(0, &[0x00]));
    cs.extend_from_slice(&EOC.to_be_bytes());

    assert_eq!(decode(&cs, &a).unwrap().components[0].samples, decode(&cs, &b).unwrap().components[0].samples);
}
