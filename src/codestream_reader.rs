//! Marker-driven codestream parser (SPEC_FULL §4.2): turns a raw JPEG 2000
//! codestream into a frozen [`CodingParams`] plus per-tile coded data, ready
//! for `tile_processor` to decompress.
//!
//! Grounded on the teacher's `opj_j2k_read_header`/`opj_j2k_decode` marker
//! dispatch loop in `j2k.rs` (`opj_j2k_read_siz`, `opj_j2k_read_cod`,
//! `opj_j2k_read_SPCod_SPCoc`, `opj_j2k_read_SQcd_SQcc`, `opj_j2k_read_poc`,
//! `opj_j2k_read_sot`, `opj_j2k_read_mcc`, ...), rewritten as an explicit
//! state machine over an owned [`ByteStream`] instead of a `opj_j2k_t`
//! threaded through dozens of free functions operating on raw pointers.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::byte_stream::ByteStream;
use crate::coding_params::{
    CodingParams, ComponentInfo, CommentRecord, MctRecord, PocEntry, ProgressionOrder,
    QuantStyle, ScopeOrigin, StepSize, Tccp, Tcp,
};
use crate::error::{DecodeError, Result};
use crate::marker::{self, StateMask};
use crate::packet_length_index::{GlobalPacketLengthIndex, TileLengthIndex, TlmEntry, TlmLayout};
use crate::runtime::Runtime;

/// A fully parsed codestream: frozen coding parameters plus the packet
/// length side-index, ready for per-tile decompression.
pub(crate) struct DecodedStream {
    pub(crate) params: CodingParams,
    pub(crate) plt_index: GlobalPacketLengthIndex,
    /// `false` when the codestream ran out of bytes before an EOC marker
    /// (SPEC_FULL §4.2 "NO_EOC"); tiles with tile-part data already
    /// collected are still decodable.
    pub(crate) ended_with_eoc: bool,
}

/// A raw, not-yet-decoded MCT marker segment, held until an MCC marker
/// resolves which records it actually needs.
#[derive(Debug, Clone)]
struct PendingMct {
    index: u8,
    array_type: u8,
    element_type: u8,
    data: Vec<u8>,
}

/// Per-scope (main header or one tile) bookkeeping for MCT/MCC resolution.
/// Cloned into a tile's scope from the main scope when that tile's first
/// tile-part begins, mirroring how `default_tcp` itself is cloned.
#[derive(Debug, Clone, Default)]
struct ScopeMctState {
    pending: Vec<PendingMct>,
    /// MCC marker index -> position of the merged record in the owning
    /// `Tcp::mct_records`.
    mcc_positions: HashMap<u8, usize>,
}

/// Code-block / transform fields shared by COD's SPcod and COC's SPcoc.
struct CblkTemplate {
    num_resolutions: u8,
    cblk_w_exp: u8,
    cblk_h_exp: u8,
    cblk_style: u8,
    reversible: bool,
    precinct_sizes: SmallVec<[(u8, u8); 33]>,
}

fn apply_cblk_template(tccp: &mut Tccp, t: &CblkTemplate) {
    tccp.num_resolutions = t.num_resolutions;
    tccp.cblk_w_exp = t.cblk_w_exp;
    tccp.cblk_h_exp = t.cblk_h_exp;
    tccp.cblk_style = t.cblk_style;
    tccp.reversible = t.reversible;
    tccp.precinct_sizes = t.precinct_sizes.clone();
}

/// Parses one SPcod (COD) or SPcoc (COC) element (SPEC_FULL §4.2, Table
/// A.20/A.21). `has_precincts` comes from the marker's `Scod`/`Scoc` bit 0.
fn parse_spcod_spcoc(data: &[u8], has_precincts: bool, offset: usize) -> Result<CblkTemplate> {
    if data.len() < 5 {
        return Err(DecodeError::malformed_marker(
            offset,
            "SPcod/SPcoc element shorter than its fixed fields",
        ));
    }
    let num_resolutions = data[0] as u16 + 1;
    if num_resolutions > 33 {
        return Err(DecodeError::out_of_range(
            offset,
            "numresolutions exceeds the maximum of 33",
        ));
    }
    let num_resolutions = num_resolutions as u8;
    let cblk_w_exp = (data[1] as u16 + 2) as u8;
    let cblk_h_exp = (data[2] as u16 + 2) as u8;
    let cblk_style = data[3];
    const HT_MIXED_MODE_BIT: u8 = 1 << 7;
    if cblk_style & HT_MIXED_MODE_BIT != 0 {
        return Err(DecodeError::UnsupportedFeature(
            "mixed HT code-block style is not supported",
        ));
    }
    let qmfbid = data[4];
    if qmfbid > 1 {
        return Err(DecodeError::out_of_range(
            offset,
            "SPcod/SPcoc transformation id must be 0 or 1",
        ));
    }
    let reversible = qmfbid == 1;

    let rest = &data[5..];
    let mut precinct_sizes = SmallVec::new();
    if has_precincts {
        let need = num_resolutions as usize;
        if rest.len() < need {
            return Err(DecodeError::truncated(
                offset,
                "SPcod/SPcoc precinct size list runs past the marker",
            ));
        }
        for (i, &b) in rest[..need].iter().enumerate() {
            let pw = b & 0x0F;
            let ph = b >> 4;
            if i != 0 && (pw == 0 || ph == 0) {
                return Err(DecodeError::out_of_range(
                    offset,
                    "precinct exponent 0 is only legal at the lowest resolution level",
                ));
            }
            precinct_sizes.push((pw, ph));
        }
    } else {
        for _ in 0..num_resolutions {
            precinct_sizes.push((15, 15));
        }
    }

    Ok(CblkTemplate {
        num_resolutions,
        cblk_w_exp,
        cblk_h_exp,
        cblk_style,
        reversible,
        precinct_sizes,
    })
}

/// Parses one SQcd (QCD) or SQcc (QCC) element (SPEC_FULL §4.2).
fn parse_sqcd_sqcc(payload: &[u8], offset: usize) -> Result<(QuantStyle, u8, SmallVec<[StepSize; 97]>)> {
    if payload.is_empty() {
        return Err(DecodeError::truncated(offset, "SQcd/SQcc element is empty"));
    }
    let sqcd = payload[0];
    let style = match sqcd & 0x1F {
        0 => QuantStyle::NoQuant,
        1 => QuantStyle::ScalarDerived,
        2 => QuantStyle::ScalarExpounded,
        _ => {
            return Err(DecodeError::out_of_range(
                offset,
                "quantization style must be 0 (none), 1 (derived), or 2 (expounded)",
            ))
        }
    };
    let guard_bits = sqcd >> 5;
    let rest = &payload[1..];

    const MAX_BANDS: usize = 3 * 33 - 2;
    let mut steps = SmallVec::new();
    match style {
        QuantStyle::NoQuant => {
            let num_band = rest.len();
            for &b in rest.iter().take(MAX_BANDS.min(num_band)) {
                steps.push(StepSize {
                    expn: b >> 3,
                    mant: 0,
                });
            }
        }
        QuantStyle::ScalarDerived | QuantStyle::ScalarExpounded => {
            let num_band = if style == QuantStyle::ScalarDerived {
                1
            } else {
                rest.len() / 2
            };
            if rest.len() < 2 * num_band {
                return Err(DecodeError::truncated(
                    offset,
                    "SQcd/SQcc step size list runs past the marker",
                ));
            }
            for i in 0..num_band.min(MAX_BANDS) {
                let v = u16::from_be_bytes([rest[2 * i], rest[2 * i + 1]]);
                steps.push(StepSize {
                    expn: (v >> 11) as u8,
                    mant: v & 0x7FF,
                });
            }
            if style == QuantStyle::ScalarDerived {
                let base = steps[0];
                for band_no in 1..MAX_BANDS {
                    let delta = ((band_no - 1) / 3) as u8;
                    steps.push(StepSize {
                        expn: base.expn.saturating_sub(delta),
                        mant: base.mant,
                    });
                }
            }
        }
    }
    Ok((style, guard_bits, steps))
}

fn read_index(bytes: &[u8]) -> u16 {
    if bytes.len() == 1 {
        bytes[0] as u16
    } else {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

/// Decodes an MCT marker's raw element array per its `Imct` element type
/// (0=Int16, 1=Int32, 2=Float32, 3=Float64), widening everything to `f64`.
fn decode_mct_elements(bytes: &[u8], element_type: u8, offset: usize) -> Result<Vec<f64>> {
    match element_type {
        0 => {
            if bytes.len() % 2 != 0 {
                return Err(DecodeError::malformed_marker(offset, "MCT Int16 data is misaligned"));
            }
            Ok(bytes
                .chunks_exact(2)
                .map(|c| i16::from_be_bytes([c[0], c[1]]) as f64)
                .collect())
        }
        1 => {
            if bytes.len() % 4 != 0 {
                return Err(DecodeError::malformed_marker(offset, "MCT Int32 data is misaligned"));
            }
            Ok(bytes
                .chunks_exact(4)
                .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect())
        }
        2 => {
            if bytes.len() % 4 != 0 {
                return Err(DecodeError::malformed_marker(offset, "MCT Float32 data is misaligned"));
            }
            Ok(bytes
                .chunks_exact(4)
                .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect())
        }
        3 => {
            if bytes.len() % 8 != 0 {
                return Err(DecodeError::malformed_marker(offset, "MCT Float64 data is misaligned"));
            }
            Ok(bytes
                .chunks_exact(8)
                .map(|c| f64::from_be_bytes(c.try_into().expect("chunk is exactly 8 bytes")))
                .collect())
        }
        _ => unreachable!("element_type is masked to 2 bits"),
    }
}

fn state_label(state: StateMask) -> &'static str {
    if state == StateMask::MH_SOC {
        "start of codestream"
    } else if state == StateMask::MH_MAIN {
        "main header"
    } else if state == StateMask::TPH_SOT {
        "between tile-parts"
    } else if state == StateMask::TPH {
        "tile-part header"
    } else if state == StateMask::DATA {
        "tile-part data"
    } else if state == StateMask::EOC {
        "end of codestream"
    } else {
        "unknown"
    }
}

fn parse_soc(stream: &mut ByteStream) -> Result<()> {
    let offset = stream.tell();
    let code = stream.read_u16()?;
    if code != marker::SOC {
        return Err(DecodeError::MarkerOutOfPlace {
            offset,
            marker: code,
            state: "start of codestream",
        });
    }
    Ok(())
}

/// Parses the mandatory SIZ marker into a fresh [`CodingParams`] (SPEC_FULL
/// §4.2, §3). Grounded on `opj_j2k_read_siz`.
fn parse_siz(stream: &mut ByteStream) -> Result<CodingParams> {
    let marker_offset = stream.tell();
    let code = stream.read_u16()?;
    if code != marker::SIZ {
        return Err(DecodeError::MarkerOutOfPlace {
            offset: marker_offset,
            marker: code,
            state: "start of codestream",
        });
    }
    let l = stream.read_u16()? as usize;
    if l < 3 {
        return Err(DecodeError::malformed_marker(marker_offset, "SIZ marker length must be >= 3"));
    }
    let body_offset = stream.tell();
    let payload = stream.read(l - 2)?;
    if payload.len() < 36 {
        return Err(DecodeError::malformed_marker(
            body_offset,
            "SIZ marker shorter than its fixed 36-byte header",
        ));
    }

    let mut p = ByteStream::new(payload);
    let _rsiz = p.read_u16()?; // capabilities, informative only
    let x1 = p.read_u32()?;
    let y1 = p.read_u32()?;
    let x0 = p.read_u32()?;
    let y0 = p.read_u32()?;
    let tdx = p.read_u32()?;
    let tdy = p.read_u32()?;
    let tx0 = p.read_u32()?;
    let ty0 = p.read_u32()?;
    let csiz = p.read_u16()? as usize;
    if csiz == 0 || csiz > 16384 {
        return Err(DecodeError::out_of_range(
            body_offset,
            "SIZ component count must lie in [1, 16384]",
        ));
    }
    if payload.len() - 36 != csiz * 3 {
        return Err(DecodeError::malformed_marker(
            body_offset,
            "SIZ marker length does not match its declared component count",
        ));
    }

    let mut components = Vec::with_capacity(csiz);
    for _ in 0..csiz {
        let ssiz = p.read_u8()?;
        let dx = p.read_u8()?;
        let dy = p.read_u8()?;
        if dx == 0 || dy == 0 {
            return Err(DecodeError::out_of_range(
                body_offset,
                "component sub-sampling factors must be >= 1",
            ));
        }
        let signed = ssiz & 0x80 != 0;
        let precision = (ssiz & 0x7F) + 1;
        if precision > 38 {
            return Err(DecodeError::out_of_range(
                body_offset,
                "component precision exceeds the 38-bit norm maximum",
            ));
        }
        components.push(ComponentInfo {
            dx,
            dy,
            precision,
            signed,
        });
    }

    let mut params = CodingParams {
        x0,
        y0,
        x1,
        y1,
        tx0,
        ty0,
        tdx,
        tdy,
        components,
        default_tcp: Tcp::new(csiz),
        tcps: Vec::new(),
        component_registration: Vec::new(),
        comments: Vec::new(),
    };
    params.validate_geometry(marker_offset)?;
    let num_tiles = params.num_tiles() as usize;
    params.tcps = vec![Tcp::new(csiz); num_tiles];
    Ok(params)
}

struct CodestreamReader<'a> {
    stream: ByteStream<'a>,
    runtime: &'a Runtime,
    state: StateMask,
    params: CodingParams,
    plt_index: GlobalPacketLengthIndex,
    tlm_index: TileLengthIndex,
    tile_customized: Vec<bool>,
    main_mct: ScopeMctState,
    tile_mct: HashMap<u16, ScopeMctState>,
    ended_with_eoc: bool,
}

impl<'a> CodestreamReader<'a> {
    fn comp_room(&self) -> usize {
        if self.params.components.len() <= 256 {
            1
        } else {
            2
        }
    }

    fn tcp_mut(&mut self, tile: Option<u16>) -> &mut Tcp {
        match tile {
            Some(t) => &mut self.params.tcps[t as usize],
            None => &mut self.params.default_tcp,
        }
    }

    fn mct_scope_mut(&mut self, tile: Option<u16>) -> &mut ScopeMctState {
        match tile {
            Some(t) => self.tile_mct.entry(t).or_insert_with(ScopeMctState::default),
            None => &mut self.main_mct,
        }
    }

    /// Reads 2-byte words until one names a known marker, or the stream
    /// runs out (SPEC_FULL §4.2 unknown-marker recovery).
    fn next_marker(&mut self) -> Result<Option<(u16, usize)>> {
        loop {
            if self.stream.bytes_left() < 2 {
                return Ok(None);
            }
            let offset = self.stream.tell();
            let code = self.stream.read_u16()?;
            if marker::marker_name(code).is_some() {
                return Ok(Some((code, offset)));
            }
            log::warn!("skipping unrecognised bytes at offset {offset} while looking for a marker");
        }
    }

    fn read_segment_payload(&mut self, offset: usize) -> Result<&'a [u8]> {
        let l = self.stream.read_u16()? as usize;
        if l < 3 {
            return Err(DecodeError::malformed_marker(
                offset,
                "marker segment length must be at least 3",
            ));
        }
        self.stream.read(l - 2)
    }

    fn run(&mut self) -> Result<()> {
        loop {
            let (code, offset) = match self.next_marker()? {
                Some(pair) => pair,
                None => {
                    self.ended_with_eoc = false;
                    return Ok(());
                }
            };
            if let Some(mask) = marker::legal_states(code) {
                if !mask.contains(self.state) {
                    return Err(DecodeError::MarkerOutOfPlace {
                        offset,
                        marker: code,
                        state: state_label(self.state),
                    });
                }
            }
            if code == marker::EOC {
                self.state = StateMask::EOC;
                self.ended_with_eoc = true;
                return Ok(());
            }
            if code == marker::SOT {
                self.parse_tile_part(offset)?;
                continue;
            }
            let payload = self.read_segment_payload(offset)?;
            self.dispatch_coding_marker(code, offset, payload, None)?;
        }
    }

    fn parse_tile_part(&mut self, sot_offset: usize) -> Result<()> {
        let payload = self.read_segment_payload(sot_offset)?;
        if payload.len() != 8 {
            return Err(DecodeError::malformed_marker(
                sot_offset,
                "SOT marker segment must carry exactly 8 bytes",
            ));
        }
        let tile_index = u16::from_be_bytes([payload[0], payload[1]]);
        let psot = u32::from_be_bytes([payload[2], payload[3], payload[4], payload[5]]);
        let tp_index = payload[6];

        let num_tiles = self.params.num_tiles();
        if tile_index as u32 >= num_tiles {
            return Err(DecodeError::out_of_range(sot_offset, "SOT tile index outside the tile grid"));
        }
        if let Some(max) = self.runtime.options.max_tiles {
            let decoded_so_far = self.tile_customized.iter().filter(|&&c| c).count();
            if decoded_so_far >= max && !self.tile_customized[tile_index as usize] {
                return Err(DecodeError::AllocationFailure(
                    "tile count exceeds Runtime::options.max_tiles",
                ));
            }
        }

        if tp_index == 0 {
            if self.tile_customized[tile_index as usize] {
                return Err(DecodeError::MarkerOutOfPlace {
                    offset: sot_offset,
                    marker: marker::SOT,
                    state: "duplicate first tile-part for this tile",
                });
            }
            self.params.tcps[tile_index as usize] = self.params.default_tcp.clone();
            self.tile_customized[tile_index as usize] = true;
            self.tile_mct.insert(tile_index, self.main_mct.clone());
        } else if !self.tile_customized[tile_index as usize] {
            return Err(DecodeError::MarkerOutOfPlace {
                offset: sot_offset,
                marker: marker::SOT,
                state: "tile-part 0 must appear before later tile-parts",
            });
        }

        self.state = StateMask::TPH;
        self.tph_loop(tile_index)?;

        let data_start = self.stream.tell();
        let payload_len = if psot == 0 {
            // SPEC_FULL §4.2: Psot == 0 means "rest of the codestream".
            self.stream.bytes_left()
        } else {
            let total = psot as usize;
            let header_len = data_start.saturating_sub(sot_offset);
            if total < header_len {
                return Err(DecodeError::malformed_marker(
                    sot_offset,
                    "Psot is shorter than the tile-part header it covers",
                ));
            }
            total - header_len
        };
        let tile_data = self.stream.read(payload_len)?;
        self.params.tcps[tile_index as usize]
            .tile_part_data
            .extend_from_slice(tile_data);

        self.state = StateMask::DATA;
        Ok(())
    }

    /// Reads markers between SOT and SOD (SPEC_FULL §4.2 tile-part header).
    fn tph_loop(&mut self, tile_index: u16) -> Result<()> {
        loop {
            let (code, offset) = self.next_marker()?.ok_or_else(|| {
                DecodeError::truncated(self.stream.tell(), "codestream ended inside a tile-part header")
            })?;
            if let Some(mask) = marker::legal_states(code) {
                if !mask.contains(self.state) {
                    return Err(DecodeError::MarkerOutOfPlace {
                        offset,
                        marker: code,
                        state: state_label(self.state),
                    });
                }
            }
            if code == marker::SOD {
                return Ok(());
            }
            let payload = self.read_segment_payload(offset)?;
            match code {
                marker::PLT => {
                    if payload.is_empty() {
                        return Err(DecodeError::malformed_marker(
                            offset,
                            "PLT marker must carry at least a Zplt byte",
                        ));
                    }
                    let z_plt = payload[0];
                    self.plt_index
                        .tile_index_mut(tile_index)
                        .add_plt_segment(z_plt, &payload[1..], offset)?;
                }
                marker::PPT => {
                    if payload.is_empty() {
                        return Err(DecodeError::malformed_marker(
                            offset,
                            "PPT marker must carry at least a Zppt byte",
                        ));
                    }
                    self.params.tcps[tile_index as usize]
                        .packet_headers
                        .extend_from_slice(&payload[1..]);
                }
                _ => self.dispatch_coding_marker(code, offset, payload, Some(tile_index))?,
            }
        }
    }

    fn dispatch_coding_marker(
        &mut self,
        code: u16,
        offset: usize,
        payload: &'a [u8],
        tile: Option<u16>,
    ) -> Result<()> {
        match code {
            marker::CAP => {
                log::debug!("ignoring CAP marker payload ({} bytes)", payload.len());
                Ok(())
            }
            marker::COD => self.apply_cod(offset, payload, tile),
            marker::COC => self.apply_coc(offset, payload, tile),
            marker::QCD => self.apply_qcd(offset, payload, tile),
            marker::QCC => self.apply_qcc(offset, payload, tile),
            marker::POC => self.apply_poc(offset, payload, tile),
            marker::CRG => self.apply_crg(offset, payload),
            marker::COM => self.apply_com(offset, payload),
            marker::TLM => self.apply_tlm(offset, payload),
            marker::PLM => self.apply_plm(offset, payload),
            marker::PPM => self.apply_ppm(offset, payload, tile),
            marker::MCT => self.apply_mct(offset, payload, tile),
            marker::MCC => self.apply_mcc(offset, payload, tile),
            marker::MCO => self.apply_mco(offset, payload, tile),
            marker::CBD => self.apply_cbd(offset, payload),
            marker::RGN => self.apply_rgn(offset, payload, tile),
            _ => unreachable!("marker 0x{code:04X} passed legal_states but has no dispatch arm"),
        }
    }

    fn apply_cod(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        if payload.len() < 5 {
            return Err(DecodeError::malformed_marker(
                offset,
                "COD marker shorter than its fixed fields",
            ));
        }
        let scod = payload[0];
        let prog = ProgressionOrder::from_code(payload[1], offset)?;
        let num_layers = u16::from_be_bytes([payload[2], payload[3]]);
        if num_layers == 0 {
            return Err(DecodeError::out_of_range(offset, "COD number of layers must be >= 1"));
        }
        let mct = payload[4] != 0;
        let template = parse_spcod_spcoc(&payload[5..], scod & 0x1 != 0, offset)?;

        let origin = if tile.is_some() {
            ScopeOrigin::TileDefault
        } else {
            ScopeOrigin::MainDefault
        };
        let num_comps = self.params.components.len();
        for c in 0..num_comps {
            let tccp = &mut self.tcp_mut(tile).tccps[c];
            if !tccp.accepts_cod(origin) {
                continue;
            }
            apply_cblk_template(tccp, &template);
            tccp.cod_origin = origin;
            tccp.validate_cblk_bounds(offset)?;
        }
        let tcp = self.tcp_mut(tile);
        tcp.progression = prog;
        tcp.num_layers = num_layers;
        tcp.mct = mct;
        Ok(())
    }

    fn apply_coc(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        let comp_room = self.comp_room();
        if payload.len() < comp_room + 1 {
            return Err(DecodeError::malformed_marker(offset, "COC marker shorter than its fixed fields"));
        }
        let comp_no = read_index(&payload[..comp_room]);
        if comp_no as usize >= self.params.components.len() {
            return Err(DecodeError::out_of_range(offset, "COC references an undeclared component"));
        }
        let scoc = payload[comp_room];
        let template = parse_spcod_spcoc(&payload[comp_room + 1..], scoc & 0x1 != 0, offset)?;
        let origin = if tile.is_some() {
            ScopeOrigin::TileComponent
        } else {
            ScopeOrigin::MainComponent
        };
        let tccp = &mut self.tcp_mut(tile).tccps[comp_no as usize];
        if tccp.accepts_cod(origin) {
            apply_cblk_template(tccp, &template);
            tccp.cod_origin = origin;
            tccp.validate_cblk_bounds(offset)?;
        }
        Ok(())
    }

    fn apply_qcd(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        let origin = if tile.is_some() {
            ScopeOrigin::TileDefault
        } else {
            ScopeOrigin::MainDefault
        };
        let (style, guard_bits, steps) = parse_sqcd_sqcc(payload, offset)?;
        let num_comps = self.params.components.len();
        for c in 0..num_comps {
            let tccp = &mut self.tcp_mut(tile).tccps[c];
            if !tccp.accepts_qcd(origin) {
                continue;
            }
            tccp.quant_style = style;
            tccp.num_guard_bits = guard_bits;
            tccp.step_sizes = steps.clone();
            tccp.qcd_origin = origin;
        }
        Ok(())
    }

    fn apply_qcc(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        let comp_room = self.comp_room();
        if payload.len() < comp_room {
            return Err(DecodeError::truncated(offset, "QCC marker shorter than its component field"));
        }
        let comp_no = read_index(&payload[..comp_room]);
        if comp_no as usize >= self.params.components.len() {
            return Err(DecodeError::out_of_range(offset, "QCC references an undeclared component"));
        }
        let origin = if tile.is_some() {
            ScopeOrigin::TileComponent
        } else {
            ScopeOrigin::MainComponent
        };
        let (style, guard_bits, steps) = parse_sqcd_sqcc(&payload[comp_room..], offset)?;
        let tccp = &mut self.tcp_mut(tile).tccps[comp_no as usize];
        if tccp.accepts_qcd(origin) {
            tccp.quant_style = style;
            tccp.num_guard_bits = guard_bits;
            tccp.step_sizes = steps;
            tccp.qcd_origin = origin;
        }
        Ok(())
    }

    fn apply_poc(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        let comp_room = self.comp_room();
        let chunk = 5 + 2 * comp_room;
        if payload.is_empty() || payload.len() % chunk != 0 {
            return Err(DecodeError::malformed_marker(
                offset,
                "POC marker size is not a multiple of its entry size",
            ));
        }
        let n = payload.len() / chunk;
        let num_layers = self.tcp_mut(tile).num_layers;
        let num_comps = self.params.components.len() as u16;
        let tcp = self.tcp_mut(tile);
        if tcp.poc.len() + n >= 32 {
            return Err(DecodeError::out_of_range(
                offset,
                "too many progression-order-change entries",
            ));
        }
        for i in 0..n {
            let e = &payload[i * chunk..(i + 1) * chunk];
            let res_start = e[0];
            let comp_start = read_index(&e[1..1 + comp_room]);
            let layer_end =
                u16::from_be_bytes([e[1 + comp_room], e[2 + comp_room]]).min(num_layers);
            let res_end = e[3 + comp_room];
            let comp_end = read_index(&e[4 + comp_room..4 + 2 * comp_room]).min(num_comps);
            let progression = ProgressionOrder::from_code(e[4 + 2 * comp_room], offset)?;
            tcp.poc.push(PocEntry {
                res_start,
                comp_start,
                layer_end,
                res_end,
                comp_end,
                progression,
            });
        }
        Ok(())
    }

    fn apply_crg(&mut self, offset: usize, payload: &[u8]) -> Result<()> {
        let num_comps = self.params.components.len();
        if payload.len() != num_comps * 4 {
            return Err(DecodeError::malformed_marker(
                offset,
                "CRG size must be exactly 4 bytes per component",
            ));
        }
        let mut regs = Vec::with_capacity(num_comps);
        for i in 0..num_comps {
            let x = u16::from_be_bytes([payload[i * 4], payload[i * 4 + 1]]);
            let y = u16::from_be_bytes([payload[i * 4 + 2], payload[i * 4 + 3]]);
            regs.push((x, y));
        }
        self.params.component_registration = regs;
        Ok(())
    }

    fn apply_com(&mut self, offset: usize, payload: &[u8]) -> Result<()> {
        if payload.len() < 2 {
            return Err(DecodeError::malformed_marker(offset, "COM marker shorter than its Rcom field"));
        }
        let rcom = u16::from_be_bytes([payload[0], payload[1]]);
        self.params.comments.push(CommentRecord {
            is_text: rcom == 1,
            bytes: payload[2..].to_vec(),
        });
        Ok(())
    }

    fn apply_rgn(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        let comp_room = self.comp_room();
        if payload.len() != comp_room + 2 {
            return Err(DecodeError::malformed_marker(offset, "RGN marker size mismatch"));
        }
        let comp_no = read_index(&payload[..comp_room]);
        if comp_no as usize >= self.params.components.len() {
            return Err(DecodeError::out_of_range(offset, "RGN references an undeclared component"));
        }
        let roi_style = payload[comp_room];
        if roi_style != 0 {
            return Err(DecodeError::UnsupportedFeature(
                "RGN region-of-interest style other than implicit (0)",
            ));
        }
        let roi_shift = payload[comp_room + 1];
        self.tcp_mut(tile).tccps[comp_no as usize].roi_shift = roi_shift;
        Ok(())
    }

    fn apply_cbd(&mut self, offset: usize, payload: &[u8]) -> Result<()> {
        let num_comps = self.params.components.len();
        if payload.len() != num_comps + 2 {
            return Err(DecodeError::malformed_marker(
                offset,
                "CBD size must be 2 plus one byte per component",
            ));
        }
        let nb = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        if nb != num_comps {
            return Err(DecodeError::out_of_range(
                offset,
                "CBD component count does not match SIZ",
            ));
        }
        for (i, comp) in self.params.components.iter_mut().enumerate() {
            let b = payload[2 + i];
            comp.signed = b & 0x80 != 0;
            comp.precision = (b & 0x7F) + 1;
            if comp.precision > 38 {
                return Err(DecodeError::out_of_range(offset, "CBD precision exceeds 38 bits"));
            }
        }
        Ok(())
    }

    fn apply_tlm(&mut self, offset: usize, payload: &[u8]) -> Result<()> {
        if payload.len() < 2 {
            return Err(DecodeError::truncated(offset, "TLM marker shorter than its fixed fields"));
        }
        let stlm = payload[1];
        let layout = TlmLayout::parse(stlm, offset)?;
        let entry_size = layout.entry_size();
        let rest = &payload[2..];
        if entry_size == 0 || rest.len() % entry_size != 0 {
            return Err(DecodeError::malformed_marker(
                offset,
                "TLM entry list size is not a multiple of its entry size",
            ));
        }
        for chunk in rest.chunks(entry_size) {
            let tile_index = match layout.tile_index_bytes {
                0 => None,
                1 => Some(chunk[0] as u16),
                2 => Some(u16::from_be_bytes([chunk[0], chunk[1]])),
                _ => unreachable!("tile_index_bytes is validated to be 0, 1, or 2"),
            };
            let len_offset = layout.tile_index_bytes as usize;
            let tile_part_length = if layout.length_is_32bit {
                u32::from_be_bytes([
                    chunk[len_offset],
                    chunk[len_offset + 1],
                    chunk[len_offset + 2],
                    chunk[len_offset + 3],
                ])
            } else {
                u16::from_be_bytes([chunk[len_offset], chunk[len_offset + 1]]) as u32
            };
            self.tlm_index.add_entry(TlmEntry {
                tile_index,
                tile_part_length,
            });
        }
        Ok(())
    }

    /// PLM is structurally validated but not consumed: every tile-part's
    /// exact length is already known from its SOT's `Psot` field, so the
    /// PLM pre-allocation hint this decoder would otherwise use it for is
    /// redundant (SPEC_FULL §9 open question).
    fn apply_plm(&mut self, offset: usize, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Err(DecodeError::truncated(offset, "PLM marker is empty"));
        }
        if payload[1..].last().is_some_and(|&b| b & 0x80 != 0) {
            return Err(DecodeError::malformed_marker(
                offset,
                "PLM varint left dangling across a marker boundary",
            ));
        }
        Ok(())
    }

    /// Merges every PPM segment into `default_tcp.packet_headers`, so that
    /// cloning `default_tcp` at each tile's first tile-part hands that tile
    /// the whole merged pool. A conservative approximation for multi-tile
    /// PPM streams (SPEC_FULL §9 open question); PPT, being inherently
    /// per-tile, needs no such approximation.
    fn apply_ppm(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        if payload.is_empty() {
            return Err(DecodeError::truncated(offset, "PPM marker shorter than its Zppm field"));
        }
        if tile.is_some() {
            log::warn!("PPM marker found inside a tile-part header; treating it as main-header scoped");
        }
        self.params.default_tcp.packet_headers.extend_from_slice(&payload[1..]);
        Ok(())
    }

    fn apply_mct(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        if payload.len() < 2 {
            return Err(DecodeError::truncated(offset, "MCT marker shorter than its fixed fields"));
        }
        let zmct = u16::from_be_bytes([payload[0], payload[1]]);
        if zmct != 0 {
            log::warn!("ignoring MCT marker with Zmct != 0 (multi-segment MCT records unsupported)");
            return Ok(());
        }
        if payload.len() <= 6 {
            return Err(DecodeError::malformed_marker(offset, "MCT marker shorter than its fixed fields"));
        }
        let imct = u16::from_be_bytes([payload[2], payload[3]]);
        let index = (imct & 0xFF) as u8;
        let array_type = ((imct >> 8) & 0x3) as u8;
        let element_type = ((imct >> 10) & 0x3) as u8;
        let ymct = u16::from_be_bytes([payload[4], payload[5]]);
        if ymct != 0 {
            log::warn!("ignoring MCT marker spanning multiple markers (Ymct != 0)");
            return Ok(());
        }
        let data = payload[6..].to_vec();
        let scope = self.mct_scope_mut(tile);
        scope.pending.retain(|p| p.index != index);
        scope.pending.push(PendingMct {
            index,
            array_type,
            element_type,
            data,
        });
        Ok(())
    }

    /// Resolves a pending MCT record by its `Imct` index into either a
    /// decorrelation matrix (`array_type == 0`) or an offset vector
    /// (`array_type == 1`).
    fn resolve_mct_record(
        scope: &ScopeMctState,
        index: u8,
        num_comps: usize,
        offset: usize,
    ) -> Result<Option<(Vec<f32>, Vec<i32>)>> {
        let Some(pending) = scope.pending.iter().find(|p| p.index == index) else {
            return Ok(None);
        };
        let values = decode_mct_elements(&pending.data, pending.element_type, offset)?;
        match pending.array_type {
            0 => {
                if values.len() != num_comps * num_comps {
                    return Err(DecodeError::malformed_marker(
                        offset,
                        "MCT decorrelation matrix size does not match component count",
                    ));
                }
                Ok(Some((values.iter().map(|v| *v as f32).collect(), Vec::new())))
            }
            1 => {
                if values.len() != num_comps {
                    return Err(DecodeError::malformed_marker(
                        offset,
                        "MCT offset vector size does not match component count",
                    ));
                }
                Ok(Some((Vec::new(), values.iter().map(|v| *v as i32).collect())))
            }
            _ => {
                log::warn!("ignoring MCT record with unsupported array type {}", pending.array_type);
                Ok(None)
            }
        }
    }

    fn apply_mcc(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        if payload.len() < 2 {
            return Err(DecodeError::truncated(offset, "MCC marker shorter than its fixed fields"));
        }
        let zmcc = u16::from_be_bytes([payload[0], payload[1]]);
        if zmcc != 0 {
            log::warn!("ignoring MCC marker spanning multiple markers (Zmcc != 0)");
            return Ok(());
        }
        if payload.len() < 7 {
            return Err(DecodeError::malformed_marker(offset, "MCC marker shorter than its fixed fields"));
        }
        let mcc_index = payload[2];
        let ymcc = u16::from_be_bytes([payload[3], payload[4]]);
        if ymcc != 0 {
            log::warn!("ignoring MCC marker spanning multiple markers (Ymcc != 0)");
            return Ok(());
        }
        let nb_collections = u16::from_be_bytes([payload[5], payload[6]]);
        if nb_collections == 0 {
            return Ok(());
        }
        if nb_collections > 1 {
            log::warn!("ignoring MCC marker with more than one collection");
            return Ok(());
        }

        let mut pos = 7usize;
        if payload.len() < pos + 3 {
            return Err(DecodeError::malformed_marker(offset, "MCC collection header truncated"));
        }
        let xmcci = payload[pos];
        if xmcci != 1 {
            log::warn!("ignoring MCC collection type other than array-based decorrelation");
            return Ok(());
        }
        pos += 1;
        let nmcci = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
        pos += 2;
        let in_comp_bytes = if nmcci & 0x8000 != 0 { 2 } else { 1 };
        let nb_comps = (nmcci & 0x7FFF) as usize;
        if payload.len() < pos + in_comp_bytes * nb_comps {
            return Err(DecodeError::malformed_marker(offset, "MCC input component list truncated"));
        }
        for i in 0..nb_comps {
            if read_index(&payload[pos + i * in_comp_bytes..pos + (i + 1) * in_comp_bytes]) as usize != i
            {
                log::warn!("ignoring MCC marker with shuffled component indices");
                return Ok(());
            }
        }
        pos += in_comp_bytes * nb_comps;

        if payload.len() < pos + 2 {
            return Err(DecodeError::malformed_marker(offset, "MCC output component list truncated"));
        }
        let mmcci = u16::from_be_bytes([payload[pos], payload[pos + 1]]);
        pos += 2;
        let out_comp_bytes = if mmcci & 0x8000 != 0 { 2 } else { 1 };
        let out_nb_comps = (mmcci & 0x7FFF) as usize;
        if out_nb_comps != nb_comps {
            log::warn!("ignoring MCC marker whose input/output component counts differ");
            return Ok(());
        }
        if payload.len() < pos + out_comp_bytes * out_nb_comps {
            return Err(DecodeError::malformed_marker(offset, "MCC output component list truncated"));
        }
        for i in 0..out_nb_comps {
            if read_index(&payload[pos + i * out_comp_bytes..pos + (i + 1) * out_comp_bytes]) as usize
                != i
            {
                log::warn!("ignoring MCC marker with shuffled component indices");
                return Ok(());
            }
        }
        pos += out_comp_bytes * out_nb_comps;

        if payload.len() < pos + 3 {
            return Err(DecodeError::malformed_marker(offset, "MCC transform selector truncated"));
        }
        let tmcci = u32::from_be_bytes([0, payload[pos], payload[pos + 1], payload[pos + 2]]);
        let decorr_index = (tmcci & 0xFF) as u8;
        let offset_index = ((tmcci >> 8) & 0xFF) as u8;

        let scope = self.mct_scope_mut(tile).clone();
        let decorr = if decorr_index != 0 {
            Self::resolve_mct_record(&scope, decorr_index, nb_comps, offset)?
        } else {
            None
        };
        let off = if offset_index != 0 {
            Self::resolve_mct_record(&scope, offset_index, nb_comps, offset)?
        } else {
            None
        };
        if decorr_index != 0 && decorr.is_none() {
            return Err(DecodeError::out_of_range(
                offset,
                "MCC references an MCT decorrelation record that was never defined",
            ));
        }
        if offset_index != 0 && off.is_none() {
            return Err(DecodeError::out_of_range(
                offset,
                "MCC references an MCT offset record that was never defined",
            ));
        }
        let matrix = decorr.map(|(m, _)| m).unwrap_or_default();
        let offsets = off.map(|(_, o)| o).unwrap_or_default();

        let record = MctRecord {
            index: mcc_index,
            num_comps: nb_comps as u16,
            matrix,
            offsets,
        };
        let tcp = self.tcp_mut(tile);
        tcp.mct_records.push(record);
        let pos_in_vec = tcp.mct_records.len() - 1;
        self.mct_scope_mut(tile).mcc_positions.insert(mcc_index, pos_in_vec);
        Ok(())
    }

    fn apply_mco(&mut self, offset: usize, payload: &[u8], tile: Option<u16>) -> Result<()> {
        if payload.is_empty() {
            return Err(DecodeError::truncated(offset, "MCO marker is empty"));
        }
        let nb_stages = payload[0];
        if payload.len() != 1 + nb_stages as usize {
            return Err(DecodeError::malformed_marker(
                offset,
                "MCO size does not match its declared stage count",
            ));
        }
        if nb_stages > 1 {
            log::warn!("ignoring MCO marker with more than one transformation stage");
            return Ok(());
        }
        if nb_stages == 0 {
            self.tcp_mut(tile).mcc_decorrelation = None;
            return Ok(());
        }
        let imco = payload[1];
        let resolved = self.mct_scope_mut(tile).mcc_positions.get(&imco).copied();
        match resolved {
            Some(pos) => {
                self.tcp_mut(tile).mcc_decorrelation = Some(pos);
                Ok(())
            }
            None => Err(DecodeError::out_of_range(
                offset,
                "MCO references an MCC record that was never defined",
            )),
        }
    }
}

/// Parses `data` into a [`DecodedStream`] (SPEC_FULL §4.2). This is the
/// crate's sole entry point into marker parsing; `tile_processor` consumes
/// its output.
pub(crate) fn read(data: &[u8], runtime: &Runtime) -> Result<DecodedStream> {
    let mut stream = ByteStream::new(data);
    parse_soc(&mut stream)?;
    let params = parse_siz(&mut stream)?;
    let num_tiles = params.num_tiles() as usize;

    let mut reader = CodestreamReader {
        stream,
        runtime,
        state: StateMask::MH_MAIN,
        params,
        plt_index: GlobalPacketLengthIndex::new(),
        tlm_index: TileLengthIndex::new(),
        tile_customized: vec![false; num_tiles],
        main_mct: ScopeMctState::default(),
        tile_mct: HashMap::new(),
        ended_with_eoc: false,
    };
    reader.run()?;
    reader.tlm_index.validate(reader.params.num_tiles())?;
    for idx in 0..reader.params.tcps.len() {
        if !reader.params.tcps[idx].tile_part_data.is_empty() {
            reader.params.validate_tile(idx as u16)?;
        }
    }

    Ok(DecodedStream {
        params: reader.params,
        plt_index: reader.plt_index,
        ended_with_eoc: reader.ended_with_eoc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_siz(numcomps: u16, x1: u32, y1: u32, tdx: u32, tdy: u32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&marker::SIZ.to_be_bytes());
        let mut body = Vec::new();
        body.extend_from_slice(&0u16.to_be_bytes()); // Rsiz
        body.extend_from_slice(&x1.to_be_bytes());
        body.extend_from_slice(&y1.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes()); // X0
        body.extend_from_slice(&0u32.to_be_bytes()); // Y0
        body.extend_from_slice(&tdx.to_be_bytes());
        body.extend_from_slice(&tdy.to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes()); // TX0
        body.extend_from_slice(&0u32.to_be_bytes()); // TY0
        body.extend_from_slice(&numcomps.to_be_bytes());
        for _ in 0..numcomps {
            body.push(7); // 8-bit unsigned
            body.push(1); // dx
            body.push(1); // dy
        }
        b.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        b.extend_from_slice(&body);
        b
    }

    #[test]
    fn parses_siz_geometry_and_components() {
        let siz = minimal_siz(3, 8, 8, 8, 8);
        let mut stream = ByteStream::new(&siz);
        let params = parse_siz(&mut stream).unwrap();
        assert_eq!(params.x1, 8);
        assert_eq!(params.y1, 8);
        assert_eq!(params.components.len(), 3);
        assert_eq!(params.num_tiles(), 1);
        assert_eq!(params.tcps.len(), 1);
    }

    #[test]
    fn rejects_siz_with_mismatched_component_count() {
        let mut siz = minimal_siz(2, 8, 8, 8, 8);
        // Corrupt Csiz to claim 3 components while only 2 are encoded.
        let len = siz.len();
        siz[len - 2 * 3 - 2] = 0;
        siz[len - 2 * 3 - 1] = 3;
        let mut stream = ByteStream::new(&siz);
        assert!(parse_siz(&mut stream).is_err());
    }

    #[test]
    fn spcod_spcoc_defaults_precinct_size_when_unset() {
        // numresolutions=5 (4+1), cblkw=4(2+2), cblkh=4(2+2), style=0, qmfbid=1 (reversible)
        let data = [4, 2, 2, 0, 1];
        let t = parse_spcod_spcoc(&data, false, 0).unwrap();
        assert_eq!(t.num_resolutions, 5);
        assert_eq!(t.cblk_w_exp, 4);
        assert_eq!(t.cblk_h_exp, 4);
        assert!(t.reversible);
        assert_eq!(t.precinct_sizes.len(), 5);
        assert_eq!(t.precinct_sizes[0], (15, 15));
    }

    #[test]
    fn spcod_spcoc_rejects_mixed_ht_style() {
        let data = [4, 2, 2, 0b1000_0000, 1];
        assert!(parse_spcod_spcoc(&data, false, 0).is_err());
    }

    #[test]
    fn sqcd_sqcc_expounded_reads_one_step_per_band() {
        // guard_bits=2, style=2 (expounded); one band: expn=5, mant=0
        let sqcd = (2u8 << 5) | 2;
        let v: u16 = 5 << 11;
        let payload = [sqcd, (v >> 8) as u8, (v & 0xFF) as u8];
        let (style, guard_bits, steps) = parse_sqcd_sqcc(&payload, 0).unwrap();
        assert_eq!(style, QuantStyle::ScalarExpounded);
        assert_eq!(guard_bits, 2);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].expn, 5);
    }

    #[test]
    fn sqcd_sqcc_derived_extrapolates_remaining_bands() {
        let sqcd = (1u8 << 5) | 1; // derived
        let v: u16 = 8 << 11;
        let payload = [sqcd, (v >> 8) as u8, (v & 0xFF) as u8];
        let (style, _, steps) = parse_sqcd_sqcc(&payload, 0).unwrap();
        assert_eq!(style, QuantStyle::ScalarDerived);
        assert_eq!(steps.len(), 3 * 33 - 2);
        assert_eq!(steps[0].expn, 8);
        assert_eq!(steps[1].expn, 8);
        assert_eq!(steps[4].expn, 7);
    }

    #[test]
    fn full_minimal_codestream_parses_to_one_tile() {
        let mut cs = Vec::new();
        cs.extend_from_slice(&marker::SOC.to_be_bytes());
        cs.extend_from_slice(&minimal_siz(1, 4, 4, 4, 4));

        // COD: csty=0, prog=LRCP(0), layers=1, mct=0, SPcod: 1 res(0+1),
        // cblkw=4(2+2), cblkh=4(2+2), style=0, qmfbid=1 (reversible).
        cs.extend_from_slice(&marker::COD.to_be_bytes());
        let cod_body = [0u8, 0, 0, 1, 0, 0, 2, 2, 0, 1];
        cs.extend_from_slice(&((cod_body.len() + 2) as u16).to_be_bytes());
        cs.extend_from_slice(&cod_body);

        // QCD: style=0 (none), guard_bits=2, one band, expn=0.
        cs.extend_from_slice(&marker::QCD.to_be_bytes());
        let qcd_body = [(2u8 << 5), 0];
        cs.extend_from_slice(&((qcd_body.len() + 2) as u16).to_be_bytes());
        cs.extend_from_slice(&qcd_body);

        // SOT: Isot=0, Psot=0 (rest of codestream), TPsot=0, TNsot=1.
        cs.extend_from_slice(&marker::SOT.to_be_bytes());
        let mut sot_body = Vec::new();
        sot_body.extend_from_slice(&0u16.to_be_bytes());
        sot_body.extend_from_slice(&0u32.to_be_bytes());
        sot_body.push(0);
        sot_body.push(1);
        cs.extend_from_slice(&((sot_body.len() + 2) as u16).to_be_bytes());
        cs.extend_from_slice(&sot_body);

        cs.extend_from_slice(&marker::SOD.to_be_bytes());
        cs.extend_from_slice(&[0xAA, 0xBB, 0xCC]); // opaque tile-part payload
        cs.extend_from_slice(&marker::EOC.to_be_bytes());

        let runtime = Runtime::default();
        let stream = read(&cs, &runtime).unwrap();
        assert!(stream.ended_with_eoc);
        assert_eq!(stream.params.tcps.len(), 1);
        assert_eq!(stream.params.tcps[0].tile_part_data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(stream.params.tcps[0].progression, ProgressionOrder::Lrcp);
    }

    #[test]
    fn unknown_marker_between_known_markers_is_skipped() {
        let mut cs = Vec::new();
        cs.extend_from_slice(&marker::SOC.to_be_bytes());
        cs.extend_from_slice(&minimal_siz(1, 4, 4, 4, 4));
        // Two garbage bytes that do not form a recognised marker code.
        cs.extend_from_slice(&[0x12, 0x34]);
        cs.extend_from_slice(&marker::EOC.to_be_bytes());

        let runtime = Runtime::default();
        let stream = read(&cs, &runtime).unwrap();
        assert!(stream.ended_with_eoc);
    }

    #[test]
    fn truncated_codestream_without_eoc_reports_no_eoc_not_an_error() {
        let mut cs = Vec::new();
        cs.extend_from_slice(&marker::SOC.to_be_bytes());
        cs.extend_from_slice(&minimal_siz(1, 4, 4, 4, 4));
        let runtime = Runtime::default();
        let stream = read(&cs, &runtime).unwrap();
        assert!(!stream.ended_with_eoc);
    }
}
