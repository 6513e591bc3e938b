//! Persistent decoded parameters (SPEC_FULL §3): image geometry, per-tile
//! `Tcp`, per-component `Tccp`. Grounded on the teacher's `opj_image_t`,
//! `opj_tcp_t` and `opj_tccp_t` in `j2k.rs`, rewritten as owned, pointer-free
//! structs with scoping tracked by small enums instead of a `fromQCC` /
//! `fromTileHeader` bit pair on raw state.

use smallvec::SmallVec;

use crate::error::{DecodeError, Result};

/// Progression order, as encoded in the COD marker's `SGcod` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProgressionOrder {
    Lrcp,
    Rlcp,
    Rpcl,
    Pcrl,
    Cprl,
}

impl ProgressionOrder {
    pub(crate) fn from_code(code: u8, offset: usize) -> Result<Self> {
        Ok(match code {
            0 => ProgressionOrder::Lrcp,
            1 => ProgressionOrder::Rlcp,
            2 => ProgressionOrder::Rpcl,
            3 => ProgressionOrder::Pcrl,
            4 => ProgressionOrder::Cprl,
            _ => {
                return Err(DecodeError::out_of_range(
                    offset,
                    "progression order must be 0..=4",
                ))
            }
        })
    }
}

/// Quantization style (SIZ/QCD/QCC `Sqcd` low two bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuantStyle {
    NoQuant,
    ScalarDerived,
    ScalarExpounded,
}

/// A single sub-band step size: (exponent, mantissa), packed as the standard
/// does in a 16-bit `SPqcd`/`SPqcc` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StepSize {
    pub(crate) expn: u8,
    pub(crate) mant: u16,
}

/// Tracks which marker last bound a scoped parameter, implementing the
/// precedence rule of SPEC_FULL §4.2: main-QCD < main-QCC < tile-QCD <
/// tile-QCC (and identically for COD/COC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum ScopeOrigin {
    MainDefault,
    MainComponent,
    TileDefault,
    TileComponent,
}

/// Per-component tile coding parameters (SPEC_FULL §3 TCCP).
#[derive(Debug, Clone)]
pub(crate) struct Tccp {
    pub(crate) num_resolutions: u8,
    pub(crate) cblk_w_exp: u8,
    pub(crate) cblk_h_exp: u8,
    pub(crate) cblk_style: u8,
    /// `true` = reversible (5/3), `false` = irreversible (9/7).
    pub(crate) reversible: bool,
    /// Precinct exponents `(pw, ph)` per resolution level, lowest first.
    pub(crate) precinct_sizes: SmallVec<[(u8, u8); 33]>,
    pub(crate) quant_style: QuantStyle,
    pub(crate) num_guard_bits: u8,
    pub(crate) step_sizes: SmallVec<[StepSize; 97]>,
    pub(crate) roi_shift: u8,
    pub(crate) cod_origin: ScopeOrigin,
    pub(crate) qcd_origin: ScopeOrigin,
}

impl Default for Tccp {
    fn default() -> Self {
        Tccp {
            num_resolutions: 6,
            cblk_w_exp: 6,
            cblk_h_exp: 6,
            cblk_style: 0,
            reversible: true,
            precinct_sizes: SmallVec::new(),
            quant_style: QuantStyle::NoQuant,
            num_guard_bits: 2,
            step_sizes: SmallVec::new(),
            roi_shift: 0,
            cod_origin: ScopeOrigin::MainDefault,
            qcd_origin: ScopeOrigin::MainDefault,
        }
    }
}

impl Tccp {
    /// SPEC_FULL §8.2: `cblkw`, `cblkh` in [2,10] and `cblkw+cblkh <= 12`
    /// when the HT code-block style bit is not set.
    pub(crate) fn validate_cblk_bounds(&self, offset: usize) -> Result<()> {
        const HT_STYLE_BIT: u8 = 1 << 6;
        if self.cblk_style & HT_STYLE_BIT != 0 {
            return Ok(());
        }
        if !(2..=10).contains(&self.cblk_w_exp) || !(2..=10).contains(&self.cblk_h_exp) {
            return Err(DecodeError::out_of_range(
                offset,
                "code-block exponents must lie in [2,10]",
            ));
        }
        if self.cblk_w_exp + self.cblk_h_exp > 12 {
            return Err(DecodeError::out_of_range(
                offset,
                "cblkw + cblkh must not exceed 12",
            ));
        }
        Ok(())
    }

    /// May an incoming marker at `incoming` precedence overwrite the
    /// quantization parameters, given the existing `self.qcd_origin`?
    pub(crate) fn accepts_qcd(&self, incoming: ScopeOrigin) -> bool {
        incoming >= self.qcd_origin
    }

    pub(crate) fn accepts_cod(&self, incoming: ScopeOrigin) -> bool {
        incoming >= self.cod_origin
    }
}

/// A custom decorrelation record from an MCT/MCC marker pair (SPEC_FULL
/// §4.10): a `numComps x numComps` matrix plus per-component int32 offsets.
/// Referenced by *index*, never by pointer, per §9's cyclic-graph note.
#[derive(Debug, Clone)]
pub(crate) struct MctRecord {
    /// The MCT/MCC marker's `Imct`/`Imcc` index byte, kept only to resolve
    /// cross-references while parsing; meaningless once parsing is done.
    pub(crate) index: u8,
    pub(crate) num_comps: u16,
    pub(crate) matrix: Vec<f32>,
    pub(crate) offsets: Vec<i32>,
}

/// A non-interpreted COM marker payload (SPEC_FULL §10).
#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub is_text: bool,
    pub bytes: Vec<u8>,
}

/// A single progression-order-change entry (POC marker, one compound
/// progression segment).
#[derive(Debug, Clone, Copy)]
pub(crate) struct PocEntry {
    pub(crate) res_start: u8,
    pub(crate) comp_start: u16,
    pub(crate) layer_end: u16,
    pub(crate) res_end: u8,
    pub(crate) comp_end: u16,
    pub(crate) progression: ProgressionOrder,
}

/// Per-tile coding parameters (SPEC_FULL §3 TCP).
#[derive(Debug, Clone)]
pub(crate) struct Tcp {
    pub(crate) progression: ProgressionOrder,
    pub(crate) num_layers: u16,
    pub(crate) mct: bool,
    pub(crate) poc: SmallVec<[PocEntry; 4]>,
    pub(crate) tccps: Vec<Tccp>,
    pub(crate) mct_records: Vec<MctRecord>,
    /// Index into `mct_records` selected by the current MCC binding for the
    /// decorrelation transform, if any (`None` selects the fixed RCT/ICT).
    pub(crate) mcc_decorrelation: Option<usize>,
    /// Merged PPT packet-header byte stream for this tile, if PPT/PPM were
    /// used instead of inline packet headers.
    pub(crate) packet_headers: Vec<u8>,
    /// Concatenated tile-part payload bytes (post-SOD) for this tile.
    pub(crate) tile_part_data: Vec<u8>,
}

impl Tcp {
    pub(crate) fn new(num_components: usize) -> Self {
        Tcp {
            progression: ProgressionOrder::Lrcp,
            num_layers: 1,
            mct: false,
            poc: SmallVec::new(),
            tccps: vec![Tccp::default(); num_components],
            mct_records: Vec::new(),
            mcc_decorrelation: None,
            packet_headers: Vec::new(),
            tile_part_data: Vec::new(),
        }
    }

    pub(crate) fn max_decompositions(&self) -> u8 {
        self.tccps
            .iter()
            .map(|t| t.num_resolutions.saturating_sub(1))
            .max()
            .unwrap_or(0)
    }
}

/// One image component's static geometry (SPEC_FULL §3 Image).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ComponentInfo {
    pub(crate) dx: u8,
    pub(crate) dy: u8,
    pub(crate) precision: u8,
    pub(crate) signed: bool,
}

/// The frozen, decoded coding parameters for an entire codestream
/// (SPEC_FULL §3, §5 "CodingParams is frozen after main-header parsing").
#[derive(Debug, Clone)]
pub(crate) struct CodingParams {
    pub(crate) x0: u32,
    pub(crate) y0: u32,
    pub(crate) x1: u32,
    pub(crate) y1: u32,
    pub(crate) tx0: u32,
    pub(crate) ty0: u32,
    pub(crate) tdx: u32,
    pub(crate) tdy: u32,
    pub(crate) components: Vec<ComponentInfo>,
    pub(crate) default_tcp: Tcp,
    pub(crate) tcps: Vec<Tcp>,
    pub(crate) component_registration: Vec<(u16, u16)>,
    pub(crate) comments: Vec<CommentRecord>,
}

impl CodingParams {
    pub(crate) fn tile_grid_width(&self) -> u32 {
        (self.x1 - self.tx0).div_ceil(self.tdx)
    }

    pub(crate) fn tile_grid_height(&self) -> u32 {
        (self.y1 - self.ty0).div_ceil(self.tdy)
    }

    pub(crate) fn num_tiles(&self) -> u32 {
        self.tile_grid_width() * self.tile_grid_height()
    }

    pub(crate) fn validate_geometry(&self, offset: usize) -> Result<()> {
        if self.x1 <= self.x0 || self.y1 <= self.y0 {
            return Err(DecodeError::out_of_range(offset, "image extent must be positive"));
        }
        if self.tdx == 0 || self.tdy == 0 {
            return Err(DecodeError::out_of_range(offset, "tile size must be positive"));
        }
        if self.components.is_empty() || self.components.len() > 16384 {
            return Err(DecodeError::out_of_range(
                offset,
                "component count must lie in [1,16384]",
            ));
        }
        if self.num_tiles() > 65535 {
            return Err(DecodeError::out_of_range(offset, "tile grid exceeds 65535 tiles"));
        }
        Ok(())
    }

    /// SPEC_FULL §4.2 post-header validation: every irreversible TCCP must
    /// carry quantization, and the main/tile QCD step-size count must match
    /// the decomposition count it scopes.
    pub(crate) fn validate_tile(&self, tile_index: u16) -> Result<()> {
        let tcp = &self.tcps[tile_index as usize];
        for tccp in &tcp.tccps {
            if !tccp.reversible && tccp.quant_style == QuantStyle::NoQuant {
                return Err(DecodeError::QuantizationScopeViolation {
                    tile: tile_index,
                    detail: "irreversible (9/7) component requires quantization",
                });
            }
            if tccp.quant_style != QuantStyle::ScalarDerived {
                let max_decomps = tccp.num_resolutions.saturating_sub(1) as usize;
                let required = 3 * max_decomps + 1;
                if tccp.step_sizes.len() < required {
                    return Err(DecodeError::QuantizationScopeViolation {
                        tile: tile_index,
                        detail: "QCD/QCC step-size count inconsistent with decomposition count",
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> CodingParams {
        CodingParams {
            x0: 0,
            y0: 0,
            x1: 4,
            y1: 4,
            tx0: 0,
            ty0: 0,
            tdx: 2,
            tdy: 2,
            components: vec![ComponentInfo {
                dx: 1,
                dy: 1,
                precision: 8,
                signed: false,
            }],
            default_tcp: Tcp::new(1),
            tcps: vec![Tcp::new(1); 4],
            component_registration: Vec::new(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn tile_grid_matches_property_one() {
        let params = sample_params();
        assert_eq!(params.tile_grid_width(), 2);
        assert_eq!(params.tile_grid_height(), 2);
        assert_eq!(params.num_tiles(), 4);
    }

    #[test]
    fn scope_precedence_is_monotone() {
        assert!(ScopeOrigin::TileComponent > ScopeOrigin::TileDefault);
        assert!(ScopeOrigin::TileDefault > ScopeOrigin::MainComponent);
        assert!(ScopeOrigin::MainComponent > ScopeOrigin::MainDefault);
    }

    #[test]
    fn cblk_bounds_reject_oversized_blocks() {
        let mut tccp = Tccp::default();
        tccp.cblk_w_exp = 10;
        tccp.cblk_h_exp = 10;
        assert!(tccp.validate_cblk_bounds(0).is_err());
    }

    #[test]
    fn irreversible_without_quant_is_scope_violation() {
        let mut params = sample_params();
        params.tcps[0].tccps[0].reversible = false;
        params.tcps[0].tccps[0].quant_style = QuantStyle::NoQuant;
        assert!(matches!(
            params.validate_tile(0),
            Err(DecodeError::QuantizationScopeViolation { .. })
        ));
    }
}
