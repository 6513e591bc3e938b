//! Marker codes and the legal-state bitmask each one is recognised in
//! (SPEC_FULL §4.2, §6). Grounded on the teacher's `J2KState`/marker-dispatch
//! table in `j2k.rs`, reworked as data instead of a C function-pointer table.

use bitflags::bitflags;

macro_rules! markers {
    ($($name:ident = $code:expr),* $(,)?) => {
        $(pub(crate) const $name: u16 = $code;)*

        pub(crate) fn marker_name(code: u16) -> Option<&'static str> {
            match code {
                $($code => Some(stringify!($name)),)*
                _ => None,
            }
        }
    };
}

markers! {
    SOC = 0xFF4F,
    SIZ = 0xFF51,
    CAP = 0xFF50,
    COD = 0xFF52,
    COC = 0xFF53,
    QCD = 0xFF5C,
    QCC = 0xFF5D,
    POC = 0xFF5F,
    CRG = 0xFF63,
    COM = 0xFF64,
    TLM = 0xFF55,
    PLM = 0xFF57,
    PLT = 0xFF58,
    PPM = 0xFF60,
    PPT = 0xFF61,
    MCT = 0xFF74,
    MCC = 0xFF75,
    MCO = 0xFF77,
    CBD = 0xFF78,
    RGN = 0xFF5E,
    SOT = 0xFF90,
    SOP = 0xFF91,
    EPH = 0xFF92,
    SOD = 0xFF93,
    EOC = 0xFFD9,
}

bitflags! {
    /// States in which a marker is legal to appear. Mirrors the teacher's
    /// `J2K_STATE_*` constants; `MarkerRegistry::legal_in` checks a marker's
    /// mask against the reader's current state.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub(crate) struct StateMask: u32 {
        /// Immediately after SOC, expecting SIZ.
        const MH_SOC  = 0b0000_0001;
        /// Main header, after SIZ, before the first tile-part.
        const MH_MAIN = 0b0000_0010;
        /// Tile-part header, immediately after SOT.
        const TPH_SOT = 0b0000_0100;
        /// Tile-part header, between SOT and SOD.
        const TPH     = 0b0000_1000;
        /// After SOD, inside tile-part coded data.
        const DATA    = 0b0001_0000;
        /// After EOC.
        const EOC     = 0b0010_0000;
    }
}

pub(crate) const MAIN_HEADER_MARKERS: StateMask = StateMask::from_bits_truncate(
    StateMask::MH_MAIN.bits() | StateMask::TPH_SOT.bits(),
);

/// Returns the legal-state mask for a given marker code, or `None` for an
/// unrecognised marker (handled by the unknown-marker skip-until-known
/// recovery in `codestream_reader`).
pub(crate) fn legal_states(code: u16) -> Option<StateMask> {
    use StateMask as S;
    Some(match code {
        SOC => S::empty(), // only ever consumed once, before any state exists
        SIZ => S::MH_SOC,
        CAP | COD | COC | QCD | QCC | POC | CRG | COM | TLM | PLM | PPM | MCT | MCC | MCO
        | CBD => S::from_bits_truncate(S::MH_MAIN.bits() | S::TPH.bits()),
        RGN => S::from_bits_truncate(S::MH_MAIN.bits() | S::TPH.bits()),
        PLT | PPT => S::TPH,
        SOT => S::from_bits_truncate(S::MH_MAIN.bits() | S::TPH_SOT.bits() | S::DATA.bits()),
        SOD => S::TPH,
        SOP | EPH => S::DATA,
        EOC => S::from_bits_truncate(S::TPH_SOT.bits() | S::DATA.bits()),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siz_only_legal_right_after_soc() {
        assert_eq!(legal_states(SIZ), Some(StateMask::MH_SOC));
        assert!(!legal_states(SIZ)
            .unwrap()
            .contains(StateMask::DATA));
    }

    #[test]
    fn unknown_marker_has_no_legal_states() {
        assert_eq!(legal_states(0xFF99), None);
    }

    #[test]
    fn marker_name_roundtrips() {
        assert_eq!(marker_name(SOT), Some("SOT"));
        assert_eq!(marker_name(0xFF99), None);
    }
}
