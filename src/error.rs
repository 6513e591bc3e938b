//! The decoder's error taxonomy (see SPEC_FULL.md §7).
//!
//! Every fallible operation in the crate returns [`Result<T>`], a thin alias
//! over [`DecodeError`]. Variants that can occur mid-stream carry the byte
//! offset at which the failure was observed, taken from
//! [`crate::byte_stream::ByteStream::tell`] at the point of failure.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, DecodeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated codestream at byte {offset}: {detail}")]
    Truncated { offset: usize, detail: &'static str },

    #[error("malformed marker at byte {offset}: {detail}")]
    MalformedMarker { offset: usize, detail: &'static str },

    #[error("marker 0x{marker:04X} out of place in state {state:?} at byte {offset}")]
    MarkerOutOfPlace {
        offset: usize,
        marker: u16,
        state: &'static str,
    },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    #[error("unknown marker 0x{marker:04X} at byte {offset}")]
    UnknownMarker { offset: usize, marker: u16 },

    #[error("parameter out of range at byte {offset}: {detail}")]
    ParameterOutOfRange { offset: usize, detail: &'static str },

    #[error("quantization scope violation for tile {tile}: {detail}")]
    QuantizationScopeViolation { tile: u16, detail: &'static str },

    #[error("Tier-1 decode failure in tile {tile} component {comp}: {detail}")]
    T1DecodeFailure {
        tile: u16,
        comp: u16,
        detail: &'static str,
    },

    #[error("allocation refused: {0}")]
    AllocationFailure(&'static str),

    #[error("seek requested on a non-seekable stream")]
    Unseekable,
}

impl DecodeError {
    pub(crate) fn truncated(offset: usize, detail: &'static str) -> Self {
        DecodeError::Truncated { offset, detail }
    }

    pub(crate) fn malformed_marker(offset: usize, detail: &'static str) -> Self {
        DecodeError::MalformedMarker { offset, detail }
    }

    pub(crate) fn out_of_range(offset: usize, detail: &'static str) -> Self {
        DecodeError::ParameterOutOfRange { offset, detail }
    }

    /// Whether this error should abort the whole codestream rather than just
    /// the tile currently being processed (§7 policy column).
    pub fn is_fatal_to_codestream(&self) -> bool {
        matches!(
            self,
            DecodeError::Truncated { .. } | DecodeError::MarkerOutOfPlace { .. }
        )
    }
}
