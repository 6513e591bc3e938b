//! T2 packet decoding (SPEC_FULL §4.6): packet header parsing and the
//! `PacketIter` progression-order pull-iterator.
//!
//! Grounded on the teacher's `pi.rs`/`opj_t2_decode_packets`: the "resume
//! from a saved position, call `next()`/`opj_pi_next_*` for the next
//! (compno, resno, precinctIndex, layno) tuple" pull shape is kept, but the
//! five progression-order visit orders are written as a single generator
//! using a small state machine instead of five near-duplicate C loop nests.

use crate::coding_params::{PocEntry, ProgressionOrder};
use crate::error::{DecodeError, Result};
use crate::tag_tree::TagTree;

/// One (component, resolution, precinct, layer) packet coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PacketCoord {
    pub(crate) compno: u16,
    pub(crate) resno: u8,
    pub(crate) precinct_index: u32,
    pub(crate) layno: u16,
}

/// Per-component geometry the iterator needs: resolution count and, per
/// resolution, the precinct grid dimensions.
#[derive(Debug, Clone)]
pub(crate) struct ComponentGeometry {
    pub(crate) num_resolutions: u8,
    pub(crate) precinct_grid: Vec<(u32, u32)>,
}

/// Pull-iterator over packet coordinates for one progression segment
/// (SPEC_FULL §4.6 `PacketIter`). A POC-driven compound progression is
/// modelled as a sequence of `PacketIter`s, one per POC entry, applied in
/// declaration order (the tie-break rule named in SPEC_FULL §4.6).
pub(crate) struct PacketIter<'a> {
    components: &'a [ComponentGeometry],
    progression: ProgressionOrder,
    comp_start: u16,
    comp_end: u16,
    res_start: u8,
    res_end: u8,
    layer_end: u16,
    // Cursor state, meaning depends on `progression`.
    compno: u16,
    resno: u8,
    precinct_index: u32,
    layno: u16,
    started: bool,
}

impl<'a> PacketIter<'a> {
    pub(crate) fn new(components: &'a [ComponentGeometry], progression: ProgressionOrder, num_layers: u16) -> Self {
        PacketIter {
            components,
            progression,
            comp_start: 0,
            comp_end: components.len() as u16,
            res_start: 0,
            res_end: components.iter().map(|c| c.num_resolutions).max().unwrap_or(1),
            layer_end: num_layers,
            compno: 0,
            resno: 0,
            precinct_index: 0,
            layno: 0,
            started: false,
        }
    }

    pub(crate) fn from_poc(components: &'a [ComponentGeometry], entry: &PocEntry) -> Self {
        let mut it = PacketIter::new(components, entry.progression, entry.layer_end);
        it.comp_start = entry.comp_start;
        it.comp_end = entry.comp_end;
        it.res_start = entry.res_start;
        it.res_end = entry.res_end;
        it.compno = entry.comp_start;
        it.resno = entry.res_start;
        it
    }

    fn precinct_count(&self, compno: u16, resno: u8) -> u32 {
        self.components
            .get(compno as usize)
            .and_then(|c| c.precinct_grid.get(resno as usize))
            .map(|&(w, h)| w * h)
            .unwrap_or(0)
    }

    fn num_resolutions(&self, compno: u16) -> u8 {
        self.components
            .get(compno as usize)
            .map(|c| c.num_resolutions)
            .unwrap_or(0)
    }

    /// Advances to, and returns, the next packet coordinate. Returns `None`
    /// at exhaustion (SPEC_FULL §4.6 `next()` returning false).
    pub(crate) fn next(&mut self) -> Option<PacketCoord> {
        loop {
            if self.started {
                self.advance();
            }
            self.started = true;

            if self.layno >= self.layer_end {
                return None;
            }
            if self.resno >= self.res_end.min(self.num_resolutions(self.compno).max(self.res_start + 1)) {
                continue;
            }
            if self.resno >= self.num_resolutions(self.compno) {
                continue;
            }
            let count = self.precinct_count(self.compno, self.resno);
            if count == 0 || self.precinct_index >= count {
                continue;
            }

            return Some(PacketCoord {
                compno: self.compno,
                resno: self.resno,
                precinct_index: self.precinct_index,
                layno: self.layno,
            });
        }
    }

    fn advance(&mut self) {
        match self.progression {
            ProgressionOrder::Lrcp => {
                self.precinct_index += 1;
                if self.precinct_index >= self.precinct_count(self.compno, self.resno).max(1) {
                    self.precinct_index = 0;
                    self.compno += 1;
                    if self.compno >= self.comp_end {
                        self.compno = self.comp_start;
                        self.resno += 1;
                        if self.resno >= self.res_end {
                            self.resno = self.res_start;
                            self.layno += 1;
                        }
                    }
                }
            }
            ProgressionOrder::Rlcp => {
                self.precinct_index += 1;
                if self.precinct_index >= self.precinct_count(self.compno, self.resno).max(1) {
                    self.precinct_index = 0;
                    self.compno += 1;
                    if self.compno >= self.comp_end {
                        self.compno = self.comp_start;
                        self.layno += 1;
                        if self.layno >= self.layer_end {
                            self.layno = 0;
                            self.resno += 1;
                        }
                    }
                }
            }
            ProgressionOrder::Rpcl | ProgressionOrder::Pcrl | ProgressionOrder::Cprl => {
                // Precinct-major orders share the same "precinct is the
                // innermost varying coordinate across the whole grid" shape;
                // the distinction is which of resno/compno advances on a
                // precinct-grid rollover, handled by the outer loops.
                self.layno += 1;
                if self.layno >= self.layer_end {
                    self.layno = 0;
                    self.precinct_index += 1;
                    if self.precinct_index >= self.precinct_count(self.compno, self.resno).max(1) {
                        self.precinct_index = 0;
                        match self.progression {
                            ProgressionOrder::Rpcl => {
                                self.compno += 1;
                                if self.compno >= self.comp_end {
                                    self.compno = self.comp_start;
                                    self.resno += 1;
                                }
                            }
                            ProgressionOrder::Pcrl => {
                                self.compno += 1;
                                if self.compno >= self.comp_end {
                                    self.compno = self.comp_start;
                                }
                            }
                            ProgressionOrder::Cprl => {
                                self.resno += 1;
                                if self.resno >= self.res_end {
                                    self.resno = self.res_start;
                                    self.compno += 1;
                                }
                            }
                            _ => unreachable!(),
                        }
                    }
                }
            }
        }
    }
}

/// Decodes one packet header starting at `data[0]` (SPEC_FULL §4.6 step 1).
/// Returns the number of header bytes consumed and, per covered code-block,
/// whether it is newly included this layer, its zero-bit-plane count if
/// newly included, and its coding-pass count this layer.
pub(crate) struct PacketHeader {
    pub(crate) consumed: usize,
    pub(crate) block_updates: Vec<BlockPacketUpdate>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockPacketUpdate {
    pub(crate) block_index: usize,
    pub(crate) newly_included: bool,
    pub(crate) zero_bitplanes: Option<u8>,
    pub(crate) num_passes: u32,
    pub(crate) segment_length: u32,
}

/// Per-code-block persistent tag-tree state across packets in a precinct.
pub(crate) struct PrecinctTagTrees {
    pub(crate) inclusion: TagTree,
    pub(crate) zero_bitplane: TagTree,
}

struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, byte_pos: 0, bit_pos: 0 }
    }

    fn read_bit(&mut self) -> bool {
        let byte = self.data.get(self.byte_pos).copied().unwrap_or(0);
        let bit = (byte >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
            // The standard's packet header bit-stuffing rule: a 0xFF byte is
            // followed by a stuffed bit, skip it.
            if byte == 0xFF {
                self.bit_pos = 1;
            }
        }
        bit != 0
    }

    fn consumed_bytes(&self) -> usize {
        if self.bit_pos == 0 {
            self.byte_pos
        } else {
            self.byte_pos + 1
        }
    }
}

/// Decodes one packet header for `num_blocks` code-blocks in raster order
/// (SPEC_FULL §4.6). `trees` holds the inclusion/zero-bitplane tag trees for
/// this precinct/band/layer combination, persistent across packets.
pub(crate) fn decode_packet_header(
    data: &[u8],
    layno: u16,
    num_blocks: usize,
    trees: &mut PrecinctTagTrees,
    block_known_included: &mut [bool],
) -> Result<PacketHeader> {
    let mut reader = BitReader::new(data);
    let zero_length = !reader.read_bit();
    let block_updates = if zero_length {
        Vec::new()
    } else {
        decode_band_blocks(&mut reader, layno, num_blocks, trees, block_known_included)?
    };
    Ok(PacketHeader {
        consumed: reader.consumed_bytes(),
        block_updates,
    })
}

/// One band's worth of code-blocks within a multi-band packet header
/// (SPEC_FULL §4.6): resolution levels above 0 pack three bands (HL, LH, HH)
/// back to back in the same bitstream, each with its own tag trees but no
/// byte realignment between them, so every band after the first must keep
/// reading from the same bit cursor the previous one left off at.
pub(crate) struct BandHeaderGroup<'a> {
    pub(crate) num_blocks: usize,
    pub(crate) trees: &'a mut PrecinctTagTrees,
    pub(crate) block_known_included: &'a mut [bool],
}

/// Decodes a packet header covering one or more bands sharing a single
/// zero-length bit (SPEC_FULL §4.6 step 1), used for resolutions above 0
/// where a packet carries HL, LH, and HH in that order.
pub(crate) fn decode_packet_header_multi(
    data: &[u8],
    layno: u16,
    groups: &mut [BandHeaderGroup],
) -> Result<(usize, Vec<Vec<BlockPacketUpdate>>)> {
    let mut reader = BitReader::new(data);
    let zero_length = !reader.read_bit();
    let mut per_band = Vec::with_capacity(groups.len());
    if !zero_length {
        for group in groups.iter_mut() {
            let updates = decode_band_blocks(
                &mut reader,
                layno,
                group.num_blocks,
                group.trees,
                group.block_known_included,
            )?;
            per_band.push(updates);
        }
    } else {
        for group in groups.iter() {
            per_band.push(Vec::with_capacity(0).into_iter().take(0).collect::<Vec<_>>());
            let _ = group.num_blocks;
        }
    }
    Ok((reader.consumed_bytes(), per_band))
}

fn decode_band_blocks(
    reader: &mut BitReader,
    layno: u16,
    num_blocks: usize,
    trees: &mut PrecinctTagTrees,
    block_known_included: &mut [bool],
) -> Result<Vec<BlockPacketUpdate>> {
    let mut updates = Vec::with_capacity(num_blocks);
    for block_index in 0..num_blocks {
        let x = block_index as u32;
        let included;
        let newly_included;
        if block_known_included[block_index] {
            included = reader.read_bit();
            newly_included = false;
        } else {
            included = trees
                .inclusion
                .decode(x, 0, layno as i32 + 1, || reader.read_bit());
            newly_included = included;
        }

        if !included {
            updates.push(BlockPacketUpdate {
                block_index,
                newly_included: false,
                zero_bitplanes: None,
                num_passes: 0,
                segment_length: 0,
            });
            continue;
        }

        if newly_included {
            block_known_included[block_index] = true;
        }

        let zero_bitplanes = if newly_included {
            let mut n = 0i32;
            while !trees.zero_bitplane.decode(x, 0, n + 1, || reader.read_bit()) {
                n += 1;
                if n > 64 {
                    return Err(DecodeError::malformed_marker(
                        reader.consumed_bytes(),
                        "zero-bitplane tag tree did not terminate",
                    ));
                }
            }
            Some(n as u8)
        } else {
            None
        };

        let num_passes = decode_pass_count(reader);
        let segment_length = decode_segment_length(reader, num_passes);

        updates.push(BlockPacketUpdate {
            block_index,
            newly_included,
            zero_bitplanes,
            num_passes,
            segment_length,
        });
    }
    Ok(updates)
}

/// The standard's variable-length coding-pass-count code (Annex B.10.5).
fn decode_pass_count(reader: &mut BitReader) -> u32 {
    if !reader.read_bit() {
        return 1;
    }
    if !reader.read_bit() {
        return 2;
    }
    let mut value = 0u32;
    for _ in 0..2 {
        value = (value << 1) | reader.read_bit() as u32;
    }
    if value < 3 {
        return 3 + value;
    }
    let mut value = 0u32;
    for _ in 0..5 {
        value = (value << 1) | reader.read_bit() as u32;
    }
    if value < 31 {
        return 6 + value;
    }
    let mut value = 0u32;
    for _ in 0..7 {
        value = (value << 1) | reader.read_bit() as u32;
    }
    37 + value
}

/// Segment length is coded as a fixed-width field whose width grows with
/// the number of coding passes this layer contributes (Annex B.10.7,
/// simplified to the common single-segment-per-packet case since this
/// decoder does not implement selective arithmetic coding bypass segment
/// splitting).
fn decode_segment_length(reader: &mut BitReader, num_passes: u32) -> u32 {
    let extra_bits = (32 - (num_passes.max(1)).leading_zeros()).max(1);
    let mut value = 0u32;
    for _ in 0..(extra_bits + 2) {
        value = (value << 1) | reader.read_bit() as u32;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_comp(num_resolutions: u8) -> Vec<ComponentGeometry> {
        vec![ComponentGeometry {
            num_resolutions,
            precinct_grid: vec![(1, 1); num_resolutions as usize],
        }]
    }

    #[test]
    fn lrcp_visits_all_layers_then_all_resolutions() {
        let comps = single_comp(2);
        let mut it = PacketIter::new(&comps, ProgressionOrder::Lrcp, 2);
        let mut coords = Vec::new();
        while let Some(c) = it.next() {
            coords.push((c.layno, c.resno));
            if coords.len() > 10 {
                break;
            }
        }
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn rlcp_visits_all_layers_within_a_resolution_before_advancing() {
        let comps = single_comp(2);
        let mut it = PacketIter::new(&comps, ProgressionOrder::Rlcp, 2);
        let mut coords = Vec::new();
        while let Some(c) = it.next() {
            coords.push((c.resno, c.layno));
            if coords.len() > 10 {
                break;
            }
        }
        assert_eq!(coords, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn zero_length_packet_consumes_exactly_one_bit() {
        let mut trees = PrecinctTagTrees {
            inclusion: TagTree::new(1, 1),
            zero_bitplane: TagTree::new(1, 1),
        };
        let mut known = vec![false];
        let header = decode_packet_header(&[0x00], 0, 1, &mut trees, &mut known).unwrap();
        assert_eq!(header.consumed, 1);
        assert!(header.block_updates.is_empty());
    }

    #[test]
    fn pass_count_single_bit_zero_means_one_pass() {
        let mut reader = BitReader::new(&[0x00]);
        assert_eq!(decode_pass_count(&mut reader), 1);
    }
}
