//! MQ arithmetic decoder (SPEC_FULL §4.8, Annex C of the standard).
//!
//! Ported from the teacher's `mqc.rs` (`opj_mqc_init_dec`/`opj_mqc_decode`),
//! which is itself a direct transliteration of the standard's `DECODE`,
//! `BYTEIN`, and `RENORMD` procedures (Annex C.3.2-C.3.4) and the Qe
//! probability-estimation table (Table C.2). Rewritten around a safe `&[u8]`
//! slice cursor instead of a raw pointer pair.

/// One row of the Qe probability-estimation table (Annex C, Table C.2):
/// probability, next state on a most-probable-symbol exchange, next state on
/// a least-probable-symbol exchange, and whether this row flips the sense of
/// "most probable symbol" on an LPS exchange.
#[derive(Debug, Clone, Copy)]
struct QeEntry {
    qe: u32,
    nmps: u8,
    nlps: u8,
    switch: bool,
}

const QE_TABLE: [QeEntry; 47] = [
    QeEntry { qe: 0x5601, nmps: 1, nlps: 1, switch: true },
    QeEntry { qe: 0x3401, nmps: 2, nlps: 6, switch: false },
    QeEntry { qe: 0x1801, nmps: 3, nlps: 9, switch: false },
    QeEntry { qe: 0x0AC1, nmps: 4, nlps: 12, switch: false },
    QeEntry { qe: 0x0521, nmps: 5, nlps: 29, switch: false },
    QeEntry { qe: 0x0221, nmps: 38, nlps: 33, switch: false },
    QeEntry { qe: 0x5601, nmps: 7, nlps: 6, switch: true },
    QeEntry { qe: 0x5401, nmps: 8, nlps: 14, switch: false },
    QeEntry { qe: 0x4801, nmps: 9, nlps: 14, switch: false },
    QeEntry { qe: 0x3801, nmps: 10, nlps: 14, switch: false },
    QeEntry { qe: 0x3001, nmps: 11, nlps: 17, switch: false },
    QeEntry { qe: 0x2401, nmps: 12, nlps: 18, switch: false },
    QeEntry { qe: 0x1C01, nmps: 13, nlps: 20, switch: false },
    QeEntry { qe: 0x1601, nmps: 29, nlps: 21, switch: false },
    QeEntry { qe: 0x5601, nmps: 15, nlps: 14, switch: true },
    QeEntry { qe: 0x5401, nmps: 16, nlps: 14, switch: false },
    QeEntry { qe: 0x5101, nmps: 17, nlps: 15, switch: false },
    QeEntry { qe: 0x4801, nmps: 18, nlps: 16, switch: false },
    QeEntry { qe: 0x3801, nmps: 19, nlps: 17, switch: false },
    QeEntry { qe: 0x3401, nmps: 20, nlps: 18, switch: false },
    QeEntry { qe: 0x3001, nmps: 21, nlps: 19, switch: false },
    QeEntry { qe: 0x2801, nmps: 22, nlps: 19, switch: false },
    QeEntry { qe: 0x2401, nmps: 23, nlps: 20, switch: false },
    QeEntry { qe: 0x2201, nmps: 24, nlps: 21, switch: false },
    QeEntry { qe: 0x1C01, nmps: 25, nlps: 22, switch: false },
    QeEntry { qe: 0x1801, nmps: 26, nlps: 23, switch: false },
    QeEntry { qe: 0x1601, nmps: 27, nlps: 24, switch: false },
    QeEntry { qe: 0x1401, nmps: 28, nlps: 25, switch: false },
    QeEntry { qe: 0x1201, nmps: 29, nlps: 26, switch: false },
    QeEntry { qe: 0x1101, nmps: 30, nlps: 27, switch: false },
    QeEntry { qe: 0x0AC1, nmps: 31, nlps: 28, switch: false },
    QeEntry { qe: 0x09C1, nmps: 32, nlps: 29, switch: false },
    QeEntry { qe: 0x08A1, nmps: 33, nlps: 30, switch: false },
    QeEntry { qe: 0x0521, nmps: 34, nlps: 31, switch: false },
    QeEntry { qe: 0x0441, nmps: 35, nlps: 32, switch: false },
    QeEntry { qe: 0x02A1, nmps: 36, nlps: 33, switch: false },
    QeEntry { qe: 0x0221, nmps: 37, nlps: 34, switch: false },
    QeEntry { qe: 0x0141, nmps: 38, nlps: 35, switch: false },
    QeEntry { qe: 0x0111, nmps: 39, nlps: 36, switch: false },
    QeEntry { qe: 0x0085, nmps: 40, nlps: 37, switch: false },
    QeEntry { qe: 0x0049, nmps: 41, nlps: 38, switch: false },
    QeEntry { qe: 0x0025, nmps: 42, nlps: 39, switch: false },
    QeEntry { qe: 0x0015, nmps: 43, nlps: 40, switch: false },
    QeEntry { qe: 0x0009, nmps: 44, nlps: 41, switch: false },
    QeEntry { qe: 0x0005, nmps: 45, nlps: 42, switch: false },
    QeEntry { qe: 0x0001, nmps: 45, nlps: 43, switch: false },
    QeEntry { qe: 0x5601, nmps: 46, nlps: 46, switch: false },
];

/// One context's adaptive state: an index into [`QE_TABLE`] and the current
/// sense of "most probable symbol".
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ContextState {
    index: u8,
    mps: u8,
}

impl ContextState {
    pub(crate) fn new(index: u8, mps: u8) -> Self {
        ContextState { index, mps }
    }
}

/// Decoder-side MQ state machine, initialised over one code-block's
/// compressed segment bytes (Annex C.3.2, `INITDEC`).
pub(crate) struct MqDecoder<'a> {
    data: &'a [u8],
    bp: usize,
    c: u32,
    a: u32,
    ct: i32,
}

impl<'a> MqDecoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let mut dec = MqDecoder {
            data,
            bp: 0,
            c: 0,
            a: 0,
            ct: 0,
        };
        let b0 = dec.byte_at(0) as u32;
        dec.c = b0 << 16;
        dec.byte_in();
        dec.c <<= 7;
        dec.ct -= 7;
        dec.a = 0x8000;
        dec
    }

    fn byte_at(&self, idx: usize) -> u8 {
        self.data.get(idx).copied().unwrap_or(0xFF)
    }

    /// Annex C.3.3 `BYTEIN`: handles the 0xFF marker-escape stuffing rule.
    fn byte_in(&mut self) {
        if self.byte_at(self.bp) == 0xFF {
            if self.byte_at(self.bp + 1) > 0x8F {
                self.c += 0xFF00;
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c += (self.byte_at(self.bp) as u32) << 9;
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.c += (self.byte_at(self.bp) as u32) << 8;
            self.ct = 8;
        }
    }

    /// Annex C.3.4 `RENORMD`.
    fn renorm_d(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// Annex C.3.2 `DECODE`: returns the decoded bit for context `cx`,
    /// updating its adaptive state in place.
    pub(crate) fn decode(&mut self, cx: &mut ContextState) -> bool {
        let entry = QE_TABLE[cx.index as usize];
        self.a = self.a.wrapping_sub(entry.qe);

        let d;
        if (self.c >> 16) < entry.qe {
            // LPS exchange, or MPS exchange when a < qe (Annex C Figure C.8).
            if self.a < entry.qe {
                d = cx.mps;
                cx.index = entry.nmps;
            } else {
                d = 1 - cx.mps;
                if entry.switch {
                    cx.mps = 1 - cx.mps;
                }
                cx.index = entry.nlps;
            }
            self.a = entry.qe;
            self.renorm_d();
        } else {
            self.c -= entry.qe << 16;
            if self.a & 0x8000 == 0 {
                if self.a < entry.qe {
                    d = 1 - cx.mps;
                    if entry.switch {
                        cx.mps = 1 - cx.mps;
                    }
                    cx.index = entry.nlps;
                } else {
                    d = cx.mps;
                    cx.index = entry.nmps;
                }
                self.renorm_d();
            } else {
                d = cx.mps;
            }
        }
        d != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_reads_first_two_bytes() {
        let data = [0x00, 0x00, 0xFF, 0xAC];
        let dec = MqDecoder::new(&data);
        assert_eq!(dec.bp, 1);
    }

    #[test]
    fn decode_runs_without_panicking_on_all_ff_input() {
        // Marker-escape stuffed input (0xFF followed by a byte > 0x8F is the
        // codestream's own EOC/SOP territory); the decoder must treat it as
        // an exhausted segment rather than reading out of bounds.
        let data = [0xFF, 0x90, 0xFF, 0x90];
        let mut dec = MqDecoder::new(&data);
        let mut cx = ContextState::new(0, 0);
        for _ in 0..32 {
            let _ = dec.decode(&mut cx);
        }
    }

    #[test]
    fn context_state_starts_at_requested_index() {
        let cx = ContextState::new(4, 1);
        assert_eq!(cx.index, 4);
        assert_eq!(cx.mps, 1);
    }
}
