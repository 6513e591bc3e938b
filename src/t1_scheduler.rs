//! T1Scheduler (SPEC_FULL §4.7): dispatches `DecompressBlockExec` tasks to
//! the `Runtime`'s worker pool.
//!
//! Grounded on the teacher's `opj_t1_decode_cblks` / `opj_thread_pool`
//! dispatch loop, replacing its raw `opj_tcd_cblk_dec_t*` task queue with an
//! owned `Vec<DecompressBlockExec>` and a shared atomic failure flag instead
//! of the teacher's per-thread `opj_event_mgr` error callback.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DecodeError;
use crate::runtime::Runtime;
use crate::t1_decoder::{decode_block, BlockInput};

/// One code-block's decode job: the inputs `T1Decoder` needs plus where the
/// resulting coefficient plane should land.
pub(crate) struct DecompressBlockExec<'a> {
    pub(crate) input: BlockInput<'a>,
    pub(crate) result: Option<Vec<i32>>,
    pub(crate) error: Option<DecodeError>,
}

impl<'a> DecompressBlockExec<'a> {
    pub(crate) fn new(input: BlockInput<'a>) -> Self {
        DecompressBlockExec {
            input,
            result: None,
            error: None,
        }
    }
}

/// Runs every task in `tasks` to completion. Tasks are independent (disjoint
/// output buffers, SPEC_FULL §4.7 "Concurrency"), so failures in one task
/// never stop another from draining; the caller inspects each task's
/// `error` afterwards. Returns `true` if every task succeeded.
pub(crate) fn run_all(runtime: &Runtime, tasks: &mut [DecompressBlockExec]) -> bool {
    let any_failed = AtomicBool::new(false);

    runtime.pool.for_each(tasks, |task| {
        match decode_block(&task.input) {
            Ok(coeffs) => task.result = Some(coeffs),
            Err(err) => {
                log::warn!("code-block decode failed: {err}");
                any_failed.store(true, Ordering::Relaxed);
                task.error = Some(err);
            }
        }
    });

    !any_failed.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::t1_decoder::{BandOrientation, T1Kind};

    #[test]
    fn all_succeed_when_blocks_are_trivially_empty() {
        let runtime = Runtime::default();
        let mut tasks = vec![
            DecompressBlockExec::new(BlockInput {
                data: &[],
                width: 0,
                height: 0,
                num_bps: 0,
                orientation: BandOrientation::Ll,
                reversible: true,
                roi_shift: 0,
                kind: T1Kind::Standard,
            }),
            DecompressBlockExec::new(BlockInput {
                data: &[],
                width: 0,
                height: 0,
                num_bps: 0,
                orientation: BandOrientation::Hl,
                reversible: true,
                roi_shift: 0,
                kind: T1Kind::Standard,
            }),
        ];
        assert!(run_all(&runtime, &mut tasks));
        assert!(tasks.iter().all(|t| t.result.is_some()));
    }

    #[test]
    fn ht_task_failure_does_not_stop_other_tasks_from_draining() {
        let runtime = Runtime::default();
        let mut tasks = vec![
            DecompressBlockExec::new(BlockInput {
                data: &[],
                width: 4,
                height: 4,
                num_bps: 2,
                orientation: BandOrientation::Ll,
                reversible: true,
                roi_shift: 0,
                kind: T1Kind::Ht,
            }),
            DecompressBlockExec::new(BlockInput {
                data: &[],
                width: 0,
                height: 0,
                num_bps: 0,
                orientation: BandOrientation::Ll,
                reversible: true,
                roi_shift: 0,
                kind: T1Kind::Standard,
            }),
        ];
        assert!(!run_all(&runtime, &mut tasks));
        assert!(tasks[0].error.is_some());
        assert!(tasks[1].result.is_some());
    }
}
